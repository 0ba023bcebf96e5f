//! Sealed authorization state
//!
//! The `state` parameter carried through the provider round trip is an
//! AES-256-GCM sealed claim set bound to one user and one platform. It never
//! contains the session credential, and the nonce inside it is consumed at
//! most once (see [`crate::store::StateNonceStore`]).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::crypto::{CryptoError, CryptoKey, decrypt_bytes, encrypt_bytes};
use crate::providers::Platform;

/// Label used to derive the state sealing key from the service key
const STATE_KEY_LABEL: &str = "social-linker/oauth-state/v1";
const STATE_AAD: &[u8] = b"oauth-state";
const NONCE_BYTES: usize = 32;
const PKCE_VERIFIER_BYTES: usize = 32;

/// Claims sealed inside a state value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClaims {
    pub nonce: String,
    pub user_id: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_verifier: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl StateClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Reasons a presented state value is rejected
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state is missing")]
    Missing,
    #[error("state is malformed")]
    Malformed,
    #[error("state has expired")]
    Expired,
    #[error("state was issued for {issued} but presented to {presented}")]
    PlatformMismatch {
        issued: Platform,
        presented: Platform,
    },
    #[error("state has already been used")]
    Replayed,
    #[error("state sealing failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// PKCE verifier and its S256 challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a fresh PKCE verifier/challenge pair (S256).
pub fn generate_pkce() -> PkcePair {
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    rand::thread_rng().fill(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = pkce_challenge(&verifier);
    PkcePair {
        verifier,
        challenge,
    }
}

/// `BASE64URL(SHA256(verifier))` per RFC 7636
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}

/// Seals and opens state values
#[derive(Debug, Clone)]
pub struct StateCodec {
    key: CryptoKey,
    ttl: Duration,
}

impl StateCodec {
    pub fn new(service_key: &CryptoKey, ttl: std::time::Duration) -> Result<Self, CryptoError> {
        Ok(Self {
            key: service_key.derive(STATE_KEY_LABEL)?,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(600)),
        })
    }

    /// Issue a state value for a user starting a flow on a platform.
    pub fn issue(
        &self,
        user_id: &str,
        platform: Platform,
        pkce_verifier: Option<String>,
    ) -> Result<String, StateError> {
        self.issue_at(user_id, platform, pkce_verifier, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: &str,
        platform: Platform,
        pkce_verifier: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, StateError> {
        let claims = StateClaims {
            nonce: generate_nonce(),
            user_id: user_id.to_string(),
            platform,
            pkce_verifier,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.seal(&claims)
    }

    /// Seal arbitrary claims; used directly by tests that need a fixed nonce.
    pub fn seal(&self, claims: &StateClaims) -> Result<String, StateError> {
        let payload = serde_json::to_vec(claims).map_err(|_| StateError::Malformed)?;
        let sealed = encrypt_bytes(&self.key, STATE_AAD, &payload)?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Open a presented state value and check expiry and platform binding.
    ///
    /// Single use is not checked here; the caller consumes the nonce.
    pub fn open(
        &self,
        state: &str,
        platform: Platform,
        now: DateTime<Utc>,
    ) -> Result<StateClaims, StateError> {
        let state = state.trim();
        if state.is_empty() {
            return Err(StateError::Missing);
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(state)
            .map_err(|_| StateError::Malformed)?;
        // Any tampering or foreign key surfaces as a decryption failure
        let payload =
            decrypt_bytes(&self.key, STATE_AAD, &sealed).map_err(|_| StateError::Malformed)?;
        let claims: StateClaims =
            serde_json::from_slice(&payload).map_err(|_| StateError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(StateError::Expired);
        }
        if claims.platform != platform {
            return Err(StateError::PlatformMismatch {
                issued: claims.platform,
                presented: platform,
            });
        }

        Ok(claims)
    }
}
