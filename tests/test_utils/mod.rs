//! Test utilities shared by the integration suites.
//!
//! In-memory SQLite with migrations, deterministic in-memory doubles for the
//! store and HTTP seams, and helpers to assemble an application state.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use social_linker::auth::{JwtSessionValidator, SessionClaims};
use social_linker::config::{AppConfig, PlatformSettings};
use social_linker::crypto::CryptoKey;
use social_linker::http_client::{HttpClient, OutboundRequest, RawResponse, TransportError};
use social_linker::providers::{Platform, ProviderRegistry};
use social_linker::repositories::{ConnectionRepository, OAuthStateRepository};
use social_linker::server::{AppState, Collaborators};
use social_linker::state_token::StateCodec;
use social_linker::store::{
    Connection, ConnectionStore, NewConnection, StateNonceStore, StoreError,
};
use uuid::Uuid;

pub const SESSION_SECRET: &str = "integration-session-secret-0123456789abcdef";
pub const PUBLIC_BASE_URL: &str = "https://linker.test";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("Failed to create test crypto key")
}

/// A codec equivalent to the one the application derives from [`test_crypto_key`]
pub fn test_state_codec(config: &AppConfig) -> StateCodec {
    StateCodec::new(&test_crypto_key(), config.state_ttl()).expect("state codec")
}

/// Configuration enabling `platforms` with `<platform>-client` / `<platform>-secret`
/// credentials; `endpoint_base` redirects every provider endpoint when given.
pub fn test_config(platforms: &[Platform], endpoint_base: Option<&str>) -> AppConfig {
    let mut config = AppConfig {
        crypto_key: Some(test_crypto_key().as_bytes().to_vec()),
        session_secret: Some(SESSION_SECRET.to_string()),
        public_base_url: PUBLIC_BASE_URL.to_string(),
        platforms: platforms.to_vec(),
        ..AppConfig::default()
    };
    for platform in platforms {
        let endpoint = |path: &str| endpoint_base.map(|base| format!("{}/{}{}", base, platform, path));
        config.platform_settings.insert(
            *platform,
            PlatformSettings {
                client_id: Some(format!("{}-client", platform)),
                client_secret: Some(format!("{}-secret", platform)),
                scopes: None,
                authorize_url: endpoint("/authorize"),
                token_url: endpoint("/token"),
                api_base: endpoint(""),
            },
        );
    }
    config
}

/// Mint a session JWT the application's validator accepts.
pub fn session_token(user_id: &str) -> String {
    let now = Utc::now().timestamp();
    encode(
        &Header::default(),
        &SessionClaims {
            sub: user_id.to_string(),
            exp: now + 3600,
            iat: Some(now),
        },
        &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
    )
    .expect("encode session token")
}

/// Connection store kept in memory, with switchable write failures.
#[derive(Default)]
pub struct MemoryConnectionStore {
    rows: Mutex<BTreeMap<(String, Platform), Connection>>,
    fail_writes: AtomicBool,
    upserts: AtomicUsize,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful upserts
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, user_id: &str, platform: Platform) -> Option<Connection> {
        self.rows
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), platform))
            .cloned()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn upsert(&self, new: NewConnection) -> Result<Connection, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }

        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let key = (new.user_id.clone(), new.platform);
        let (id, created_at) = rows
            .get(&key)
            .map(|existing| (existing.id, existing.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), now));

        let connection = Connection {
            id,
            user_id: new.user_id,
            platform: new.platform,
            platform_user_id: new.platform_user_id,
            platform_user_name: new.platform_user_name,
            access_token: new.access_token,
            refresh_token: new.refresh_token,
            expires_at: new.expires_at,
            scopes: new.scopes,
            created_at,
            updated_at: now,
        };
        rows.insert(key, connection.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }

    async fn find(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Connection>, StoreError> {
        Ok(self.get(user_id, platform))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Connection>, StoreError> {
        let mut connections: Vec<Connection> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        connections.sort_by_key(|c| c.platform.as_str());
        Ok(connections)
    }

    async fn delete(&self, user_id: &str, platform: Platform) -> Result<bool, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .remove(&(user_id.to_string(), platform))
            .is_some())
    }
}

/// Nonce ledger kept in memory
#[derive(Default)]
pub struct MemoryNonceStore {
    consumed: Mutex<HashSet<String>>,
}

#[async_trait]
impl StateNonceStore for MemoryNonceStore {
    async fn consume(
        &self,
        nonce: &str,
        _user_id: &str,
        _platform: Platform,
        _expires_at: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.consumed.lock().unwrap().insert(nonce.to_string()))
    }
}

/// HTTP client that answers from scripted routes and records every request.
///
/// Routes match on the end of the URL path; the first match wins and stays
/// in place for later calls.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<Vec<(String, Result<RawResponse, TransportError>)>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path_suffix: &str, status: u16, body: serde_json::Value) {
        self.routes.lock().unwrap().insert(
            0,
            (
                path_suffix.to_string(),
                Ok(RawResponse::new(status, body.to_string())),
            ),
        );
    }

    pub fn fail(&self, path_suffix: &str, error: TransportError) {
        self.routes
            .lock()
            .unwrap()
            .insert(0, (path_suffix.to_string(), Err(error)));
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path ends with `path_suffix`
    pub fn requests_to(&self, path_suffix: &str) -> Vec<OutboundRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path().ends_with(path_suffix))
            .collect()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let path = request.url.path().to_string();
        self.requests.lock().unwrap().push(request);
        self.routes
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| path.ends_with(suffix.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(TransportError::Connect(format!("no route for {}", path))))
    }
}

/// Application state over in-memory doubles, with handles to inspect them.
pub struct TestHarness {
    pub config: AppConfig,
    pub state: AppState,
    pub connections: Arc<MemoryConnectionStore>,
    pub nonces: Arc<MemoryNonceStore>,
    pub http: Arc<MockHttpClient>,
}

pub fn memory_harness(platforms: &[Platform]) -> TestHarness {
    let config = test_config(platforms, None);
    let registry = ProviderRegistry::from_config(&config).expect("registry builds");
    let connections = Arc::new(MemoryConnectionStore::new());
    let nonces = Arc::new(MemoryNonceStore::default());
    let http = Arc::new(MockHttpClient::new());

    let state = AppState::new(
        config.clone(),
        DatabaseConnection::default(),
        registry,
        &test_crypto_key(),
        Collaborators {
            connections: connections.clone(),
            nonces: nonces.clone(),
            http: http.clone(),
            sessions: Arc::new(JwtSessionValidator::new(SESSION_SECRET)),
        },
    )
    .expect("state builds");

    TestHarness {
        config,
        state,
        connections,
        nonces,
        http,
    }
}

/// Application state over SQLite repositories and an arbitrary HTTP client.
pub async fn sqlite_state(
    config: AppConfig,
    http: Arc<dyn HttpClient>,
) -> Result<(AppState, Arc<DatabaseConnection>)> {
    let db = setup_test_db().await?;
    let db_arc = Arc::new(db.clone());
    let registry = ProviderRegistry::from_config(&config)?;

    let state = AppState::new(
        config,
        db,
        registry,
        &test_crypto_key(),
        Collaborators {
            connections: Arc::new(ConnectionRepository::new(
                db_arc.clone(),
                test_crypto_key(),
            )),
            nonces: Arc::new(OAuthStateRepository::new(db_arc.clone())),
            http,
            sessions: Arc::new(JwtSessionValidator::new(SESSION_SECRET)),
        },
    )?;
    Ok((state, db_arc))
}
