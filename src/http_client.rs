//! Outbound HTTP seam for provider calls
//!
//! Adapters describe token and profile calls as plain [`OutboundRequest`]
//! values; an [`HttpClient`] sends them. Production uses [`ReqwestHttpClient`],
//! tests inject scripted clients.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Form fields and headers whose values never appear in debug output
const SENSITIVE_KEYS: &[&str] = &[
    "authorization",
    "client_secret",
    "code",
    "code_verifier",
    "access_token",
    "refresh_token",
];

/// HTTP method used for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully described provider request
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body fields (POST only)
    pub form: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            form: Vec::new(),
        }
    }

    pub fn post_form(url: Url) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn form_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.form.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let encoded = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
        self.header("Authorization", format!("Basic {}", encoded))
    }

    /// Value of the first form field with the given name
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value of the first header with the given name (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    if SENSITIVE_KEYS
        .iter()
        .any(|sensitive| key.eq_ignore_ascii_case(sensitive))
    {
        "[REDACTED]"
    } else {
        value
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut url = self.url.clone();
        let query: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), redact(&k, &v).to_string()))
            .collect();
        if !query.is_empty() {
            url.query_pairs_mut().clear().extend_pairs(query);
        }

        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &url.as_str())
            .field(
                "headers",
                &self
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), redact(k, v)))
                    .collect::<Vec<_>>(),
            )
            .field(
                "form",
                &self
                    .form
                    .iter()
                    .map(|(k, v)| (k.as_str(), redact(k, v)))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Status and body returned by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failures reaching a provider at all
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to provider timed out")]
    Timeout,
    #[error("could not reach provider: {0}")]
    Connect(String),
    #[error("provider request failed: {0}")]
    Other(String),
}

/// Sends provider requests
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed client with a bounded per-request timeout
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("social-linker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

/// Error text never carries the request URL, which may hold query credentials
fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    let error = error.without_url();
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        tracing::debug!(request = ?request, "Sending provider request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url),
            HttpMethod::Post => self.client.post(request.url).form(&request.form),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn debug_output_redacts_secrets() {
        let request = OutboundRequest::post_form(
            Url::parse("https://example.com/token?access_token=abc&fields=id").unwrap(),
        )
        .basic_auth("id", "secret")
        .form_field("client_secret", "shh")
        .form_field("code_verifier", "pkce-value")
        .form_field("grant_type", "authorization_code");

        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("shh"));
        assert!(!rendered.contains("pkce-value"));
        assert!(!rendered.contains("abc"));
        assert!(!rendered.contains("Basic "));
        assert!(rendered.contains("authorization_code"));
        assert!(rendered.contains("fields=id"));
    }

    #[test]
    fn basic_auth_encodes_credentials() {
        let request =
            OutboundRequest::post_form(Url::parse("https://example.com").unwrap())
                .basic_auth("client", "secret");
        assert_eq!(
            request.header_value("authorization"),
            Some("Basic Y2xpZW50OnNlY3JldA==")
        );
    }

    #[tokio::test]
    async fn reqwest_client_posts_form_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let request =
            OutboundRequest::post_form(Url::parse(&format!("{}/token", server.uri())).unwrap())
                .form_field("grant_type", "authorization_code");

        let response = client.send(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn reqwest_client_maps_slow_provider_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new(Duration::from_millis(50)).unwrap();
        let request = OutboundRequest::get(Url::parse(&format!("{}/slow", server.uri())).unwrap());

        assert_eq!(client.send(request).await, Err(TransportError::Timeout));
    }

    #[tokio::test]
    async fn reqwest_client_surfaces_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let response = client
            .send(OutboundRequest::get(Url::parse(&server.uri()).unwrap()))
            .await
            .unwrap();
        assert_eq!(response, RawResponse::new(401, "nope"));
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn transport_errors_omit_query_credentials() {
        let client = ReqwestHttpClient::new(Duration::from_secs(2)).unwrap();
        let request = OutboundRequest::get(
            Url::parse("http://127.0.0.1:1/me?fields=id&access_token=SECRET-TOKEN").unwrap(),
        );

        let error = client.send(request).await.unwrap_err();
        assert!(!error.to_string().contains("SECRET-TOKEN"));
        assert!(!format!("{:?}", error).contains("SECRET-TOKEN"));
    }
}
