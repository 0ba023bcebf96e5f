//! # Tests for Handlers
//!
//! Unit tests for the service-level handlers.

use axum::{extract::State, http::StatusCode, response::Json};
use sea_orm::DatabaseConnection;

use crate::handlers::{found, health, root};
use crate::server::AppState;

async fn state_with_db(db: DatabaseConnection) -> AppState {
    use crate::auth::JwtSessionValidator;
    use crate::config::AppConfig;
    use crate::crypto::CryptoKey;
    use crate::http_client::ReqwestHttpClient;
    use crate::providers::ProviderRegistry;
    use crate::repositories::{ConnectionRepository, OAuthStateRepository};
    use crate::server::Collaborators;
    use std::sync::Arc;
    use std::time::Duration;

    let key = CryptoKey::new(vec![0u8; 32]).expect("Failed to create test crypto key");
    let db_arc = Arc::new(db.clone());
    let collaborators = Collaborators {
        connections: Arc::new(ConnectionRepository::new(db_arc.clone(), key.clone())),
        nonces: Arc::new(OAuthStateRepository::new(db_arc)),
        http: Arc::new(ReqwestHttpClient::new(Duration::from_secs(1)).unwrap()),
        sessions: Arc::new(JwtSessionValidator::new("handler-tests-secret-0123456789abcdef")),
    };
    AppState::new(
        AppConfig::default(),
        db,
        ProviderRegistry::new(),
        &key,
        collaborators,
    )
    .unwrap()
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "social-linker");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_root_handler_returns_valid_json() {
    let Json(service_info) = root().await;
    let json = serde_json::to_value(&service_info).unwrap();

    assert!(json.get("service").is_some());
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_health_reports_ok_with_database() {
    let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    let state = state_with_db(db).await;

    let (status, Json(body)) = health(State(state)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.database, "ok");
}

#[tokio::test]
async fn test_health_degrades_without_database() {
    let state = state_with_db(DatabaseConnection::default()).await;

    let (status, Json(body)) = health(State(state)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.status, "degraded");
}

#[test]
fn test_found_sets_location() {
    let response = found("/settings?connection=linkedin&status=success");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"],
        "/settings?connection=linkedin&status=success"
    );
}
