//! # Server Configuration
//!
//! Application state wiring, the Axum router, and the OpenAPI document.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{delete, get},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{JwtSessionValidator, SessionAuth, SessionValidator, session_auth_middleware};
use crate::config::AppConfig;
use crate::crypto::{CryptoError, CryptoKey};
use crate::handlers;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::linking::{AuthorizationRequestBuilder, CallbackHandler};
use crate::providers::ProviderRegistry;
use crate::repositories::{ConnectionRepository, OAuthStateRepository};
use crate::state_token::StateCodec;
use crate::store::{ConnectionStore, StateNonceStore};
use crate::telemetry::trace_context_middleware;

/// External collaborators the service talks to
#[derive(Clone)]
pub struct Collaborators {
    pub connections: Arc<dyn ConnectionStore>,
    pub nonces: Arc<dyn StateNonceStore>,
    pub http: Arc<dyn HttpClient>,
    pub sessions: Arc<dyn SessionValidator>,
}

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub registry: Arc<ProviderRegistry>,
    pub connections: Arc<dyn ConnectionStore>,
    pub sessions: SessionAuth,
    pub authorizer: AuthorizationRequestBuilder,
    pub callbacks: CallbackHandler,
}

impl AppState {
    /// Assemble state around explicit collaborators.
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        registry: ProviderRegistry,
        crypto_key: &CryptoKey,
        collaborators: Collaborators,
    ) -> Result<Self, CryptoError> {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let state_codec = Arc::new(StateCodec::new(crypto_key, config.state_ttl())?);

        let sessions = SessionAuth::new(collaborators.sessions, config.session_cookie.clone());
        let authorizer = AuthorizationRequestBuilder::new(
            Arc::clone(&registry),
            Arc::clone(&state_codec),
            Arc::clone(&config),
        );
        let callbacks = CallbackHandler::new(
            state_codec,
            collaborators.nonces,
            Arc::clone(&collaborators.connections),
            collaborators.http,
            Arc::clone(&config),
        );

        Ok(Self {
            config,
            db,
            registry,
            connections: collaborators.connections,
            sessions,
            authorizer,
            callbacks,
        })
    }

    /// Production wiring: SeaORM stores, reqwest, and JWT sessions.
    pub fn from_config(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .ok_or_else(|| anyhow!("LINKER_CRYPTO_KEY is not configured"))?;
        let crypto_key = CryptoKey::new(key_bytes).context("Invalid LINKER_CRYPTO_KEY")?;
        let session_secret = config
            .session_secret
            .as_deref()
            .ok_or_else(|| anyhow!("LINKER_SESSION_SECRET is not configured"))?;

        let registry =
            ProviderRegistry::from_config(&config).context("Failed to build provider registry")?;
        let http = ReqwestHttpClient::new(config.http_timeout())
            .context("Failed to build outbound HTTP client")?;

        let db_arc = Arc::new(db.clone());
        let collaborators = Collaborators {
            connections: Arc::new(ConnectionRepository::new(
                Arc::clone(&db_arc),
                crypto_key.clone(),
            )),
            nonces: Arc::new(OAuthStateRepository::new(db_arc)),
            http: Arc::new(http),
            sessions: Arc::new(JwtSessionValidator::new(session_secret)),
        };

        Ok(Self::new(config, db, registry, &crypto_key, collaborators)?)
    }
}

impl FromRef<AppState> for SessionAuth {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sessions.clone()
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/connect/{platform}",
            get(handlers::connect::connect_redirect).post(handlers::connect::start_connect),
        )
        .route(
            "/connections",
            get(handlers::connections::list_connections),
        )
        .route(
            "/connections/{platform}",
            delete(handlers::connections::delete_connection),
        )
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session_auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/providers", get(handlers::providers::list_providers))
        .route(
            "/callback/{platform}",
            get(handlers::callback::oauth_callback),
        )
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::from_config(config, db)?;
    let platforms: Vec<String> = state
        .registry
        .list_metadata()
        .into_iter()
        .map(|m| m.platform.to_string())
        .collect();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, %profile, ?platforms, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

struct SessionSecurity;

impl Modify for SessionSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::providers::list_providers,
        crate::handlers::connect::connect_redirect,
        crate::handlers::connect::start_connect,
        crate::handlers::callback::oauth_callback,
        crate::handlers::connections::list_connections,
        crate::handlers::connections::delete_connection,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::providers::ProvidersResponse,
            crate::handlers::connect::AuthorizeUrlResponse,
            crate::handlers::callback::CallbackErrorBody,
            crate::handlers::connections::ConnectionInfo,
            crate::handlers::connections::ConnectionsResponse,
            crate::providers::ProviderMetadata,
            crate::providers::Platform,
            crate::providers::AuthStyle,
            crate::error::ApiError,
        )
    ),
    modifiers(&SessionSecurity),
    info(
        title = "Social Linker API",
        description = "Links social platform accounts to users through OAuth",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
