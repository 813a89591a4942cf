//! HTTP server assembly: shared state, middleware stack and listener.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aspatal_core::config::NotifierKind;
use aspatal_core::{
    AccessPolicy, AuthError, AuthSystem, ClinicService, Config, LogNotifier, MemoryStore,
    Notifier, Outbox, ServerSettings, Store,
};
use axum::Router;
use http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::gate::GateLayer;
use crate::routes;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthSystem>,
    pub clinic: Arc<ClinicService>,
    pub policy: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new<S>(config: &Config, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Result<Self, AuthError>
    where
        S: Store + 'static,
    {
        let auth = Arc::new(AuthSystem::new(
            &config.auth,
            config.notify.public_base_url.clone(),
            store.clone(),
            notifier,
        )?);
        let clinic = Arc::new(ClinicService::new(store, auth.clone()));

        Ok(Self {
            auth,
            clinic,
            policy: Arc::new(AccessPolicy::hospital()),
        })
    }

    /// In-memory store plus the configured notifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = match config.notify.backend {
            NotifierKind::Log => Arc::new(LogNotifier),
            NotifierKind::Outbox => Arc::new(Outbox::new()),
        };
        let state = Self::new(config, Arc::new(MemoryStore::new()), notifier)
            .context("failed to initialise authentication")?;
        Ok(state)
    }
}

/// Routes behind the authorization gate and request tracing.
pub fn router(state: AppState) -> Router {
    let gate = GateLayer::new(state.auth.clone(), state.policy.clone());

    routes::routes()
        .layer(gate)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(settings: &ServerSettings) -> Result<CorsLayer> {
    let origins = settings
        .cors_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// Full application: CORS sits outside the gate so preflight requests are
/// answered without credentials.
pub fn app(state: AppState, settings: &ServerSettings) -> Result<Router> {
    Ok(router(state).layer(cors_layer(settings)?))
}

/// Bootstrap the administrator, bind and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;

    if let Some(admin) = state
        .auth
        .bootstrap_admin(&config.bootstrap)
        .await
        .context("failed to bootstrap administrator")?
    {
        info!("✓ Administrator {} created", admin.email);
    }

    let app = app(state, &config.server)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("✓ HTTP server listening on {}", addr);
    info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("✓ Aspatal Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, stopping server...");
}
