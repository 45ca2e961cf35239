//! Application startup and lifecycle management.

use crate::config::InpaintConfig;
use crate::handlers;
use crate::services::providers::workers_ai::WorkersAiProvider;
use crate::services::ImageProvider;
use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{http_span, metrics_middleware, request_id_middleware};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<InpaintConfig>,
    pub provider: Arc<dyn ImageProvider>,
}

/// Build the HTTP router.
///
/// `/health`, `/ready` and `/metrics` are open; every other request, whatever
/// its method or path, goes to the generation handler.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.limits.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .fallback(handlers::generate_image)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| http_span(req)))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application against Workers AI.
    pub async fn build(config: InpaintConfig) -> Result<Self, AppError> {
        let provider = WorkersAiProvider::new(config.workers_ai.clone()).map_err(|e| {
            tracing::error!("Failed to initialize Workers AI provider: {}", e);
            AppError::ConfigError(anyhow::anyhow!(e))
        })?;

        tracing::info!(
            model = %config.workers_ai.model,
            "Initialized Workers AI provider"
        );

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application with an explicit provider (tests, local runs).
    pub async fn build_with_provider(
        config: InpaintConfig,
        provider: Arc<dyn ImageProvider>,
    ) -> Result<Self, AppError> {
        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState {
            config: Arc::new(config),
            provider,
        };

        tracing::info!("Inpaint service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
