use crate::{
    middleware::{cors_layer, request_id_middleware, request_logging_middleware, REQUEST_TIMEOUT},
    routes::{create_routes, not_found_handler},
};
use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use vistula_bot_core::BotCore;

pub struct ApiServer {
    core: Arc<BotCore>,
}

impl ApiServer {
    pub fn new(core: Arc<BotCore>) -> Self {
        Self { core }
    }

    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_app();
        let addr = self.core.config.bind_address();

        info!("Starting API server on {}", addr);
        info!("CORS origins: {:?}", self.core.config.cors_origins);

        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("API server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        create_routes(self.core.clone())
            .fallback(not_found_handler)
            .layer(
                ServiceBuilder::new()
                    // Outermost layers (applied last)
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer(&self.core.config))
                    .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                    // Logging and request tracking
                    .layer(axum::middleware::from_fn(request_id_middleware))
                    .layer(axum::middleware::from_fn(request_logging_middleware)),
            )
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
