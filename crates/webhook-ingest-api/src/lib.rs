//! # Webhook Ingest API
//!
//! HTTP surfaces of the two pipeline stages:
//!
//! - the **receiver** accepts webhook notifications on `/` and publishes the
//!   raw body to a message sink
//! - the **processor** receives Pub/Sub push deliveries on `/` and appends one
//!   warehouse row per message
//!
//! Both expose `/health` and `/metrics`, and both are served by [`serve`] with
//! graceful shutdown.

use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub mod config;
pub mod errors;
pub mod intake;
pub mod metrics;
pub mod push;
pub mod responses;

pub use config::{
    Backend, ConfigSources, GcpConfig, LoggingConfig, ProcessorSettings, ReceiverSettings,
    ServerConfig, ServiceConfig,
};
pub use errors::{ConfigError, IntakeError, PushError, ServiceError};
pub use intake::{handle_webhook, ReceiverState};
pub use metrics::ServiceMetrics;
pub use push::{handle_push, ProcessorState};
pub use responses::{ErrorResponse, PushEnvelope, PushMessage, StatusResponse};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Routers
// ============================================================================

/// Router of the receiver service
pub fn receiver_router(state: ReceiverState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/", any(handle_webhook))
        .merge(operational_routes(server))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Router of the processor service
pub fn processor_router(state: ProcessorState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/", any(handle_push))
        .merge(operational_routes(server))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// `/health` and `/metrics`. CORS applies here only, so every non-POST on `/`
/// still reaches the handler and gets 405.
fn operational_routes<S>(server: &ServerConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<ServiceMetrics>: FromRef<S>,
{
    let router = Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics));

    if server.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ============================================================================
// Health and Metrics
// ============================================================================

/// Liveness probe; the services hold no state worth checking
pub async fn handle_health() -> Json<StatusResponse> {
    Json(StatusResponse::healthy())
}

/// Prometheus text exposition
pub async fn handle_metrics(State(metrics): State<Arc<ServiceMetrics>>) -> Response {
    match metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("failed to encode metrics: {}", e))),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Bind to the configured address and serve `router` until SIGINT or SIGTERM.
pub async fn serve(router: Router, server: &ServerConfig) -> Result<(), ServiceError> {
    let address = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    serve_with_shutdown(
        listener,
        router,
        shutdown_signal(),
        Duration::from_secs(server.shutdown_timeout_seconds),
    )
    .await
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// After the signal no new connections are accepted. In-flight requests get
/// `timeout` to finish; the server then returns regardless.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    timeout: Duration,
) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let signalled = Arc::new(Notify::new());
    let notifier = signalled.clone();

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            notifier.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            });
        }
        _ = signalled.notified() => {
            info!(timeout_seconds = timeout.as_secs(), "Shutting down, draining in-flight requests");
        }
    }

    match tokio::time::timeout(timeout, &mut server).await {
        Ok(result) => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
            info!("HTTP server shutdown complete");
        }
        Err(_) => {
            warn!(
                timeout_seconds = timeout.as_secs(),
                "Shutdown timeout elapsed with requests still in flight"
            );
        }
    }

    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
