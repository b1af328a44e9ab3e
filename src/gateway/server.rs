//! HTTP server implementation.

use std::any::Any;
use std::net::SocketAddr;

use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers;
use super::state::GatewayState;
use crate::error::{GateError, Result};

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    let expose_details = state.expose_error_details;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/wallet", post(handlers::wallet_login))
        .route("/api/search", post(handlers::search))
        .route("/api/quota", get(handlers::quota))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, expose_details)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Map a handler panic to a 500 response.
fn panic_response(panic: Box<dyn Any + Send + 'static>, expose_details: bool) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());

    error!(panic = %message, "Handler panicked");
    GateError::Internal(message).to_response(expose_details)
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Handler state
    state: GatewayState,
}

impl GatewayServer {
    /// Create a new server.
    pub fn new(addr: SocketAddr, state: GatewayState) -> Self {
        Self { addr, state }
    }

    /// Start the server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when `signal` resolves and
    /// returns once in-flight requests have finished.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind gateway listener");
            GateError::Io(e)
        })?;

        info!(addr = %self.addr, "Starting HTTP gateway");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP gateway failed");
                GateError::Io(e)
            })
    }
}
