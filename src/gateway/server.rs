//! HTTP server and router.

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::admission::AdmissionGateway;
use super::middleware::{authenticate, rate_limit, CallerIdentity};
use crate::error::{GatewayError, Result};
use crate::identity::Identity;

/// HTTP server fronted by the admission gateway.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The admission gateway instance
    gateway: Arc<AdmissionGateway>,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, gateway: Arc<AdmissionGateway>) -> Self {
        Self { addr, gateway }
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = router(self.gateway);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                GatewayError::Io(e)
            })
    }
}

/// Build the application router.
///
/// Every route sits behind both admission stages. CORS is answered before
/// authentication so browser preflights never need an API key.
pub fn router(gateway: Arc<AdmissionGateway>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/whoami", get(whoami))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(gateway.clone(), rate_limit))
        .layer(middleware::from_fn_with_state(gateway, authenticate))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(12 * 60 * 60))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn index() -> &'static str {
    "Welcome to postr api"
}

#[derive(Debug, Serialize)]
struct WhoAmIResponse {
    status: &'static str,
    data: WhoAmI,
}

#[derive(Debug, Serialize)]
struct WhoAmI {
    user_id: Identity,
}

async fn whoami(CallerIdentity(identity): CallerIdentity) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        status: "success",
        data: WhoAmI { user_id: identity },
    })
}
