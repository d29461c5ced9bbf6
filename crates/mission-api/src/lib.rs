pub mod error;
pub mod handlers;
pub mod service;

use axum::http::header::{self, HeaderName};
use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use service::MissionService;

pub type SharedService = Arc<MissionService>;

/// Permissive CORS. OPTIONS pre-flights are answered here with an empty body;
/// a plain OPTIONS falls through to `handlers::preflight`, also empty.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            // older web clients send the misspelt name
            HeaderName::from_static("x-crsf-token"),
            HeaderName::from_static("x-csrf-token"),
        ])
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/mission/create", post(handlers::create_mission).options(handlers::preflight))
        .route("/mission/update/:mission_id", put(handlers::update_mission).options(handlers::preflight))
        .route("/mission/complete/:mission_id", put(handlers::complete_mission).options(handlers::preflight))
        .route("/mission/drone/:drone_id", get(handlers::list_drone_missions).options(handlers::preflight))
        .route("/mission/:mission_id", get(handlers::get_mission).options(handlers::preflight))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(service)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn serve<S>(
    listener: TcpListener,
    service: SharedService,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mission api listening");
    }
    axum::serve(listener, router(service)).with_graceful_shutdown(shutdown).await
}
