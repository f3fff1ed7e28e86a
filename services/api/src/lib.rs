pub mod config;
pub mod routes;
pub mod socket;
pub mod state;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

pub use config::Config;
pub use state::AppState;

/// Builds the application router: the interview WebSocket plus the REST
/// endpoints, behind a permissive CORS policy for a separately served frontend.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health))
        .route("/api/config", get(routes::client_config))
        .route("/api/interviews", get(routes::list_interviews))
        .route("/api/interviews/{id}", get(routes::get_interview))
        .route("/api/reports", get(routes::list_reports))
        .route("/api/reports/{id}", get(routes::get_report))
        .route("/ws/interview", get(socket::ws_handler))
        .layer(cors)
        .with_state(state)
}
