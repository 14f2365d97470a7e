//! HTTP boundary — Axum application over the trade router and agents.
//!
//! Thin by design: handlers deserialize, delegate to the router or an
//! agent, and serialize the result. CORS enabled for local frontends.

pub mod routes;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use routes::{ApiState, AppState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origin = if cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        // Platform routes
        .route("/api/platforms/register", post(routes::register_platform))
        .route("/api/platforms/unregister", post(routes::unregister_platform))
        .route("/api/balances", get(routes::get_all_balances))
        .route("/api/balances/:platform", get(routes::get_platform_balance))
        .route("/api/price/:platform/:symbol", get(routes::get_price))
        .route("/api/trade/execute", post(routes::execute_trade))
        // Agent routes
        .route("/api/agent/create", post(routes::create_agent))
        .route("/api/agents", get(routes::list_agents))
        .route("/api/agent/:name", delete(routes::delete_agent))
        .route("/api/agent/:name/analyze", post(routes::agent_analyze))
        .route("/api/agent/:name/trade", post(routes::agent_trade))
        .route("/api/agent/:name/stream", post(routes::agent_stream))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
