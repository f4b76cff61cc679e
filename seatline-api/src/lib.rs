use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod seats;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let seat_routes = seats::routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::caller_token_middleware,
    ));

    Router::new()
        .route("/health", get(health))
        .merge(seat_routes)
        .layer(cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if origins.is_empty() {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        // Cookies only travel cross-origin with credentials, which CORS
        // forbids for a wildcard origin.
        cors.allow_origin(AllowOrigin::list(origins)).allow_credentials(true)
    }
}

async fn health() -> &'static str {
    "ok"
}
