use axum::{http::Method, middleware::from_fn_with_state, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod bookings;
pub mod error;
pub mod flights;
pub mod middleware;
pub mod passengers;
pub mod state;
pub mod stream;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let admin = admin::routes().layer(from_fn_with_state(state.clone(), middleware::admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(flights::routes())
        .merge(passengers::routes())
        .merge(bookings::routes())
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), middleware::circuit_breaker_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
