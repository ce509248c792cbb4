pub mod auth_routes;
pub mod config_routes;
pub mod proxy;
pub mod session_routes;

use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn app(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any) // The Vite dev server proxies from another origin
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    // Methods a structured route does not model fall through to the engine,
    // exactly like paths no route matches.
    let api = Router::new()
        // Auth
        .route(
            "/auth/register",
            post(auth_routes::register).fallback(proxy::passthrough),
        )
        .route(
            "/auth/login",
            post(auth_routes::login).fallback(proxy::passthrough),
        )
        .route(
            "/auth/add_session",
            post(auth_routes::add_session).fallback(proxy::passthrough),
        )
        .route(
            "/auth/user_sessions",
            get(auth_routes::user_sessions).fallback(proxy::passthrough),
        )
        .route(
            "/auth/remove_session",
            post(auth_routes::remove_session).fallback(proxy::passthrough),
        )
        // Engine config
        .route(
            "/config/providers",
            get(config_routes::providers).fallback(proxy::passthrough),
        )
        // Sessions
        .route(
            "/sessions",
            get(session_routes::list_sessions)
                .post(session_routes::create_session)
                .fallback(proxy::passthrough),
        )
        .route(
            "/sessions/{id}",
            patch(session_routes::patch_session)
                .delete(session_routes::delete_session)
                .fallback(proxy::passthrough),
        )
        .route(
            "/sessions/{id}/messages",
            get(session_routes::list_messages)
                .post(session_routes::send_message)
                .fallback(proxy::passthrough),
        )
        .fallback(proxy::passthrough)
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "aihub-gateway"
    }))
}
