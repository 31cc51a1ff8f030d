pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/breaker", get(get_breaker))
        .route("/admin/breaker/reset", post(reset_breaker))
        .route("/admin/jobs", get(get_jobs))
        .route("/admin/resources", get(list_resources))
        .route("/admin/resources/{name}", get(get_resource))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
