use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::handlers::transactions;
use crate::middleware::auth::{require_admin, require_collector_or_admin};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/pending", get(transactions::pending))
        .route("/search", get(transactions::search))
        .route("/verify/:id/submit", post(transactions::verify))
        .route_layer(from_fn(require_collector_or_admin));

    let admin = Router::new()
        .route("/:id/admin-action", post(transactions::admin_action))
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/", get(transactions::index))
        .route("/:id", get(transactions::show))
        .merge(staff)
        .merge(admin)
}
