use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use crate::handlers::withdrawals;
use crate::middleware::auth::require_admin;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/check-expired", get(withdrawals::check_expired))
        .route("/:id/status", post(withdrawals::update_status))
        .route_layer(from_fn(require_admin));

    Router::new()
        .route("/", get(withdrawals::index).post(withdrawals::store))
        .route("/:id", get(withdrawals::show))
        .merge(admin)
}
