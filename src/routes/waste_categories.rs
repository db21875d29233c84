use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};

use crate::handlers::waste_categories;
use crate::middleware::auth::require_admin;
use crate::state::AppState;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(waste_categories::index))
        .route("/:id", get(waste_categories::show))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(waste_categories::store))
        .route("/:id", put(waste_categories::update))
        .route_layer(from_fn(require_admin))
}
