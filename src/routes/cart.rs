use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers::cart;
use crate::state::AppState;

/// Multipart overhead on top of the largest accepted photo.
const SUBMIT_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update-item", post(cart::update_item))
        .route("/remove", post(cart::remove))
        .route(
            "/submit",
            post(cart::submit).layer(DefaultBodyLimit::max(SUBMIT_BODY_LIMIT)),
        )
}
