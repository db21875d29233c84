use axum::{routing::get, Router};

use crate::handlers::upload;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/waste-photos/:file", get(upload::waste_photo))
        .route("/avatars/:file", get(upload::avatar))
}
