use axum::{routing::get, Router};

use crate::handlers::{balance_histories, user_profile};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(user_profile::show).put(user_profile::update))
        .route("/balance-histories", get(balance_histories::index))
}
