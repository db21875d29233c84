use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::me))
}
