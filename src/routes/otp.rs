use axum::{routing::post, Router};

use crate::handlers::otp;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send", post(otp::send))
        .route("/verify", post(otp::verify))
        .route("/resend", post(otp::resend))
}
