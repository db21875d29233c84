use axum::{middleware::from_fn_with_state, Router};

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod otp;
pub mod storage;
pub mod transactions;
pub mod user_profile;
pub mod waste_categories;
pub mod withdrawals;

/// Everything under `/api`. Routes outside `public` require a bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .nest("/auth", auth::public_routes())
        .nest("/waste-categories", waste_categories::public_routes());

    let protected = Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/waste-categories", waste_categories::admin_routes())
        .nest("/cart", cart::routes())
        .nest("/transactions", transactions::routes())
        .nest("/withdrawals", withdrawals::routes())
        .nest("/otp", otp::routes())
        .merge(user_profile::routes())
        .route_layer(from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}
