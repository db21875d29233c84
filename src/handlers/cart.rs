use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::Json,
    Extension,
};

use crate::dtos::cart_dtos::{AddItemRequest, RemoveItemRequest, SubmitCartJson, UpdateItemRequest};
use crate::dtos::AppJson;
use crate::errors::{AppError, Result};
use crate::models::response::ApiResponse;
use crate::models::transaction::{TransactionRecord, TransactionResponse};
use crate::models::user::CurrentUser;
use crate::services::cart_service;
use crate::services::storage::PhotoSource;
use crate::state::AppState;

/// Cart submission from either `multipart/form-data` (file upload) or JSON
/// (base64 photo).
#[derive(Debug, Default)]
pub struct SubmitCartForm {
    pub pickup_location: Option<String>,
    pub photo: Option<PhotoSource>,
}

#[async_trait]
impl<S> FromRequest<S> for SubmitCartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let AppJson(body) = AppJson::<SubmitCartJson>::from_request(req, state).await?;
            return Ok(SubmitCartForm {
                pickup_location: body.pickup_location,
                photo: body.photo.map(PhotoSource::Base64),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Multipart(e.body_text()))?;

        let mut form = SubmitCartForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            let is_file = field.file_name().is_some();
            match name.as_deref() {
                Some("pickupLocation") => form.pickup_location = Some(field.text().await?),
                Some("photo") if is_file => form.photo = Some(PhotoSource::Upload(field.bytes().await?)),
                Some("photo") => form.photo = Some(PhotoSource::Base64(field.text().await?)),
                _ => {}
            }
        }
        Ok(form)
    }
}

fn respond(state: &AppState, record: TransactionRecord) -> TransactionResponse {
    record.into_response(|p| state.storage.url_for(p))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Option<TransactionResponse>>>> {
    let cart = cart_service::current(&state.db, user.id).await?;
    Ok(Json(ApiResponse::ok(cart.map(|c| respond(&state, c)))))
}

pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<AddItemRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>> {
    let cart = cart_service::add_item(&state.db, user.id, payload.category_id, payload.estimated_weight).await?;
    Ok(Json(ApiResponse::with_message("Item added to cart", respond(&state, cart))))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<UpdateItemRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>> {
    let cart =
        cart_service::update_item(&state.db, user.id, payload.detail_id, payload.estimated_weight).await?;
    Ok(Json(ApiResponse::with_message("Cart item updated", respond(&state, cart))))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    AppJson(payload): AppJson<RemoveItemRequest>,
) -> Result<Json<ApiResponse<Option<TransactionResponse>>>> {
    let cart = cart_service::remove_item(&state.db, user.id, payload.detail_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Item removed from cart",
        cart.map(|c| respond(&state, c)),
    )))
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    form: SubmitCartForm,
) -> Result<Json<ApiResponse<TransactionResponse>>> {
    let submitted = cart_service::submit(
        &state.db,
        &state.storage,
        user.id,
        form.pickup_location,
        form.photo,
    )
    .await?;
    Ok(Json(ApiResponse::with_message("Transaction submitted", respond(&state, submitted))))
}
