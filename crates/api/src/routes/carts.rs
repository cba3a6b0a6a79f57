//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AdditionalId, CartLineId, CartToken, VariantId};
use domain::ResolvedCart;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_item_id: VariantId,
    #[serde(default)]
    pub additional_ids: Vec<AdditionalId>,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCreatedResponse {
    pub success: bool,
    pub token: CartToken,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub success: bool,
    pub cart: ResolvedCart,
}

impl From<ResolvedCart> for CartResponse {
    fn from(cart: ResolvedCart) -> Self {
        Self {
            success: true,
            cart,
        }
    }
}

// -- Handlers --

/// POST /carts — start an empty cart.
#[tracing::instrument(skip(state))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<(StatusCode, Json<CartCreatedResponse>), ApiError> {
    let token = state.carts.create_cart().await?;
    Ok((
        StatusCode::CREATED,
        Json(CartCreatedResponse {
            success: true,
            token,
        }),
    ))
}

/// GET /carts/{token} — the cart priced against the current catalog.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(&CartToken::new(token)).await?;
    Ok(Json(cart.into()))
}

/// POST /carts/{token}/items — add a variant, creating the cart if needed.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .carts
        .add_line(
            &CartToken::new(token),
            req.product_item_id,
            req.additional_ids,
            req.quantity,
        )
        .await?;
    Ok(Json(cart.into()))
}

/// PATCH /carts/{token}/items/{line_id} — set a line's quantity; 0 removes it.
#[tracing::instrument(skip(state, payload))]
pub async fn update_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((token, line_id)): Path<(String, String)>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError> {
    let Json(req) = payload?;
    let cart = state
        .carts
        .update_quantity(&CartToken::new(token), parse_line_id(&line_id)?, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /carts/{token}/items/{line_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((token, line_id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .remove_line(&CartToken::new(token), parse_line_id(&line_id)?)
        .await?;
    Ok(Json(cart.into()))
}

fn parse_line_id(raw: &str) -> Result<CartLineId, ApiError> {
    raw.parse::<i64>()
        .map(CartLineId::new)
        .map_err(|_| ApiError::BadRequest(format!("Invalid line id: {raw}")))
}
