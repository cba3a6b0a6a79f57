//! Checkout and order status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use common::{CartToken, OrderId};
use domain::order::FrozenLineItem;
use domain::{CustomerInfo, DomainError, Order, OrderStatus};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub cart_token: CartToken,
    #[serde(flatten)]
    pub customer: CustomerInfo,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
    pub items: Vec<FrozenLineItem>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub order: Order,
    pub changed: bool,
}

// -- Handlers --

/// POST /orders — check out a cart. The caller is identified by
/// `Authorization: Bearer <session>`.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let session = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let identity = state.identity.resolve(session).await;

    let Json(req) = payload?;
    let order = state
        .checkout
        .create_order(&req.cart_token, req.customer, identity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            success: true,
            order_id: order.id,
            status: order.status,
        }),
    ))
}

/// GET /orders/{id} — the order with its frozen line items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(order_id).await?;
    let items = order
        .snapshot()
        .map_err(|source| DomainError::SnapshotUnparseable { order_id, source })?
        .items()
        .to_vec();

    Ok(Json(OrderResponse {
        success: true,
        order,
        items,
    }))
}

/// PATCH /orders/{id}/status — move an order through its lifecycle.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(req) = payload?;
    let requested: OrderStatus = req.status.parse()?;

    let update = state.orders.update_status(order_id, requested).await?;
    Ok(Json(StatusResponse {
        success: true,
        order: update.order,
        changed: update.changed,
    }))
}

fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
