use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ops::{self, CreateDelivery, OverrideChange};
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/waiting", get(list_waiting))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/claim", post(claim_delivery))
        .route("/deliveries/:id/confirm", post(confirm_delivery))
        .route("/deliveries/:id/ready", post(mark_ready))
        .route("/deliveries/:id/pickup", post(pickup_delivery))
        .route("/deliveries/:id/complete", post(complete_delivery))
        .route("/deliveries/:id/override", post(override_delivery))
}

#[derive(Deserialize)]
pub struct WaitingQuery {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub courier_id: Uuid,
    pub eta_minutes: u32,
}

#[derive(Deserialize)]
pub struct BusinessActionRequest {
    pub business_id: Uuid,
}

#[derive(Deserialize)]
pub struct CourierActionRequest {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub manager_id: Uuid,
    #[serde(flatten)]
    pub change: OverrideChange,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDelivery>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::create_delivery(&state, payload)?;
    Ok(Json(delivery))
}

async fn list_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<Delivery>> {
    let mut deliveries: Vec<Delivery> = state
        .deliveries
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    deliveries.sort_by_key(|delivery| delivery.created_at);

    Json(deliveries)
}

async fn list_waiting(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WaitingQuery>,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let waiting = ops::list_waiting(&state, query.courier_id)?;
    Ok(Json(waiting))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .deliveries
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {} not found", id)))?;

    Ok(Json(delivery.value().clone()))
}

async fn claim_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::claim_delivery(&state, payload.courier_id, id, payload.eta_minutes)?;
    Ok(Json(delivery))
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BusinessActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::confirm_delivery(&state, payload.business_id, id)?;
    Ok(Json(delivery))
}

async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BusinessActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::mark_ready(&state, payload.business_id, id)?;
    Ok(Json(delivery))
}

async fn pickup_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::pickup_delivery(&state, payload.courier_id, id)?;
    Ok(Json(delivery))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::complete_delivery(&state, payload.courier_id, id)?;
    Ok(Json(delivery))
}

async fn override_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OverrideRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = ops::manager_override(&state, payload.manager_id, id, payload.change)?;
    Ok(Json(delivery))
}
