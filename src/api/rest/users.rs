use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ops;
use crate::error::AppError;
use crate::models::snapshot::SessionSnapshot;
use crate::models::user::{User, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/availability", patch(set_availability))
        .route("/users/:id/snapshot", get(get_snapshot))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub role: UserRole,
}

#[derive(Deserialize)]
pub struct SetAvailabilityRequest {
    pub actor_id: Uuid,
    pub available: bool,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<User>, AppError> {
    let user = ops::register_user(&state, payload.name, payload.role)?;
    Ok(Json(user))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    let users = state
        .users
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(users)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    Ok(Json(user.value().clone()))
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAvailabilityRequest>,
) -> Result<Json<User>, AppError> {
    let user = ops::set_availability(&state, payload.actor_id, id, payload.available)?;
    Ok(Json(user))
}

async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = ops::snapshot(&state, id)?;
    Ok(Json(snapshot))
}
