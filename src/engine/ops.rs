use std::time::Instant;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::availability::{can_see_waiting_pool, waiting_pool};
use crate::engine::claim::{self, ClaimOutcome};
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::geo;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::event::DomainEvent;
use crate::models::snapshot::SessionSnapshot;
use crate::models::user::{User, UserRole};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDelivery {
    pub business_id: Uuid,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub customer_name: String,
    pub notes: Option<String>,
    pub preparation_minutes: u32,
    pub payment: Option<f64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverrideChange {
    pub status: Option<DeliveryStatus>,
    pub courier_id: Option<Uuid>,
}

pub fn register_user(state: &AppState, name: String, role: UserRole) -> Result<User, AppError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name,
        role,
        is_available: role == UserRole::Courier,
        updated_at: Utc::now(),
    };

    state.users.insert(user.id, user.clone());
    refresh_courier_gauge(state);

    info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok(user)
}

pub fn create_delivery(state: &AppState, req: CreateDelivery) -> Result<Delivery, AppError> {
    let business = fetch_user(state, req.business_id)?;
    require_role(&business, UserRole::Business, "create deliveries")?;

    if req.pickup_address.trim().is_empty() || req.dropoff_address.trim().is_empty() {
        return Err(AppError::Validation(
            "pickup and dropoff addresses are required".to_string(),
        ));
    }
    if req.customer_name.trim().is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if req.preparation_minutes == 0 {
        return Err(AppError::Validation(
            "preparation time must be positive".to_string(),
        ));
    }

    if let Some(key) = req.idempotency_key.clone() {
        // first writer records its row id under the key; a repeated submit
        // returns the original row instead of creating a sibling
        return match state.idempotency_keys.entry((business.id, key)) {
            Entry::Occupied(existing) => {
                let existing_id = *existing.get();
                state
                    .deliveries
                    .get(&existing_id)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "idempotency key refers to missing delivery {existing_id}"
                        ))
                    })
            }
            Entry::Vacant(slot) => {
                let delivery = commit_new_delivery(state, build_delivery(&req));
                slot.insert(delivery.id);
                Ok(delivery)
            }
        };
    }

    Ok(commit_new_delivery(state, build_delivery(&req)))
}

pub fn claim_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    eta_minutes: u32,
) -> Result<Delivery, AppError> {
    let courier = fetch_user(state, courier_id)?;
    require_role(&courier, UserRole::Courier, "claim deliveries")?;

    if eta_minutes == 0 {
        return Err(AppError::Validation(
            "estimated arrival must be positive".to_string(),
        ));
    }

    let start = Instant::now();
    let result = claim::claim(state, courier.id, delivery_id, eta_minutes);
    let elapsed = start.elapsed().as_secs_f64();

    let outcome = match &result {
        Ok(ClaimOutcome::Won(_)) => "won",
        Ok(ClaimOutcome::AlreadyOwned(_)) => "replayed",
        Err(AppError::Conflict(_)) => "conflict",
        Err(_) => "error",
    };
    state.metrics.claims_total.with_label_values(&[outcome]).inc();
    state
        .metrics
        .claim_latency_seconds
        .with_label_values(&[outcome])
        .observe(elapsed);

    match result? {
        ClaimOutcome::Won(delivery) => {
            refresh_waiting_gauge(state);
            let _ = state.events_tx.send(DomainEvent::DeliveryAssigned {
                delivery: delivery.clone(),
            });
            info!(
                delivery_id = %delivery.id,
                courier_id = %courier.id,
                eta_minutes,
                "delivery claimed"
            );
            Ok(delivery)
        }
        ClaimOutcome::AlreadyOwned(delivery) => {
            info!(
                delivery_id = %delivery.id,
                courier_id = %courier.id,
                "claim replayed by owner"
            );
            Ok(delivery)
        }
    }
}

pub fn confirm_delivery(
    state: &AppState,
    business_id: Uuid,
    delivery_id: Uuid,
) -> Result<Delivery, AppError> {
    let business = fetch_user(state, business_id)?;
    require_role(&business, UserRole::Business, "confirm deliveries")?;

    let mut entry = fetch_delivery_mut(state, delivery_id)?;
    if entry.business_id != business.id {
        return Err(AppError::Forbidden(
            "only the owning business may confirm this delivery".to_string(),
        ));
    }

    // a repeated confirm by the owner is a retry of a write that already
    // landed; report success with the current row
    if entry.business_confirmed {
        return Ok(entry.value().clone());
    }

    lifecycle::confirm(entry.value_mut(), Utc::now())?;
    let updated = entry.value().clone();
    drop(entry);

    state
        .metrics
        .transitions_total
        .with_label_values(&["confirm"])
        .inc();
    info!(delivery_id = %updated.id, business_id = %business.id, "delivery confirmed");
    Ok(updated)
}

pub fn mark_ready(
    state: &AppState,
    business_id: Uuid,
    delivery_id: Uuid,
) -> Result<Delivery, AppError> {
    let business = fetch_user(state, business_id)?;
    require_role(&business, UserRole::Business, "mark deliveries ready")?;

    let mut entry = fetch_delivery_mut(state, delivery_id)?;
    if entry.business_id != business.id {
        return Err(AppError::Forbidden(
            "only the owning business may mark this delivery ready".to_string(),
        ));
    }

    lifecycle::mark_ready(entry.value_mut())?;
    let updated = entry.value().clone();
    drop(entry);

    state
        .metrics
        .transitions_total
        .with_label_values(&["ready"])
        .inc();
    let _ = state.events_tx.send(DomainEvent::DeliveryReady {
        delivery: updated.clone(),
    });
    info!(delivery_id = %updated.id, business_id = %business.id, "delivery marked ready");
    Ok(updated)
}

pub fn pickup_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<Delivery, AppError> {
    let courier = fetch_user(state, courier_id)?;
    require_role(&courier, UserRole::Courier, "pick up deliveries")?;

    let mut entry = fetch_delivery_mut(state, delivery_id)?;
    if entry.courier_id != Some(courier.id) {
        return Err(AppError::Forbidden(
            "only the assigned courier may pick up this delivery".to_string(),
        ));
    }

    lifecycle::pickup(entry.value_mut(), Utc::now())?;
    let updated = entry.value().clone();
    drop(entry);

    state
        .metrics
        .transitions_total
        .with_label_values(&["pickup"])
        .inc();
    info!(delivery_id = %updated.id, courier_id = %courier.id, "delivery picked up");
    Ok(updated)
}

pub fn complete_delivery(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
) -> Result<Delivery, AppError> {
    let courier = fetch_user(state, courier_id)?;
    require_role(&courier, UserRole::Courier, "complete deliveries")?;

    let mut entry = fetch_delivery_mut(state, delivery_id)?;
    if entry.courier_id != Some(courier.id) {
        return Err(AppError::Forbidden(
            "only the assigned courier may complete this delivery".to_string(),
        ));
    }

    lifecycle::complete(entry.value_mut(), Utc::now())?;
    let updated = entry.value().clone();
    drop(entry);

    state
        .metrics
        .transitions_total
        .with_label_values(&["complete"])
        .inc();
    let _ = state.events_tx.send(DomainEvent::DeliveryCompleted {
        delivery: updated.clone(),
    });
    info!(delivery_id = %updated.id, courier_id = %courier.id, "delivery completed");
    Ok(updated)
}

pub fn set_availability(
    state: &AppState,
    actor_id: Uuid,
    courier_id: Uuid,
    available: bool,
) -> Result<User, AppError> {
    let actor = fetch_user(state, actor_id)?;
    let target = fetch_user(state, courier_id)?;

    if target.role != UserRole::Courier {
        return Err(AppError::Validation(
            "availability applies to couriers only".to_string(),
        ));
    }
    if actor.id != target.id && actor.role != UserRole::Manager {
        return Err(AppError::Forbidden(
            "only the courier or a manager may toggle availability".to_string(),
        ));
    }

    let updated = {
        let mut entry = state
            .users
            .get_mut(&courier_id)
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", courier_id)))?;

        // unchanged toggles are replays; no event, no gauge churn
        if entry.is_available == available {
            return Ok(entry.value().clone());
        }

        entry.is_available = available;
        entry.updated_at = Utc::now();
        entry.value().clone()
    };

    refresh_courier_gauge(state);
    let _ = state.events_tx.send(DomainEvent::AvailabilityChanged {
        user: updated.clone(),
    });
    info!(courier_id = %updated.id, available, "courier availability changed");
    Ok(updated)
}

pub fn list_waiting(state: &AppState, courier_id: Uuid) -> Result<Vec<Delivery>, AppError> {
    let courier = fetch_user(state, courier_id)?;

    if !can_see_waiting_pool(&courier) {
        return Ok(Vec::new());
    }

    Ok(waiting_pool(state))
}

pub fn manager_override(
    state: &AppState,
    manager_id: Uuid,
    delivery_id: Uuid,
    change: OverrideChange,
) -> Result<Delivery, AppError> {
    let manager = fetch_user(state, manager_id)?;
    require_role(&manager, UserRole::Manager, "override deliveries")?;

    if let Some(courier_id) = change.courier_id {
        let courier = fetch_user(state, courier_id)?;
        if courier.role != UserRole::Courier {
            return Err(AppError::Validation(format!(
                "user {} is not a courier",
                courier_id
            )));
        }
    }

    let mut entry = fetch_delivery_mut(state, delivery_id)?;
    let before_status = entry.status;
    let before_courier = entry.courier_id;

    lifecycle::apply_override(entry.value_mut(), change.status, change.courier_id, Utc::now())?;
    let updated = entry.value().clone();
    drop(entry);

    state
        .metrics
        .transitions_total
        .with_label_values(&["override"])
        .inc();
    refresh_waiting_gauge(state);

    match updated.status {
        DeliveryStatus::Taken
            if before_status != DeliveryStatus::Taken || before_courier != updated.courier_id =>
        {
            let _ = state.events_tx.send(DomainEvent::DeliveryAssigned {
                delivery: updated.clone(),
            });
        }
        DeliveryStatus::Completed => {
            let _ = state.events_tx.send(DomainEvent::DeliveryCompleted {
                delivery: updated.clone(),
            });
        }
        _ => {}
    }

    info!(
        delivery_id = %updated.id,
        manager_id = %manager.id,
        status = ?updated.status,
        "manager override applied"
    );
    Ok(updated)
}

pub fn snapshot(state: &AppState, user_id: Uuid) -> Result<SessionSnapshot, AppError> {
    let user = fetch_user(state, user_id)?;

    let waiting = if can_see_waiting_pool(&user) {
        waiting_pool(state)
    } else {
        Vec::new()
    };

    let mut owned: Vec<Delivery> = state
        .deliveries
        .iter()
        .filter(|entry| {
            let delivery = entry.value();
            match user.role {
                UserRole::Courier => delivery.courier_id == Some(user.id),
                UserRole::Business => delivery.business_id == user.id,
                UserRole::Manager => true,
            }
        })
        .map(|entry| entry.value().clone())
        .collect();
    owned.sort_by_key(|delivery| delivery.created_at);

    Ok(SessionSnapshot {
        user,
        waiting,
        owned,
    })
}

fn build_delivery(req: &CreateDelivery) -> Delivery {
    Delivery {
        id: Uuid::new_v4(),
        business_id: req.business_id,
        courier_id: None,
        status: DeliveryStatus::Waiting,
        business_confirmed: false,
        business_ready: false,
        pickup_address: req.pickup_address.clone(),
        dropoff_address: req.dropoff_address.clone(),
        customer_name: req.customer_name.clone(),
        notes: req.notes.clone(),
        preparation_minutes: req.preparation_minutes,
        estimated_arrival_minutes: None,
        payment: req.payment,
        distance_km: geo::estimate_distance_km(&req.pickup_address, &req.dropoff_address),
        created_at: Utc::now(),
        confirmed_at: None,
        picked_up_at: None,
        completed_at: None,
    }
}

fn commit_new_delivery(state: &AppState, delivery: Delivery) -> Delivery {
    state.deliveries.insert(delivery.id, delivery.clone());
    state.metrics.deliveries_created_total.inc();
    refresh_waiting_gauge(state);

    let _ = state.events_tx.send(DomainEvent::DeliveryCreated {
        delivery: delivery.clone(),
    });
    info!(
        delivery_id = %delivery.id,
        business_id = %delivery.business_id,
        "delivery created"
    );
    delivery
}

fn fetch_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))
}

fn fetch_delivery_mut(
    state: &AppState,
    id: Uuid,
) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, Delivery>, AppError> {
    state
        .deliveries
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {} not found", id)))
}

fn require_role(user: &User, role: UserRole, action: &str) -> Result<(), AppError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "only a {:?} may {}",
            role, action
        )))
    }
}

fn refresh_waiting_gauge(state: &AppState) {
    let waiting = state
        .deliveries
        .iter()
        .filter(|entry| entry.value().status == DeliveryStatus::Waiting)
        .count();
    state.metrics.waiting_deliveries.set(waiting as i64);
}

fn refresh_courier_gauge(state: &AppState) {
    let available = state
        .users
        .iter()
        .filter(|entry| can_see_waiting_pool(entry.value()))
        .count();
    state.metrics.couriers_available.set(available as i64);
}
