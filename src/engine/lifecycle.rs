//! Transition guards for the delivery lifecycle. Each function checks the
//! preconditions for one transition and applies it in place, or returns a
//! `Conflict` naming the blocking condition. Callers never retry these
//! automatically; they re-read state and choose another action.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};

pub fn confirm(delivery: &mut Delivery, now: DateTime<Utc>) -> Result<(), AppError> {
    match delivery.status {
        DeliveryStatus::Waiting => {
            return Err(AppError::Conflict(
                "delivery has no courier yet".to_string(),
            ));
        }
        DeliveryStatus::Completed => {
            return Err(AppError::Conflict(
                "delivery is already completed".to_string(),
            ));
        }
        DeliveryStatus::Taken => {}
    }

    if delivery.courier_id.is_none() {
        return Err(AppError::Conflict(
            "delivery has no courier yet".to_string(),
        ));
    }

    if delivery.business_confirmed {
        return Err(AppError::Conflict(
            "delivery is already confirmed".to_string(),
        ));
    }

    delivery.business_confirmed = true;
    delivery.confirmed_at = Some(now);
    Ok(())
}

pub fn mark_ready(delivery: &mut Delivery) -> Result<(), AppError> {
    if !delivery.business_confirmed {
        return Err(AppError::Conflict(
            "delivery is not confirmed yet".to_string(),
        ));
    }

    if delivery.business_ready {
        return Err(AppError::Conflict(
            "delivery is already marked ready".to_string(),
        ));
    }

    delivery.business_ready = true;
    Ok(())
}

pub fn pickup(delivery: &mut Delivery, now: DateTime<Utc>) -> Result<(), AppError> {
    if delivery.picked_up_at.is_some() {
        return Err(AppError::Conflict(
            "delivery is already picked up".to_string(),
        ));
    }

    if !delivery.business_ready {
        return Err(AppError::Conflict(
            "delivery is not marked ready yet".to_string(),
        ));
    }

    delivery.picked_up_at = Some(now);
    Ok(())
}

pub fn complete(delivery: &mut Delivery, now: DateTime<Utc>) -> Result<(), AppError> {
    if delivery.status == DeliveryStatus::Completed {
        return Err(AppError::Conflict(
            "delivery is already completed".to_string(),
        ));
    }

    if delivery.picked_up_at.is_none() {
        return Err(AppError::Conflict(
            "delivery is not picked up yet".to_string(),
        ));
    }

    delivery.status = DeliveryStatus::Completed;
    delivery.completed_at = Some(now);
    Ok(())
}

/// Privileged manager transition. Bypasses the per-transition guards above but
/// re-validates the resulting row, so the lifecycle invariants stay true even
/// under dispute resolution. Completed rows are immutable, overrides included.
pub fn apply_override(
    delivery: &mut Delivery,
    status: Option<DeliveryStatus>,
    courier_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if delivery.status == DeliveryStatus::Completed {
        return Err(AppError::Conflict(
            "completed deliveries are immutable".to_string(),
        ));
    }

    let target_status = status.unwrap_or(delivery.status);
    let target_courier = courier_id.or(delivery.courier_id);

    match target_status {
        DeliveryStatus::Waiting => {
            if courier_id.is_some() {
                return Err(AppError::Conflict(
                    "a waiting delivery cannot hold a courier".to_string(),
                ));
            }

            delivery.status = DeliveryStatus::Waiting;
            delivery.courier_id = None;
            delivery.business_confirmed = false;
            delivery.business_ready = false;
            delivery.estimated_arrival_minutes = None;
            delivery.confirmed_at = None;
            delivery.picked_up_at = None;
            delivery.completed_at = None;
        }
        DeliveryStatus::Taken => {
            let Some(courier) = target_courier else {
                return Err(AppError::Conflict(
                    "a taken delivery requires a courier".to_string(),
                ));
            };

            delivery.status = DeliveryStatus::Taken;
            delivery.courier_id = Some(courier);
        }
        DeliveryStatus::Completed => {
            let Some(courier) = target_courier else {
                return Err(AppError::Conflict(
                    "a completed delivery requires a courier".to_string(),
                ));
            };

            delivery.status = DeliveryStatus::Completed;
            delivery.courier_id = Some(courier);
            delivery.business_confirmed = true;
            delivery.business_ready = true;
            delivery.confirmed_at.get_or_insert(now);
            delivery.picked_up_at.get_or_insert(now);
            delivery.completed_at = Some(now);
        }
    }

    Ok(())
}
