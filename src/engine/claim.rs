//! Arbitration for the Waiting → Taken transition, the one operation racing
//! across clients. The row is mutated under its dashmap shard write lock, so
//! the status check and the courier assignment commit as a single conditional
//! write: exactly one concurrent claimer wins, the rest observe Taken.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// This call performed the Waiting → Taken transition.
    Won(Delivery),
    /// The caller already owned the delivery; a retry after an earlier claim
    /// that actually went through. Returned as success, original eta kept.
    AlreadyOwned(Delivery),
}

pub fn claim(
    state: &AppState,
    courier_id: Uuid,
    delivery_id: Uuid,
    eta_minutes: u32,
) -> Result<ClaimOutcome, AppError> {
    let mut entry = state
        .deliveries
        .get_mut(&delivery_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {} not found", delivery_id)))?;

    let delivery = entry.value_mut();
    match delivery.status {
        DeliveryStatus::Waiting => {
            delivery.status = DeliveryStatus::Taken;
            delivery.courier_id = Some(courier_id);
            delivery.estimated_arrival_minutes = Some(eta_minutes);
            Ok(ClaimOutcome::Won(delivery.clone()))
        }
        DeliveryStatus::Taken if delivery.courier_id == Some(courier_id) => {
            Ok(ClaimOutcome::AlreadyOwned(delivery.clone()))
        }
        DeliveryStatus::Taken => Err(AppError::Conflict(
            "delivery was already taken by another courier".to_string(),
        )),
        DeliveryStatus::Completed => Err(AppError::Conflict(
            "delivery is already completed".to_string(),
        )),
    }
}
