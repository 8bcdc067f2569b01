use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Waiting,
    Taken,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub business_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub business_confirmed: bool,
    pub business_ready: bool,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub customer_name: String,
    pub notes: Option<String>,
    pub preparation_minutes: u32,
    pub estimated_arrival_minutes: Option<u32>,
    pub payment: Option<f64>,
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Delivery {
    /// Checks the lifecycle invariants that must hold at every observable point.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            DeliveryStatus::Waiting => {
                self.courier_id.is_none()
                    && !self.business_confirmed
                    && !self.business_ready
                    && self.picked_up_at.is_none()
                    && self.completed_at.is_none()
            }
            DeliveryStatus::Taken | DeliveryStatus::Completed => {
                let courier_ok = self.courier_id.is_some();
                let confirmed_ok = !self.business_confirmed || self.courier_id.is_some();
                let ready_ok = !self.business_ready || self.business_confirmed;
                let pickup_ok = self.picked_up_at.is_none() || self.business_ready;
                let completed_ok = self.status != DeliveryStatus::Completed
                    || (self.picked_up_at.is_some() && self.completed_at.is_some());

                courier_ok && confirmed_ok && ready_ok && pickup_ok && completed_ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Delivery, DeliveryStatus};

    fn waiting_delivery() -> Delivery {
        Delivery {
            id: Uuid::from_u128(1),
            business_id: Uuid::from_u128(2),
            courier_id: None,
            status: DeliveryStatus::Waiting,
            business_confirmed: false,
            business_ready: false,
            pickup_address: "Alexanderplatz 1".to_string(),
            dropoff_address: "Kantstrasse 12".to_string(),
            customer_name: "Mia".to_string(),
            notes: None,
            preparation_minutes: 15,
            estimated_arrival_minutes: None,
            payment: None,
            distance_km: None,
            created_at: Utc::now(),
            confirmed_at: None,
            picked_up_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn fresh_waiting_delivery_is_consistent() {
        assert!(waiting_delivery().is_consistent());
    }

    #[test]
    fn waiting_delivery_with_courier_is_inconsistent() {
        let mut delivery = waiting_delivery();
        delivery.courier_id = Some(Uuid::from_u128(9));
        assert!(!delivery.is_consistent());
    }

    #[test]
    fn ready_without_confirmation_is_inconsistent() {
        let mut delivery = waiting_delivery();
        delivery.status = DeliveryStatus::Taken;
        delivery.courier_id = Some(Uuid::from_u128(9));
        delivery.business_ready = true;
        assert!(!delivery.is_consistent());
    }

    #[test]
    fn completed_without_timestamps_is_inconsistent() {
        let mut delivery = waiting_delivery();
        delivery.status = DeliveryStatus::Completed;
        delivery.courier_id = Some(Uuid::from_u128(9));
        delivery.business_confirmed = true;
        delivery.business_ready = true;
        assert!(!delivery.is_consistent());
    }
}
