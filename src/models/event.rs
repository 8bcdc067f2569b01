use serde::{Deserialize, Serialize};

use crate::models::delivery::Delivery;
use crate::models::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DomainEvent {
    #[serde(rename = "delivery.created")]
    DeliveryCreated { delivery: Delivery },

    #[serde(rename = "delivery.assigned")]
    DeliveryAssigned { delivery: Delivery },

    #[serde(rename = "delivery.ready")]
    DeliveryReady { delivery: Delivery },

    #[serde(rename = "delivery.completed")]
    DeliveryCompleted { delivery: Delivery },

    #[serde(rename = "user.availabilityChanged")]
    AvailabilityChanged { user: User },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::DomainEvent;
    use crate::models::user::{User, UserRole};

    #[test]
    fn events_serialize_with_dotted_names() {
        let event = DomainEvent::AvailabilityChanged {
            user: User {
                id: Uuid::from_u128(7),
                name: "Nora".to_string(),
                role: UserRole::Courier,
                is_available: true,
                updated_at: Utc::now(),
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "user.availabilityChanged");
        assert_eq!(value["user"]["name"], "Nora");
    }
}
