use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::user::{User, UserRole};
use crate::state::AppState;

/// Visibility gate for the waiting pool. Listing filters entirely through
/// this predicate; it never hides a courier's own taken deliveries.
pub fn can_see_waiting_pool(user: &User) -> bool {
    user.role == UserRole::Courier && user.is_available
}

pub fn waiting_pool(state: &AppState) -> Vec<Delivery> {
    let mut pool: Vec<Delivery> = state
        .deliveries
        .iter()
        .filter(|entry| entry.value().status == DeliveryStatus::Waiting)
        .map(|entry| entry.value().clone())
        .collect();

    pool.sort_by_key(|delivery| delivery.created_at);
    pool
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::can_see_waiting_pool;
    use crate::models::user::{User, UserRole};

    fn user(role: UserRole, is_available: bool) -> User {
        User {
            id: Uuid::from_u128(1),
            name: "test-user".to_string(),
            role,
            is_available,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn available_courier_sees_the_pool() {
        assert!(can_see_waiting_pool(&user(UserRole::Courier, true)));
    }

    #[test]
    fn unavailable_courier_is_gated() {
        assert!(!can_see_waiting_pool(&user(UserRole::Courier, false)));
    }

    #[test]
    fn non_couriers_are_gated_regardless_of_flag() {
        assert!(!can_see_waiting_pool(&user(UserRole::Business, true)));
        assert!(!can_see_waiting_pool(&user(UserRole::Manager, true)));
    }
}
