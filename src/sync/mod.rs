//! Turns repeated session snapshots into at-most-one prompt per real
//! transition. There is no ordered event log a client can trust, so the
//! synchronizer diffs each snapshot against recorded session state; one
//! instance is shared by every view of the same login, which is what keeps
//! a prompt resolved in one view suppressed in all the others.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::models::snapshot::SessionSnapshot;
use crate::models::user::UserRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    NewDelivery { delivery_id: Uuid },
    CourierAssigned { delivery_id: Uuid },
    PromptClosed { delivery_id: Uuid, reason: CloseReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TakenByOther,
    ConfirmedElsewhere,
    NoLongerPending,
}

#[derive(Debug, Default)]
pub struct NotificationSync {
    previous_waiting_count: usize,
    previous_status: HashMap<Uuid, DeliveryStatus>,
    dismissed: HashSet<Uuid>,
    confirmed: HashSet<Uuid>,
    last_available: Option<bool>,
    open_waiting: Option<Uuid>,
    open_assigned: HashSet<Uuid>,
}

impl NotificationSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, snapshot: &SessionSnapshot) -> Vec<PromptEvent> {
        match snapshot.user.role {
            UserRole::Courier => self.observe_courier(snapshot),
            UserRole::Business => self.observe_business(snapshot),
            UserRole::Manager => Vec::new(),
        }
    }

    /// Marks a waiting-delivery prompt as resolved (accepted or rejected),
    /// so no view of this session raises it again.
    pub fn resolve_waiting_prompt(&mut self, delivery_id: Uuid) {
        self.dismissed.insert(delivery_id);
        if self.open_waiting == Some(delivery_id) {
            self.open_waiting = None;
        }
    }

    /// Marks a courier-assigned prompt as resolved by this business.
    pub fn resolve_assigned_prompt(&mut self, delivery_id: Uuid) {
        self.confirmed.insert(delivery_id);
        self.open_assigned.remove(&delivery_id);
    }

    pub fn open_waiting_prompt(&self) -> Option<Uuid> {
        self.open_waiting
    }

    fn observe_courier(&mut self, snapshot: &SessionSnapshot) -> Vec<PromptEvent> {
        let current = snapshot.waiting.len();

        if !snapshot.user.is_available {
            self.previous_waiting_count = current;
            self.last_available = Some(false);
            return Vec::new();
        }

        // whatever accumulated while off duty is the new baseline, not a
        // burst of fresh arrivals
        if self.last_available == Some(false) {
            self.previous_waiting_count = current;
        }

        let mut events = Vec::new();

        if let Some(open_id) = self.open_waiting {
            if !snapshot.waiting.iter().any(|d| d.id == open_id) {
                events.push(PromptEvent::PromptClosed {
                    delivery_id: open_id,
                    reason: CloseReason::TakenByOther,
                });
                self.open_waiting = None;
            }
        }

        if current > self.previous_waiting_count && self.open_waiting.is_none() {
            let candidate = snapshot
                .waiting
                .iter()
                .filter(|d| !self.dismissed.contains(&d.id))
                .min_by_key(|d| d.created_at);
            if let Some(delivery) = candidate {
                events.push(PromptEvent::NewDelivery {
                    delivery_id: delivery.id,
                });
                self.open_waiting = Some(delivery.id);
            }
        }

        self.previous_waiting_count = current;
        self.last_available = Some(true);
        events
    }

    fn observe_business(&mut self, snapshot: &SessionSnapshot) -> Vec<PromptEvent> {
        let mut events = Vec::new();

        for delivery in &snapshot.owned {
            if self.open_assigned.contains(&delivery.id) {
                if delivery.business_confirmed {
                    events.push(PromptEvent::PromptClosed {
                        delivery_id: delivery.id,
                        reason: CloseReason::ConfirmedElsewhere,
                    });
                    self.open_assigned.remove(&delivery.id);
                } else if delivery.status != DeliveryStatus::Taken {
                    events.push(PromptEvent::PromptClosed {
                        delivery_id: delivery.id,
                        reason: CloseReason::NoLongerPending,
                    });
                    self.open_assigned.remove(&delivery.id);
                }
            }

            let was_taken =
                self.previous_status.get(&delivery.id).copied() == Some(DeliveryStatus::Taken);
            if delivery.status == DeliveryStatus::Taken
                && !delivery.business_confirmed
                && !self.confirmed.contains(&delivery.id)
                && !was_taken
            {
                events.push(PromptEvent::CourierAssigned {
                    delivery_id: delivery.id,
                });
                self.open_assigned.insert(delivery.id);
            }

            self.previous_status.insert(delivery.id, delivery.status);
        }

        events
    }
}

/// Shared handle to one session's synchronizer. Every mounted view clones
/// the same handle; per-view copies would each fire their own prompts.
#[derive(Debug, Clone, Default)]
pub struct SyncHandle {
    inner: Arc<Mutex<NotificationSync>>,
}

impl SyncHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, snapshot: &SessionSnapshot) -> Vec<PromptEvent> {
        self.lock().observe(snapshot)
    }

    pub fn resolve_waiting_prompt(&self, delivery_id: Uuid) {
        self.lock().resolve_waiting_prompt(delivery_id);
    }

    pub fn resolve_assigned_prompt(&self, delivery_id: Uuid) {
        self.lock().resolve_assigned_prompt(delivery_id);
    }

    pub fn open_waiting_prompt(&self) -> Option<Uuid> {
        self.lock().open_waiting_prompt()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NotificationSync> {
        self.inner.lock().expect("notification sync lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::delivery::Delivery;
    use crate::models::user::User;

    fn courier(available: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Nadia".to_string(),
            role: UserRole::Courier,
            is_available: available,
            updated_at: Utc::now(),
        }
    }

    fn business() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Luna Cafe".to_string(),
            role: UserRole::Business,
            is_available: false,
            updated_at: Utc::now(),
        }
    }

    fn waiting_delivery(business_id: Uuid, minutes_ago: i64) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            business_id,
            courier_id: None,
            status: DeliveryStatus::Waiting,
            business_confirmed: false,
            business_ready: false,
            pickup_address: "12 Mill Lane".to_string(),
            dropoff_address: "4 Harbor Way".to_string(),
            customer_name: "Sam".to_string(),
            notes: None,
            preparation_minutes: 15,
            estimated_arrival_minutes: None,
            payment: Some(6.5),
            distance_km: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            confirmed_at: None,
            picked_up_at: None,
            completed_at: None,
        }
    }

    fn taken_delivery(business_id: Uuid, confirmed: bool) -> Delivery {
        let mut delivery = waiting_delivery(business_id, 5);
        delivery.status = DeliveryStatus::Taken;
        delivery.courier_id = Some(Uuid::new_v4());
        delivery.estimated_arrival_minutes = Some(12);
        delivery.business_confirmed = confirmed;
        if confirmed {
            delivery.confirmed_at = Some(Utc::now());
        }
        delivery
    }

    fn courier_snapshot(user: &User, waiting: Vec<Delivery>) -> SessionSnapshot {
        SessionSnapshot {
            user: user.clone(),
            waiting,
            owned: Vec::new(),
        }
    }

    fn business_snapshot(user: &User, owned: Vec<Delivery>) -> SessionSnapshot {
        SessionSnapshot {
            user: user.clone(),
            waiting: Vec::new(),
            owned,
        }
    }

    #[test]
    fn first_snapshot_prompts_earliest_waiting() {
        let rider = courier(true);
        let shop = Uuid::new_v4();
        let older = waiting_delivery(shop, 30);
        let newer = waiting_delivery(shop, 2);

        let mut sync = NotificationSync::new();
        let events = sync.observe(&courier_snapshot(&rider, vec![newer, older.clone()]));

        assert_eq!(
            events,
            vec![PromptEvent::NewDelivery {
                delivery_id: older.id
            }]
        );
    }

    #[test]
    fn unchanged_pool_stays_quiet() {
        let rider = courier(true);
        let delivery = waiting_delivery(Uuid::new_v4(), 10);
        let snapshot = courier_snapshot(&rider, vec![delivery.clone()]);

        let mut sync = NotificationSync::new();
        let first = sync.observe(&snapshot);
        sync.resolve_waiting_prompt(delivery.id);
        let second = sync.observe(&snapshot);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn dismissed_delivery_is_skipped_on_next_increase() {
        let rider = courier(true);
        let shop = Uuid::new_v4();
        let first = waiting_delivery(shop, 30);
        let second = waiting_delivery(shop, 20);

        let mut sync = NotificationSync::new();
        let events = sync.observe(&courier_snapshot(&rider, vec![first.clone()]));
        assert_eq!(
            events,
            vec![PromptEvent::NewDelivery {
                delivery_id: first.id
            }]
        );
        sync.resolve_waiting_prompt(first.id);

        let events =
            sync.observe(&courier_snapshot(&rider, vec![first.clone(), second.clone()]));
        assert_eq!(
            events,
            vec![PromptEvent::NewDelivery {
                delivery_id: second.id
            }]
        );
    }

    #[test]
    fn unavailable_courier_gets_no_prompts() {
        let rider = courier(false);
        let waiting = vec![
            waiting_delivery(Uuid::new_v4(), 10),
            waiting_delivery(Uuid::new_v4(), 5),
        ];

        let mut sync = NotificationSync::new();
        assert!(sync.observe(&courier_snapshot(&rider, waiting)).is_empty());
    }

    #[test]
    fn reactivation_treats_backlog_as_baseline() {
        let mut rider = courier(false);
        let shop = Uuid::new_v4();
        let backlog = vec![waiting_delivery(shop, 40), waiting_delivery(shop, 35)];

        let mut sync = NotificationSync::new();
        assert!(sync
            .observe(&courier_snapshot(&rider, backlog.clone()))
            .is_empty());

        rider.is_available = true;
        assert!(sync
            .observe(&courier_snapshot(&rider, backlog.clone()))
            .is_empty());

        let mut pool = backlog;
        pool.push(waiting_delivery(shop, 1));
        let events = sync.observe(&courier_snapshot(&rider, pool));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PromptEvent::NewDelivery { .. }));
    }

    #[test]
    fn open_prompt_blocks_a_second_one() {
        let rider = courier(true);
        let shop = Uuid::new_v4();
        let first = waiting_delivery(shop, 30);
        let second = waiting_delivery(shop, 1);

        let mut sync = NotificationSync::new();
        sync.observe(&courier_snapshot(&rider, vec![first.clone()]));
        let events = sync.observe(&courier_snapshot(&rider, vec![first, second]));

        assert!(events.is_empty());
    }

    #[test]
    fn prompt_closes_when_delivery_leaves_the_pool() {
        let rider = courier(true);
        let shop = Uuid::new_v4();
        let contested = waiting_delivery(shop, 30);
        let other = waiting_delivery(shop, 20);

        let mut sync = NotificationSync::new();
        sync.observe(&courier_snapshot(&rider, vec![contested.clone(), other.clone()]));
        let events = sync.observe(&courier_snapshot(&rider, vec![other]));

        assert_eq!(
            events,
            vec![PromptEvent::PromptClosed {
                delivery_id: contested.id,
                reason: CloseReason::TakenByOther,
            }]
        );
    }

    #[test]
    fn assignment_prompts_once_per_edge() {
        let shop = business();
        let mut delivery = waiting_delivery(shop.id, 10);

        let mut sync = NotificationSync::new();
        assert!(sync
            .observe(&business_snapshot(&shop, vec![delivery.clone()]))
            .is_empty());

        delivery.status = DeliveryStatus::Taken;
        delivery.courier_id = Some(Uuid::new_v4());
        let events = sync.observe(&business_snapshot(&shop, vec![delivery.clone()]));
        assert_eq!(
            events,
            vec![PromptEvent::CourierAssigned {
                delivery_id: delivery.id
            }]
        );

        assert!(sync
            .observe(&business_snapshot(&shop, vec![delivery]))
            .is_empty());
    }

    #[test]
    fn resolving_in_one_view_suppresses_the_other() {
        let shop = business();
        let delivery = taken_delivery(shop.id, false);
        let snapshot = business_snapshot(&shop, vec![delivery.clone()]);

        let handle = SyncHandle::new();
        let other_view = handle.clone();

        let events = handle.observe(&snapshot);
        assert_eq!(events.len(), 1);

        other_view.resolve_assigned_prompt(delivery.id);
        assert!(handle.observe(&snapshot).is_empty());
        assert!(other_view.observe(&snapshot).is_empty());
    }

    #[test]
    fn external_confirm_closes_the_open_prompt() {
        let shop = business();
        let mut delivery = taken_delivery(shop.id, false);

        let mut sync = NotificationSync::new();
        sync.observe(&business_snapshot(&shop, vec![delivery.clone()]));

        delivery.business_confirmed = true;
        delivery.confirmed_at = Some(Utc::now());
        let events = sync.observe(&business_snapshot(&shop, vec![delivery.clone()]));

        assert_eq!(
            events,
            vec![PromptEvent::PromptClosed {
                delivery_id: delivery.id,
                reason: CloseReason::ConfirmedElsewhere,
            }]
        );
    }

    #[test]
    fn requeue_closes_then_new_assignment_reprompts() {
        let shop = business();
        let mut delivery = taken_delivery(shop.id, false);
        let delivery_id = delivery.id;

        let mut sync = NotificationSync::new();
        assert_eq!(
            sync.observe(&business_snapshot(&shop, vec![delivery.clone()]))
                .len(),
            1
        );

        delivery.status = DeliveryStatus::Waiting;
        delivery.courier_id = None;
        delivery.estimated_arrival_minutes = None;
        let events = sync.observe(&business_snapshot(&shop, vec![delivery.clone()]));
        assert_eq!(
            events,
            vec![PromptEvent::PromptClosed {
                delivery_id,
                reason: CloseReason::NoLongerPending,
            }]
        );

        delivery.status = DeliveryStatus::Taken;
        delivery.courier_id = Some(Uuid::new_v4());
        let events = sync.observe(&business_snapshot(&shop, vec![delivery]));
        assert_eq!(
            events,
            vec![PromptEvent::CourierAssigned { delivery_id }]
        );
    }

    #[test]
    fn manager_snapshots_never_prompt() {
        let mut overseer = business();
        overseer.role = UserRole::Manager;
        let snapshot = SessionSnapshot {
            user: overseer,
            waiting: vec![waiting_delivery(Uuid::new_v4(), 5)],
            owned: vec![taken_delivery(Uuid::new_v4(), false)],
        };

        let mut sync = NotificationSync::new();
        assert!(sync.observe(&snapshot).is_empty());
    }
}
