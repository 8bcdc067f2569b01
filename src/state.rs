use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::delivery::Delivery;
use crate::models::event::DomainEvent;
use crate::models::user::User;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub users: DashMap<Uuid, User>,
    pub deliveries: DashMap<Uuid, Delivery>,
    pub idempotency_keys: DashMap<(Uuid, String), Uuid>,
    pub events_tx: broadcast::Sender<DomainEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            users: DashMap::new(),
            deliveries: DashMap::new(),
            idempotency_keys: DashMap::new(),
            events_tx,
            metrics: Metrics::new(),
        }
    }
}
