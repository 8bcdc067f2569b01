use serde::{Deserialize, Serialize};

use crate::models::delivery::Delivery;
use crate::models::user::User;

/// Point-in-time view of the store as one user sees it. Clients poll this and
/// feed consecutive snapshots into the notification synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user: User,
    pub waiting: Vec<Delivery>,
    pub owned: Vec<Delivery>,
}
