pub mod delivery;
pub mod event;
pub mod snapshot;
pub mod user;
