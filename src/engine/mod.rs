pub mod availability;
pub mod claim;
pub mod lifecycle;
pub mod ops;
