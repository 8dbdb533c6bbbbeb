//! Notification dispatch engine
//!
//! Sends a broadcast message to every pending recipient in fixed-size,
//! concurrently delivered batches, records each outcome on the recipient,
//! and resubmits earlier failures below the attempt ceiling.

pub mod batch_dispatcher;
pub mod delivery_tracker;
pub mod retry_service;
pub mod subscription_service;

pub use batch_dispatcher::*;
pub use delivery_tracker::*;
pub use retry_service::*;
pub use subscription_service::*;
