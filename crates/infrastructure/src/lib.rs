pub mod channels;
pub mod database;
pub mod error_handling;
pub mod observability;

pub use channels::*;
pub use database::*;
pub use observability::init_logging;
