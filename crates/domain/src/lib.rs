pub mod entities;
pub mod ports;
pub mod reports;
pub mod repositories;
pub mod value_objects;

// SQLx 实现（仅在启用 sqlx-support feature 时编译）
#[cfg(feature = "sqlx-support")]
pub mod sqlx_impls;

pub use entities::*;
pub use notifier_errors::{NotifierError, NotifierResult};
pub use ports::*;
pub use reports::*;
pub use repositories::*;
pub use value_objects::*;
