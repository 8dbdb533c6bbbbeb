pub mod app_config;
pub mod channels;
pub mod database;
pub mod dispatch;
pub mod logging;

pub use app_config::AppConfig;
pub use channels::{ChannelEndpointConfig, ChannelsConfig};
pub use database::DatabaseConfig;
pub use dispatch::{DispatchConfig, DEFAULT_LAUNCH_MESSAGE};
pub use logging::LoggingConfig;
