pub mod models;

pub use models::{
    AppConfig, ChannelEndpointConfig, ChannelsConfig, DatabaseConfig, DispatchConfig,
    LoggingConfig, DEFAULT_LAUNCH_MESSAGE,
};

#[cfg(test)]
mod tests;
