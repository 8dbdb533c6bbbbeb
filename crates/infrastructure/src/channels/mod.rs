pub mod http_relay;
pub mod router;

pub use http_relay::HttpRelaySender;
pub use router::ChannelRouter;
