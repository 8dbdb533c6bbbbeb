use async_trait::async_trait;
use notifier_config::ChannelsConfig;
use notifier_domain::{entities::ChannelKind, ports::ChannelSender, reports::SendReceipt};
use notifier_errors::{NotifierError, NotifierResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::http_relay::HttpRelaySender;

/// 按渠道把消息转交给对应的发送器
#[derive(Default)]
pub struct ChannelRouter {
    senders: HashMap<ChannelKind, Arc<dyn ChannelSender>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为每个已配置的渠道注册一个 HTTP 中继发送器
    pub fn from_config(config: &ChannelsConfig) -> Self {
        let mut router = Self::new();
        for (channel, endpoint) in [
            (ChannelKind::Email, &config.email),
            (ChannelKind::Sms, &config.sms),
            (ChannelKind::Whatsapp, &config.whatsapp),
        ] {
            if let Some(endpoint) = endpoint {
                router.register(
                    channel,
                    Arc::new(HttpRelaySender::new(channel, endpoint.clone())),
                );
            }
        }
        router
    }

    pub fn register(&mut self, channel: ChannelKind, sender: Arc<dyn ChannelSender>) {
        debug!("注册渠道发送器: {}", channel);
        self.senders.insert(channel, sender);
    }

    pub fn with_sender(mut self, channel: ChannelKind, sender: Arc<dyn ChannelSender>) -> Self {
        self.register(channel, sender);
        self
    }

    pub fn channels(&self) -> Vec<ChannelKind> {
        let mut channels: Vec<ChannelKind> = self.senders.keys().copied().collect();
        channels.sort();
        channels
    }

    fn route(&self, channel: ChannelKind) -> NotifierResult<&Arc<dyn ChannelSender>> {
        self.senders
            .get(&channel)
            .ok_or_else(|| NotifierError::config_error(format!("未配置渠道: {channel}")))
    }
}

#[async_trait]
impl ChannelSender for ChannelRouter {
    async fn send(
        &self,
        identity: &str,
        channel: ChannelKind,
        message: &str,
    ) -> NotifierResult<SendReceipt> {
        self.route(channel)?.send(identity, channel, message).await
    }

    async fn ensure_ready(&self, channel: ChannelKind) -> NotifierResult<()> {
        self.route(channel)?.ensure_ready(channel).await
    }
}
