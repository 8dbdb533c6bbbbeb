use async_trait::async_trait;
use notifier_config::ChannelEndpointConfig;
use notifier_domain::{entities::ChannelKind, ports::ChannelSender, reports::SendReceipt};
use notifier_errors::{NotifierError, NotifierResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// 通过 JSON-over-HTTP 中继投递消息
///
/// `POST {endpoint}`，携带 `Authorization: Bearer {api_key}`，
/// 请求体为 `{to, from, channel, subject?, body}`，成功响应为 `{id}`。
pub struct HttpRelaySender {
    channel: ChannelKind,
    config: ChannelEndpointConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct RelayRequest<'a> {
    to: &'a str,
    from: Option<&'a str>,
    channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    message: Option<String>,
}

impl HttpRelaySender {
    pub fn new(channel: ChannelKind, config: ChannelEndpointConfig) -> Self {
        Self {
            channel,
            config,
            http_client: reqwest::Client::new(),
        }
    }

    pub(crate) fn build_request<'a>(&'a self, identity: &'a str, message: &'a str) -> RelayRequest<'a> {
        RelayRequest {
            to: identity,
            from: self.config.sender.as_deref(),
            channel: self.channel,
            subject: match self.channel {
                ChannelKind::Email => self.config.subject.as_deref(),
                ChannelKind::Sms | ChannelKind::Whatsapp => None,
            },
            body: message,
        }
    }

    fn check_channel(&self, channel: ChannelKind) -> NotifierResult<()> {
        if channel != self.channel {
            return Err(NotifierError::config_error(format!(
                "{} 渠道的发送器不能发送 {} 消息",
                self.channel, channel
            )));
        }
        if !self.config.has_credentials() {
            return Err(NotifierError::config_error(format!(
                "渠道 {} 缺少 endpoint 或 api_key",
                self.channel
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for HttpRelaySender {
    #[instrument(skip(self, message))]
    async fn send(
        &self,
        identity: &str,
        channel: ChannelKind,
        message: &str,
    ) -> NotifierResult<SendReceipt> {
        self.check_channel(channel)?;

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(identity, message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            // 中继未返回消息ID时仍视为成功
            let receipt = match response.json::<RelayResponse>().await {
                Ok(body) => SendReceipt {
                    provider_message_id: body.id,
                },
                Err(e) => {
                    debug!("无法解析中继响应: {}", e);
                    SendReceipt::default()
                }
            };
            debug!("中继已接受发送给 {} 的消息", identity);
            return Ok(receipt);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<RelayErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {status}: {body}"));

        warn!("中继拒绝发送给 {} 的消息: HTTP {}", identity, status);
        Err(NotifierError::delivery(reason))
    }

    async fn ensure_ready(&self, channel: ChannelKind) -> NotifierResult<()> {
        self.check_channel(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_config() -> ChannelEndpointConfig {
        ChannelEndpointConfig {
            endpoint: "https://relay.example.com/v1/messages".to_string(),
            api_key: "secret".to_string(),
            sender: Some("hello@bannermind.example".to_string()),
            subject: Some("We are live".to_string()),
        }
    }

    #[test]
    fn test_email_request_carries_subject() {
        let sender = HttpRelaySender::new(ChannelKind::Email, email_config());
        let request = sender.build_request("ada@example.com", "hello");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["to"], "ada@example.com");
        assert_eq!(json["from"], "hello@bannermind.example");
        assert_eq!(json["channel"], "email");
        assert_eq!(json["subject"], "We are live");
        assert_eq!(json["body"], "hello");
    }

    #[test]
    fn test_phone_request_omits_subject() {
        let sender = HttpRelaySender::new(ChannelKind::Sms, email_config());
        let json = serde_json::to_value(sender.build_request("+15550001111", "hi")).unwrap();

        assert_eq!(json["channel"], "sms");
        assert!(json.get("subject").is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_not_ready() {
        let sender = HttpRelaySender::new(ChannelKind::Whatsapp, ChannelEndpointConfig::default());

        let err = sender.ensure_ready(ChannelKind::Whatsapp).await.unwrap_err();
        assert!(matches!(err, NotifierError::Configuration(_)));
        assert!(err.is_fatal());

        let err = sender
            .send("+15550001111", ChannelKind::Whatsapp, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_channel_mismatch_is_rejected() {
        let sender = HttpRelaySender::new(ChannelKind::Email, email_config());
        assert!(sender.ensure_ready(ChannelKind::Email).await.is_ok());
        assert!(sender.ensure_ready(ChannelKind::Sms).await.is_err());
    }
}
