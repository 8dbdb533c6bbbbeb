use serde::{Deserialize, Serialize};

/// 单个渠道的中继端点
///
/// 凭证缺失不会在加载时报错，而是在分发前的渠道检查中中止整个分发。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelEndpointConfig {
    pub endpoint: String,
    pub api_key: String,
    /// 发件地址或号码
    pub sender: Option<String>,
    /// 仅邮件渠道使用
    pub subject: Option<String>,
}

impl ChannelEndpointConfig {
    pub fn has_credentials(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.endpoint.is_empty()
            && !self.endpoint.starts_with("http://")
            && !self.endpoint.starts_with("https://")
        {
            return Err(anyhow::anyhow!("渠道端点必须是HTTP(S) URL: {}", self.endpoint));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub email: Option<ChannelEndpointConfig>,
    pub sms: Option<ChannelEndpointConfig>,
    pub whatsapp: Option<ChannelEndpointConfig>,
}

impl ChannelsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, channel) in [
            ("email", &self.email),
            ("sms", &self.sms),
            ("whatsapp", &self.whatsapp),
        ] {
            if let Some(channel) = channel {
                channel
                    .validate()
                    .map_err(|e| anyhow::anyhow!("渠道 {name} 配置无效: {e}"))?;
            }
        }
        Ok(())
    }
}
