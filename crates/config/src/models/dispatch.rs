use serde::{Deserialize, Serialize};

pub const DEFAULT_LAUNCH_MESSAGE: &str = "🎉 BannerMind is live!

Start creating stunning banners now with AI power.

👉 https://bannermind.vercel.app

Thank you for your patience!";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub batch_size: usize,
    pub delay_between_batches_ms: u64,
    /// 单次渠道发送的超时时间
    pub send_timeout_ms: u64,
    /// 自动重试的失败次数上限
    pub max_attempts: u32,
    pub default_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay_between_batches_ms: 1000,
            send_timeout_ms: 15_000,
            max_attempts: 3,
            default_message: DEFAULT_LAUNCH_MESSAGE.to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("批次大小必须大于0"));
        }

        if self.send_timeout_ms == 0 {
            return Err(anyhow::anyhow!("发送超时时间必须大于0"));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }

        if self.default_message.trim().is_empty() {
            return Err(anyhow::anyhow!("默认通知内容不能为空"));
        }

        Ok(())
    }
}
