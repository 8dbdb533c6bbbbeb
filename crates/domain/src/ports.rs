use async_trait::async_trait;

use crate::entities::ChannelKind;
use crate::reports::SendReceipt;
use notifier_errors::NotifierResult;

/// 通过某个外部渠道投递消息
///
/// 失败必须以 `Err` 返回，不能静默吞掉。
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(
        &self,
        identity: &str,
        channel: ChannelKind,
        message: &str,
    ) -> NotifierResult<SendReceipt>;

    /// 发送前的前置检查（例如凭证是否配置）。
    ///
    /// 返回错误时整个分发调用中止，不会触碰任何订阅者。
    async fn ensure_ready(&self, _channel: ChannelKind) -> NotifierResult<()> {
        Ok(())
    }
}
