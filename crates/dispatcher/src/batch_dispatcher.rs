use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, error, info, instrument, warn};

use notifier_domain::entities::{ChannelKind, Recipient};
use notifier_domain::ports::ChannelSender;
use notifier_domain::reports::{
    BatchSummary, DispatchOptions, DispatchReport, FailedDelivery, FailureKind, SentDelivery,
};
use notifier_domain::repositories::RecipientRepository;
use notifier_errors::{NotifierError, NotifierResult};

use crate::delivery_tracker::DeliveryTracker;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// 单个订阅者的投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent(SentDelivery),
    Failed(FailedDelivery),
}

/// 批量分发器
///
/// 按订阅时间顺序把待通知的订阅者切分为固定大小的批次，批内并发发送，
/// 批次之间严格串行并按配置暂停。单个订阅者的失败只会记录到报告中，
/// 不会中断本次分发。
pub struct BatchDispatcher {
    recipient_repo: Arc<dyn RecipientRepository>,
    sender: Arc<dyn ChannelSender>,
    tracker: DeliveryTracker,
    default_message: String,
    send_timeout: Duration,
}

impl BatchDispatcher {
    pub fn new(
        recipient_repo: Arc<dyn RecipientRepository>,
        sender: Arc<dyn ChannelSender>,
        default_message: String,
    ) -> Self {
        Self {
            tracker: DeliveryTracker::new(recipient_repo.clone()),
            recipient_repo,
            sender,
            default_message,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn default_message(&self) -> &str {
        &self.default_message
    }

    /// 向所有待通知的订阅者发送消息
    ///
    /// `message` 为空时使用默认消息。预览模式只返回将被联系的订阅者，
    /// 不调用发送渠道，也不修改任何记录。
    #[instrument(skip(self, message), fields(batch_size = options.batch_size, dry_run = options.dry_run))]
    pub async fn dispatch(
        &self,
        message: Option<&str>,
        options: &DispatchOptions,
    ) -> NotifierResult<DispatchReport> {
        options.validate()?;
        let message = self.resolve_message(message);

        let pending = self.recipient_repo.list_pending().await?;
        if pending.is_empty() {
            info!("没有待通知的订阅者");
            return Ok(DispatchReport::empty());
        }

        info!("找到 {} 位待通知的订阅者", pending.len());

        if options.dry_run {
            info!("预览模式，不发送任何消息");
            return Ok(DispatchReport::preview(&pending));
        }

        self.ensure_channels_ready(&pending).await?;
        Ok(self.run_batches(pending, message, options).await)
    }

    fn resolve_message<'a>(&'a self, message: Option<&'a str>) -> &'a str {
        message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.default_message)
    }

    /// 检查本次涉及的每个渠道都已配置完成，任一渠道不可用则整体失败
    pub(crate) async fn ensure_channels_ready(&self, recipients: &[Recipient]) -> NotifierResult<()> {
        let channels: BTreeSet<ChannelKind> = recipients.iter().map(|r| r.channel).collect();
        for channel in channels {
            if let Err(e) = self.sender.ensure_ready(channel).await {
                error!("渠道 {} 不可用，取消本次分发: {}", channel, e);
                return Err(match e {
                    NotifierError::Configuration(_) => e,
                    other => NotifierError::config_error(format!("渠道 {channel} 不可用: {other}")),
                });
            }
        }
        Ok(())
    }

    /// 按批次处理给定的订阅者，每位订阅者恰好出现在成功或失败列表中一次
    pub(crate) async fn run_batches(
        &self,
        recipients: Vec<Recipient>,
        message: &str,
        options: &DispatchOptions,
    ) -> DispatchReport {
        let total = recipients.len();
        let batch_size = options.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let mut report = DispatchReport::started(total);
        let mut processed = 0;

        for (index, chunk) in recipients.chunks(batch_size).enumerate() {
            debug!("开始处理批次 {}/{}，共 {} 位", index + 1, total_batches, chunk.len());

            // 批内全部完成后才进入下一批
            let outcomes = join_all(chunk.iter().map(|r| self.deliver_one(r, message))).await;

            let mut summary = BatchSummary {
                index: index + 1,
                identities: chunk.iter().map(|r| r.identity.clone()).collect(),
                sent: 0,
                failed: 0,
            };
            for outcome in outcomes {
                match outcome {
                    DeliveryOutcome::Sent(sent) => {
                        summary.sent += 1;
                        report.push_sent(sent);
                    }
                    DeliveryOutcome::Failed(failed) => {
                        summary.failed += 1;
                        report.push_failed(failed);
                    }
                }
            }
            report.push_batch(summary);
            counter!("notifier_batches_total").increment(1);

            processed += chunk.len();
            info!(
                "进度: 批次 {}/{}，已处理 {}/{}",
                index + 1,
                total_batches,
                processed,
                total
            );

            if index + 1 < total_batches && options.delay_between_batches_ms > 0 {
                tokio::time::sleep(options.delay()).await;
            }
        }

        report.finish();
        info!("{}", report.summary);
        report
    }

    /// 发送给单个订阅者并记录结果，不会返回错误
    pub(crate) async fn deliver_one(&self, recipient: &Recipient, message: &str) -> DeliveryOutcome {
        let send = self
            .sender
            .send(&recipient.identity, recipient.channel, message);
        let result = match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(NotifierError::Timeout(format!(
                "发送超过 {}ms 未完成",
                self.send_timeout.as_millis()
            ))),
        };

        match result {
            Ok(receipt) => match self.tracker.mark_notified(recipient).await {
                Ok(_) => {
                    counter!("notifier_sends_total", "outcome" => "sent").increment(1);
                    info!("已发送给 {}", recipient.identity);
                    DeliveryOutcome::Sent(SentDelivery {
                        identity: recipient.identity.clone(),
                        channel: recipient.channel,
                        provider_message_id: receipt.provider_message_id,
                    })
                }
                Err(e) => {
                    counter!("notifier_tracking_failures_total").increment(1);
                    error!("已发送给 {}，但记录通知状态失败: {}", recipient.identity, e);
                    self.tracking_failure(recipient, format!("消息已发送，但记录通知状态失败: {e}"))
                }
            },
            Err(send_error) => {
                let reason = send_error.failure_reason();
                counter!("notifier_sends_total", "outcome" => "failed").increment(1);
                warn!("发送给 {} 失败: {}", recipient.identity, reason);

                match self.tracker.record_failed_attempt(recipient, &reason).await {
                    Ok(_) => DeliveryOutcome::Failed(FailedDelivery {
                        identity: recipient.identity.clone(),
                        channel: recipient.channel,
                        error: reason,
                        kind: FailureKind::Delivery,
                    }),
                    Err(e) => {
                        counter!("notifier_tracking_failures_total").increment(1);
                        error!("记录 {} 的失败次数时出错: {}", recipient.identity, e);
                        self.tracking_failure(recipient, format!("{reason}; 记录失败次数时出错: {e}"))
                    }
                }
            }
        }
    }

    fn tracking_failure(&self, recipient: &Recipient, error: String) -> DeliveryOutcome {
        DeliveryOutcome::Failed(FailedDelivery {
            identity: recipient.identity.clone(),
            channel: recipient.channel,
            error,
            kind: FailureKind::Tracking,
        })
    }
}
