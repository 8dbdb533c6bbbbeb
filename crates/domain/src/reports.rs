//! 分发选项与分发报告
//!
//! 报告只在一次调用中存在，不做持久化；调用方负责记录或保存。

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entities::{ChannelKind, Recipient};
use notifier_errors::{NotifierError, NotifierResult};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000;

/// 单次分发的参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchOptions {
    /// 每批最大并发发送数
    pub batch_size: usize,
    /// 批次之间的暂停时间，最后一批之后不暂停
    pub delay_between_batches_ms: u64,
    /// 只预览将被联系的订阅者，不发送也不修改状态
    pub dry_run: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay_between_batches_ms: DEFAULT_BATCH_DELAY_MS,
            dry_run: false,
        }
    }
}

impl DispatchOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_between_batches_ms = delay_ms;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_batches_ms)
    }

    pub fn validate(&self) -> NotifierResult<()> {
        if self.batch_size == 0 {
            return Err(NotifierError::validation_error("批次大小必须大于0"));
        }
        Ok(())
    }
}

/// 渠道发送成功后的回执
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
}

impl SendReceipt {
    pub fn with_id<S: Into<String>>(id: S) -> Self {
        Self {
            provider_message_id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentDelivery {
    pub identity: String,
    pub channel: ChannelKind,
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// 渠道拒绝、网络错误或超时，已计入订阅者的失败次数
    Delivery,
    /// 记录结果时存储写入失败，订阅者保持原状态
    Tracking,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedDelivery {
    pub identity: String,
    pub channel: ChannelKind,
    pub error: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewEntry {
    pub identity: String,
    pub channel: ChannelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    /// 从1开始
    pub index: usize,
    pub identities: Vec<String>,
    pub sent: usize,
    pub failed: usize,
}

/// 一次分发调用的汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchReport {
    pub dry_run: bool,
    pub summary: String,
    pub total_considered: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    pub sent: Vec<SentDelivery>,
    pub failed: Vec<FailedDelivery>,
    pub batches: Vec<BatchSummary>,
    pub preview: Vec<PreviewEntry>,
}

impl DispatchReport {
    pub fn empty() -> Self {
        Self {
            summary: "没有待通知的订阅者".to_string(),
            ..Default::default()
        }
    }

    pub fn preview(recipients: &[Recipient]) -> Self {
        Self {
            dry_run: true,
            summary: format!("预览模式: 将向 {} 位订阅者发送通知", recipients.len()),
            total_considered: recipients.len(),
            preview: recipients
                .iter()
                .map(|r| PreviewEntry {
                    identity: r.identity.clone(),
                    channel: r.channel,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn started(total_considered: usize) -> Self {
        Self {
            total_considered,
            ..Default::default()
        }
    }

    pub fn push_sent(&mut self, delivery: SentDelivery) {
        self.sent.push(delivery);
        self.sent_count = self.sent.len();
    }

    pub fn push_failed(&mut self, failure: FailedDelivery) {
        self.failed.push(failure);
        self.failed_count = self.failed.len();
    }

    pub fn push_batch(&mut self, batch: BatchSummary) {
        self.batches.push(batch);
    }

    pub fn finish(&mut self) {
        self.summary = format!(
            "通知发送完成: 共 {} 位，成功 {}，失败 {}",
            self.total_considered, self.sent_count, self.failed_count
        );
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn tracking_failures(&self) -> impl Iterator<Item = &FailedDelivery> {
        self.failed
            .iter()
            .filter(|f| f.kind == FailureKind::Tracking)
    }

    /// 每位被考虑的订阅者都恰好出现在成功或失败列表中
    pub fn is_complete(&self) -> bool {
        self.dry_run || self.sent_count + self.failed_count == self.total_considered
    }
}

/// 重试失败通知的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// 没有可重试的订阅者，与“发送了0条”区分开
    NothingToRetry,
    Retried(DispatchReport),
}

impl RetryOutcome {
    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            RetryOutcome::NothingToRetry => None,
            RetryOutcome::Retried(report) => Some(report),
        }
    }

    pub fn retried(&self) -> usize {
        self.report().map_or(0, |r| r.total_considered)
    }
}
