use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use notifier_domain::entities::Recipient;
use notifier_domain::reports::{DispatchOptions, RetryOutcome};
use notifier_domain::repositories::RecipientRepository;
use notifier_errors::{NotifierError, NotifierResult};

use crate::batch_dispatcher::BatchDispatcher;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 重试服务接口
#[async_trait]
pub trait RetryService: Send + Sync {
    /// 重新发送给失败次数低于上限的订阅者
    async fn retry_failed(&self, max_attempts: u32) -> NotifierResult<RetryOutcome>;

    /// 列出可重试的订阅者，不发送
    async fn scan_retry_candidates(&self, max_attempts: u32) -> NotifierResult<Vec<Recipient>>;
}

/// 重试服务实现
///
/// 复用分发器的批次处理，批次大小与批间暂停取自构造时的选项。
/// 失败次数已达到上限的订阅者不会被自动重试。
pub struct FailedDeliveryRetryService {
    recipient_repo: Arc<dyn RecipientRepository>,
    dispatcher: Arc<BatchDispatcher>,
    options: DispatchOptions,
}

impl FailedDeliveryRetryService {
    pub fn new(
        recipient_repo: Arc<dyn RecipientRepository>,
        dispatcher: Arc<BatchDispatcher>,
        options: Option<DispatchOptions>,
    ) -> Self {
        Self {
            recipient_repo,
            dispatcher,
            options: options.unwrap_or_default().dry_run(false),
        }
    }
}

#[async_trait]
impl RetryService for FailedDeliveryRetryService {
    #[instrument(skip(self))]
    async fn retry_failed(&self, max_attempts: u32) -> NotifierResult<RetryOutcome> {
        self.options.validate()?;

        let candidates = self.scan_retry_candidates(max_attempts).await?;
        if candidates.is_empty() {
            info!("没有需要重试的订阅者");
            return Ok(RetryOutcome::NothingToRetry);
        }

        info!(
            "重试 {} 位发送失败的订阅者，重试上限 {} 次",
            candidates.len(),
            max_attempts
        );

        self.dispatcher.ensure_channels_ready(&candidates).await?;
        let report = self
            .dispatcher
            .run_batches(candidates, self.dispatcher.default_message(), &self.options)
            .await;

        Ok(RetryOutcome::Retried(report))
    }

    async fn scan_retry_candidates(&self, max_attempts: u32) -> NotifierResult<Vec<Recipient>> {
        if max_attempts == 0 {
            return Err(NotifierError::validation_error("重试上限必须大于0"));
        }
        self.recipient_repo.list_retryable(max_attempts).await
    }
}
