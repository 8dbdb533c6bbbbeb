use std::sync::Arc;

use tracing::{info, instrument, warn};

use notifier_domain::entities::{
    ChannelKind, NewRecipient, Recipient, RecipientFilter, RecipientPage, RecipientStats,
    SubscriptionSource,
};
use notifier_domain::repositories::RecipientRepository;
use notifier_domain::value_objects::normalize_identity;
use notifier_errors::{NotifierError, NotifierResult};

use crate::retry_service::DEFAULT_MAX_ATTEMPTS;

const MAX_PAGE_LIMIT: u32 = 100;

/// 订阅列表管理
///
/// 联系方式在写入前规范化，同一联系方式在列表中只能出现一次，
/// 与使用的渠道无关。
pub struct SubscriptionService {
    recipient_repo: Arc<dyn RecipientRepository>,
    max_attempts: u32,
}

impl SubscriptionService {
    pub fn new(recipient_repo: Arc<dyn RecipientRepository>) -> Self {
        Self {
            recipient_repo,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[instrument(skip(self))]
    pub async fn subscribe(
        &self,
        identity: &str,
        channel: ChannelKind,
        source: SubscriptionSource,
    ) -> NotifierResult<Recipient> {
        let identity = normalize_identity(identity, channel)?;

        if self
            .recipient_repo
            .find_by_identity(&identity)
            .await?
            .is_some()
        {
            warn!("重复订阅被拒绝: {}", identity);
            return Err(NotifierError::duplicate_recipient(&identity));
        }

        // 并发订阅时由存储层的唯一约束兜底
        let recipient = self
            .recipient_repo
            .create(&NewRecipient::new(identity, channel, source))
            .await?;

        info!("新订阅者: {} (来源: {})", recipient.entity_description(), source);
        Ok(recipient)
    }

    /// 按联系方式取消订阅，含 `@` 的按邮箱规范化，否则按电话号码
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, identity: &str) -> NotifierResult<()> {
        let channel = if identity.contains('@') {
            ChannelKind::Email
        } else {
            ChannelKind::Sms
        };
        let identity = normalize_identity(identity, channel)?;

        if !self.recipient_repo.delete(&identity).await? {
            return Err(NotifierError::recipient_not_found(&identity));
        }
        info!("已取消订阅: {}", identity);
        Ok(())
    }

    pub async fn stats(&self) -> NotifierResult<RecipientStats> {
        self.recipient_repo.stats(self.max_attempts).await
    }

    pub async fn list(&self, filter: &RecipientFilter) -> NotifierResult<RecipientPage> {
        let filter = RecipientFilter {
            page: filter.page.max(1),
            limit: filter.limit.clamp(1, MAX_PAGE_LIMIT),
            ..filter.clone()
        };
        self.recipient_repo.list(&filter).await
    }

    /// 至少失败过一次且仍未通知的订阅者，包括已达到重试上限的
    pub async fn list_failed(&self) -> NotifierResult<Vec<Recipient>> {
        self.recipient_repo.list_failed().await
    }
}
