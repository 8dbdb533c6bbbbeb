//! 领域仓储抽象
//!
//! 定义订阅者存储的抽象接口，遵循依赖倒置原则。
//! 投递结果通过单条条件更新原子地写入，不做“读取-修改-保存”。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{NewRecipient, Recipient, RecipientFilter, RecipientPage, RecipientStats};
use notifier_errors::NotifierResult;

/// 订阅者仓储抽象
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// 创建订阅者；联系方式已存在时返回 `DuplicateRecipient`
    async fn create(&self, recipient: &NewRecipient) -> NotifierResult<Recipient>;

    async fn find_by_identity(&self, identity: &str) -> NotifierResult<Option<Recipient>>;

    /// 删除订阅者，返回是否存在
    async fn delete(&self, identity: &str) -> NotifierResult<bool>;

    /// 所有待通知的订阅者，按订阅时间升序（等待最久的在前）
    async fn list_pending(&self) -> NotifierResult<Vec<Recipient>>;

    /// 待通知且 `0 < attempts < max_attempts` 的订阅者，按订阅时间升序
    async fn list_retryable(&self, max_attempts: u32) -> NotifierResult<Vec<Recipient>>;

    /// 待通知且至少失败过一次的订阅者，包括已用尽重试次数的
    async fn list_failed(&self) -> NotifierResult<Vec<Recipient>>;

    /// 分页查询，按订阅时间降序
    async fn list(&self, filter: &RecipientFilter) -> NotifierResult<RecipientPage>;

    async fn stats(&self, max_attempts: u32) -> NotifierResult<RecipientStats>;

    /// 将待通知的订阅者标记为已通知。
    ///
    /// 已通知的订阅者不做修改（`notified_at` 保持不变）并返回 `false`；
    /// 订阅者不存在时返回 `RecipientNotFound`。
    async fn mark_notified(&self, identity: &str, at: DateTime<Utc>) -> NotifierResult<bool>;

    /// 原子地递增失败次数并记录错误，返回新的失败次数。
    ///
    /// 已通知的订阅者不做修改，返回其当前失败次数。
    async fn record_failed_attempt(
        &self,
        identity: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> NotifierResult<u32>;
}
