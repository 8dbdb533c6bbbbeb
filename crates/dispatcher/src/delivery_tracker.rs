use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use notifier_domain::entities::Recipient;
use notifier_domain::repositories::RecipientRepository;
use notifier_errors::NotifierResult;

/// 同一订阅者的结果写入串行化，不同订阅者之间互不阻塞
#[derive(Debug, Default)]
struct RecipientLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecipientLocks {
    fn acquire(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release(&self, identity: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // 映射表与当前调用各持有一份引用时，说明没有其他等待者
        let idle = locks
            .get(identity)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) <= 2);
        if idle {
            locks.remove(identity);
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// 把单次发送的结果写回订阅者记录
///
/// 写入由存储层的条件更新完成，不会覆盖并发调用已经写入的结果：
/// 已通知的订阅者不会再次被标记，失败次数只会在未通知时递增。
pub struct DeliveryTracker {
    recipient_repo: Arc<dyn RecipientRepository>,
    locks: RecipientLocks,
}

impl DeliveryTracker {
    pub fn new(recipient_repo: Arc<dyn RecipientRepository>) -> Self {
        Self {
            recipient_repo,
            locks: RecipientLocks::default(),
        }
    }

    /// 标记订阅者已通知，返回本次调用是否实际改变了状态
    pub async fn mark_notified(&self, recipient: &Recipient) -> NotifierResult<bool> {
        let lock = self.locks.acquire(&recipient.identity);
        let result = {
            let _guard = lock.lock().await;
            self.recipient_repo
                .mark_notified(&recipient.identity, Utc::now())
                .await
        };
        self.locks.release(&recipient.identity, lock);

        match &result {
            Ok(true) => debug!("{} 已标记为已通知", recipient.entity_description()),
            Ok(false) => warn!(
                "{} 已被其他调用标记为已通知，保留原通知时间",
                recipient.entity_description()
            ),
            Err(_) => {}
        }
        result
    }

    /// 记录一次失败的发送，返回累计失败次数
    pub async fn record_failed_attempt(
        &self,
        recipient: &Recipient,
        error: &str,
    ) -> NotifierResult<u32> {
        let lock = self.locks.acquire(&recipient.identity);
        let result = {
            let _guard = lock.lock().await;
            self.recipient_repo
                .record_failed_attempt(&recipient.identity, error, Utc::now())
                .await
        };
        self.locks.release(&recipient.identity, lock);

        if let Ok(attempts) = &result {
            debug!(
                "{} 第 {} 次发送失败: {}",
                recipient.entity_description(),
                attempts,
                error
            );
        }
        result
    }

    /// 当前仍持有写入锁的订阅者数量
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}
