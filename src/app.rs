use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notifier_config::AppConfig;
use notifier_dispatcher::{
    BatchDispatcher, FailedDeliveryRetryService, RetryService, SubscriptionService,
};
use notifier_domain::{
    ChannelKind, ChannelSender, DispatchOptions, DispatchReport, Recipient, RecipientFilter,
    RecipientPage, RecipientStats, RetryOutcome, SubscriptionSource,
};
use notifier_errors::NotifierResult;
use notifier_infrastructure::{ChannelRouter, DatabaseManager};
use tracing::info;

/// 单次发送的命令行覆盖项，未指定的取配置值
#[derive(Debug, Clone, Default)]
pub struct SendOverrides {
    pub message: Option<String>,
    pub batch_size: Option<usize>,
    pub delay_ms: Option<u64>,
    pub execute: bool,
}

/// 组装存储、渠道和分发服务
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    dispatcher: Arc<BatchDispatcher>,
    retry_service: FailedDeliveryRetryService,
    subscriptions: SubscriptionService,
}

impl Application {
    /// 使用配置中的渠道端点创建应用
    pub async fn new(config: AppConfig) -> Result<Self> {
        let router = ChannelRouter::from_config(&config.channels);
        info!("已配置的通知渠道: {:?}", router.channels());
        Self::with_sender(config, Arc::new(router)).await
    }

    pub async fn with_sender(config: AppConfig, sender: Arc<dyn ChannelSender>) -> Result<Self> {
        let database = DatabaseManager::new(&config.database)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
        database.migrate().await.context("初始化数据库结构失败")?;

        let recipient_repo = database.recipient_repository();

        let dispatcher = Arc::new(
            BatchDispatcher::new(
                recipient_repo.clone(),
                sender,
                config.dispatch.default_message.clone(),
            )
            .with_send_timeout(Duration::from_millis(config.dispatch.send_timeout_ms)),
        );

        let retry_service = FailedDeliveryRetryService::new(
            recipient_repo.clone(),
            dispatcher.clone(),
            Some(Self::configured_options(&config)),
        );

        let subscriptions =
            SubscriptionService::new(recipient_repo).with_max_attempts(config.dispatch.max_attempts);

        Ok(Self {
            config,
            database,
            dispatcher,
            retry_service,
            subscriptions,
        })
    }

    fn configured_options(config: &AppConfig) -> DispatchOptions {
        DispatchOptions::default()
            .with_batch_size(config.dispatch.batch_size)
            .with_delay_ms(config.dispatch.delay_between_batches_ms)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dispatch_options(&self, overrides: &SendOverrides) -> DispatchOptions {
        let mut options = Self::configured_options(&self.config).dry_run(!overrides.execute);
        if let Some(batch_size) = overrides.batch_size {
            options = options.with_batch_size(batch_size);
        }
        if let Some(delay_ms) = overrides.delay_ms {
            options = options.with_delay_ms(delay_ms);
        }
        options
    }

    pub async fn send(&self, overrides: &SendOverrides) -> NotifierResult<DispatchReport> {
        let options = self.dispatch_options(overrides);
        self.dispatcher
            .dispatch(overrides.message.as_deref(), &options)
            .await
    }

    pub async fn retry(&self, max_attempts: Option<u32>) -> NotifierResult<RetryOutcome> {
        self.retry_service
            .retry_failed(max_attempts.unwrap_or(self.config.dispatch.max_attempts))
            .await
    }

    pub async fn stats(&self) -> NotifierResult<RecipientStats> {
        self.subscriptions.stats().await
    }

    pub async fn list(&self, filter: &RecipientFilter) -> NotifierResult<RecipientPage> {
        self.subscriptions.list(filter).await
    }

    pub async fn failed(&self) -> NotifierResult<Vec<Recipient>> {
        self.subscriptions.list_failed().await
    }

    pub async fn subscribe(
        &self,
        identity: &str,
        channel: ChannelKind,
        source: SubscriptionSource,
    ) -> NotifierResult<Recipient> {
        self.subscriptions.subscribe(identity, channel, source).await
    }

    pub async fn unsubscribe(&self, identity: &str) -> NotifierResult<()> {
        self.subscriptions.unsubscribe(identity).await
    }

    pub async fn shutdown(&self) {
        self.database.close().await;
    }
}
