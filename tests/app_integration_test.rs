use std::sync::Arc;

use anyhow::Result;
use notifier::app::{Application, SendOverrides};
use notifier::cli::{self, Commands};
use notifier_config::AppConfig;
use notifier_domain::{ChannelKind, RetryOutcome, SubscriptionSource};
use notifier_errors::NotifierError;
use notifier_testing_utils::MockChannelSender;
use tempfile::TempDir;

async fn create_app(sender: &MockChannelSender) -> Result<(TempDir, Application)> {
    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());
    config.dispatch.batch_size = 2;
    config.dispatch.delay_between_batches_ms = 0;
    config.dispatch.default_message = "We are live!".to_string();

    let app = Application::with_sender(config, Arc::new(sender.clone())).await?;
    Ok((dir, app))
}

fn execute() -> SendOverrides {
    SendOverrides {
        execute: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subscribe_send_and_retry_flow() -> Result<()> {
    let sender = MockChannelSender::new();
    let (_dir, app) = create_app(&sender).await?;

    app.subscribe("ada@example.com", ChannelKind::Email, SubscriptionSource::Website)
        .await?;
    app.subscribe("+1 555 000 1111", ChannelKind::Sms, SubscriptionSource::Api)
        .await?;
    app.subscribe("grace@example.com", ChannelKind::Email, SubscriptionSource::Manual)
        .await?;
    sender.fail_times("+15550001111", 1, "carrier unavailable");

    let report = app.send(&execute()).await?;
    assert_eq!(report.total_considered, 3);
    assert_eq!(report.sent_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.batch_count(), 2);
    assert_eq!(report.failed[0].error, "carrier unavailable");

    let stats = app.stats().await?;
    assert_eq!(stats.notified, 2);
    assert_eq!(stats.failed, 1);

    let outcome = app.retry(None).await?;
    assert_eq!(outcome.retried(), 1);
    assert_eq!(outcome.report().map(|r| r.sent_count), Some(1));

    assert_eq!(app.retry(None).await?, RetryOutcome::NothingToRetry);
    assert_eq!(app.stats().await?.pending, 0);
    assert_eq!(sender.call_count(), 4);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_send_without_execute_is_preview() -> Result<()> {
    let sender = MockChannelSender::new();
    let (_dir, app) = create_app(&sender).await?;
    app.subscribe("ada@example.com", ChannelKind::Email, SubscriptionSource::Website)
        .await?;

    let report = app.send(&SendOverrides::default()).await?;

    assert!(report.dry_run);
    assert_eq!(report.preview.len(), 1);
    assert_eq!(sender.call_count(), 0);
    assert_eq!(app.stats().await?.pending, 1);
    Ok(())
}

#[tokio::test]
async fn test_overrides_take_precedence_over_config() -> Result<()> {
    let sender = MockChannelSender::new();
    let (_dir, app) = create_app(&sender).await?;

    let options = app.dispatch_options(&SendOverrides {
        batch_size: Some(25),
        delay_ms: Some(2000),
        execute: true,
        ..Default::default()
    });
    assert_eq!(options.batch_size, 25);
    assert_eq!(options.delay_between_batches_ms, 2000);
    assert!(!options.dry_run);

    let defaults = app.dispatch_options(&SendOverrides::default());
    assert_eq!(defaults.batch_size, 2);
    assert!(defaults.dry_run);
    Ok(())
}

#[tokio::test]
async fn test_unconfigured_channel_aborts_send() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());

    // 没有配置任何渠道端点
    let app = Application::new(config).await?;
    app.subscribe("ada@example.com", ChannelKind::Email, SubscriptionSource::Website)
        .await?;

    let err = app.send(&execute()).await.unwrap_err();
    assert!(matches!(err, NotifierError::Configuration(_)));
    assert_eq!(app.stats().await?.pending, 1);
    assert_eq!(app.failed().await?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cli_commands_produce_json() -> Result<()> {
    let sender = MockChannelSender::new();
    let (_dir, app) = create_app(&sender).await?;

    let created = cli::execute(
        &app,
        Commands::Subscribe {
            identity: "Ada@Example.com".to_string(),
            channel: ChannelKind::Email,
            source: SubscriptionSource::Manual,
        },
    )
    .await?;
    assert_eq!(created["identity"], "ada@example.com");
    assert_eq!(created["source"], "manual");

    let duplicate = cli::execute(
        &app,
        Commands::Subscribe {
            identity: "ada@example.com".to_string(),
            channel: ChannelKind::Email,
            source: SubscriptionSource::Website,
        },
    )
    .await;
    assert!(duplicate.is_err());

    let listed = cli::execute(
        &app,
        Commands::List {
            notified: Some(false),
            channel: None,
            page: 1,
            limit: 10,
        },
    )
    .await?;
    assert_eq!(listed["total"], 1);

    let failed = cli::execute(&app, Commands::Failed).await?;
    assert_eq!(failed["count"], 0);

    let retry = cli::execute(&app, Commands::Retry { max_attempts: None }).await?;
    assert_eq!(retry["status"], "nothing_to_retry");

    let removed = cli::execute(
        &app,
        Commands::Unsubscribe {
            identity: "ada@example.com".to_string(),
        },
    )
    .await?;
    assert_eq!(removed["unsubscribed"], "ada@example.com");

    let stats = cli::execute(&app, Commands::Stats).await?;
    assert_eq!(stats["total"], 0);
    Ok(())
}
