use std::sync::Arc;

use notifier_domain::{ChannelKind, RecipientFilter, SubscriptionSource};
use notifier_errors::NotifierError;
use notifier_testing_utils::{MockRecipientRepository, RecipientBuilder};

use notifier_dispatcher::subscription_service::SubscriptionService;

fn create_service(repo: &MockRecipientRepository) -> SubscriptionService {
    SubscriptionService::new(Arc::new(repo.clone()))
}

#[tokio::test]
async fn test_subscribe_normalizes_identity() {
    let repo = MockRecipientRepository::new();
    let service = create_service(&repo);

    let recipient = service
        .subscribe(" Ada@Example.com ", ChannelKind::Email, SubscriptionSource::Website)
        .await
        .unwrap();

    assert_eq!(recipient.identity, "ada@example.com");
    assert!(recipient.id > 0);
    assert!(!recipient.notified);
    assert_eq!(recipient.attempts, 0);

    let phone = service
        .subscribe("+44 20 7946-0958", ChannelKind::Sms, SubscriptionSource::Api)
        .await
        .unwrap();
    assert_eq!(phone.identity, "+442079460958");
    assert_eq!(phone.source, SubscriptionSource::Api);
}

#[tokio::test]
async fn test_duplicate_subscription_is_rejected() {
    let repo = MockRecipientRepository::new();
    let service = create_service(&repo);

    service
        .subscribe("ada@example.com", ChannelKind::Email, SubscriptionSource::Website)
        .await
        .unwrap();
    let err = service
        .subscribe("ADA@example.com", ChannelKind::Email, SubscriptionSource::Manual)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifierError::DuplicateRecipient { .. }));
    assert_eq!(repo.count(), 1);
}

#[tokio::test]
async fn test_resubscribe_keeps_existing_delivery_state() {
    let repo = MockRecipientRepository::with_recipients(vec![
        RecipientBuilder::email(1).notified().build(),
        RecipientBuilder::email(2).with_attempts(2).build(),
    ]);
    let before = repo.all();
    let service = create_service(&repo);

    for identity in ["user001@example.com", "USER002@example.com"] {
        let err = service
            .subscribe(identity, ChannelKind::Email, SubscriptionSource::Website)
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::DuplicateRecipient { .. }));
    }

    assert_eq!(repo.count(), 2);
    for original in &before {
        let stored = repo.get(&original.identity).unwrap();
        assert_eq!(stored.notified, original.notified);
        assert_eq!(stored.notified_at, original.notified_at);
        assert_eq!(stored.attempts, original.attempts);
        assert_eq!(stored.last_error, original.last_error);
    }

    let notified = repo.get("user001@example.com").unwrap();
    assert!(notified.notified);
    assert!(notified.notified_at.is_some());
    assert_eq!(repo.get("user002@example.com").unwrap().attempts, 2);
}

#[tokio::test]
async fn test_same_number_on_another_channel_is_duplicate() {
    let repo = MockRecipientRepository::new();
    let service = create_service(&repo);

    service
        .subscribe("+15550001111", ChannelKind::Sms, SubscriptionSource::Website)
        .await
        .unwrap();
    let err = service
        .subscribe(
            "whatsapp:+15550001111",
            ChannelKind::Whatsapp,
            SubscriptionSource::Website,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, NotifierError::DuplicateRecipient { .. }));
    assert_eq!(repo.count(), 1);
}

#[tokio::test]
async fn test_invalid_identity_is_rejected() {
    let repo = MockRecipientRepository::new();
    let service = create_service(&repo);

    let err = service
        .subscribe("not-an-email", ChannelKind::Email, SubscriptionSource::Website)
        .await
        .unwrap_err();
    assert!(matches!(err, NotifierError::InvalidIdentity { .. }));

    let err = service
        .subscribe("5550001111", ChannelKind::Sms, SubscriptionSource::Website)
        .await
        .unwrap_err();
    assert!(matches!(err, NotifierError::InvalidIdentity { .. }));
    assert_eq!(repo.count(), 0);
}

#[tokio::test]
async fn test_unsubscribe() {
    let repo = MockRecipientRepository::with_recipients(vec![
        RecipientBuilder::email(1).build(),
        RecipientBuilder::phone(2, ChannelKind::Sms).build(),
    ]);
    let service = create_service(&repo);

    service.unsubscribe("USER001@example.com").await.unwrap();
    service.unsubscribe("+1 555 000 0002").await.unwrap();
    assert_eq!(repo.count(), 0);

    let err = service.unsubscribe("user001@example.com").await.unwrap_err();
    assert!(matches!(err, NotifierError::RecipientNotFound { .. }));
}

#[tokio::test]
async fn test_stats_and_failed_listing() {
    let repo = MockRecipientRepository::with_recipients(vec![
        RecipientBuilder::email(1).notified().build(),
        RecipientBuilder::email(2).with_attempts(1).build(),
        RecipientBuilder::email(3).with_attempts(3).build(),
        RecipientBuilder::phone(4, ChannelKind::Whatsapp).build(),
    ]);
    let service = create_service(&repo).with_max_attempts(3);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.notified, 1);
    assert_eq!(stats.pending, 3);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.exhausted, 1);
    assert_eq!(stats.by_channel.email, 3);
    assert_eq!(stats.by_channel.whatsapp, 1);

    let failed = service.list_failed().await.unwrap();
    let identities: Vec<&str> = failed.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(identities, vec!["user002@example.com", "user003@example.com"]);
}

#[tokio::test]
async fn test_list_pages_newest_first() {
    let repo = MockRecipientRepository::with_recipients(
        (0..7).map(|i| RecipientBuilder::email(i).build()).collect(),
    );
    let service = create_service(&repo);

    let page = service
        .list(&RecipientFilter {
            page: 2,
            limit: 3,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 7);
    assert_eq!(page.pages, 3);
    assert_eq!(page.recipients.len(), 3);
    assert_eq!(page.recipients[0].identity, "user003@example.com");

    let clamped = service
        .list(&RecipientFilter {
            page: 0,
            limit: 0,
            notified: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.limit, 1);
    assert_eq!(clamped.recipients.len(), 1);
}
