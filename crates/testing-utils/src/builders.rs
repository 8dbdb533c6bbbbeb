//! Test data builders for creating test entities

use chrono::{DateTime, Duration, TimeZone, Utc};
use notifier_domain::entities::{ChannelKind, Recipient, SubscriptionSource};

/// Builder for creating test Recipient entities
pub struct RecipientBuilder {
    recipient: Recipient,
}

impl RecipientBuilder {
    pub fn new() -> Self {
        Self {
            recipient: Recipient {
                id: 0,
                identity: "user@example.com".to_string(),
                channel: ChannelKind::Email,
                source: SubscriptionSource::Website,
                notified: false,
                notified_at: None,
                attempts: 0,
                last_attempt_at: None,
                last_error: None,
                subscribed_at: Utc::now(),
            },
        }
    }

    /// Email recipient subscribed `minutes` after a fixed epoch, so ordering is deterministic
    pub fn email(index: usize) -> Self {
        Self::new()
            .with_identity(&format!("user{index:03}@example.com"))
            .subscribed_minutes_after_epoch(index as i64)
    }

    pub fn phone(index: usize, channel: ChannelKind) -> Self {
        Self::new()
            .with_identity(&format!("+1555{index:07}"))
            .with_channel(channel)
            .subscribed_minutes_after_epoch(index as i64)
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.recipient.id = id;
        self
    }

    pub fn with_identity(mut self, identity: &str) -> Self {
        self.recipient.identity = identity.to_string();
        self
    }

    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.recipient.channel = channel;
        self
    }

    pub fn with_source(mut self, source: SubscriptionSource) -> Self {
        self.recipient.source = source;
        self
    }

    pub fn subscribed_at(mut self, at: DateTime<Utc>) -> Self {
        self.recipient.subscribed_at = at;
        self
    }

    pub fn subscribed_minutes_after_epoch(self, minutes: i64) -> Self {
        self.subscribed_at(fixed_epoch() + Duration::minutes(minutes))
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.recipient.attempts = attempts;
        if attempts > 0 {
            self.recipient.last_attempt_at = Some(Utc::now());
            self.recipient.last_error = Some("previous failure".to_string());
        }
        self
    }

    pub fn with_last_error(mut self, error: &str) -> Self {
        self.recipient.last_error = Some(error.to_string());
        self
    }

    pub fn notified(mut self) -> Self {
        let at = Utc::now();
        self.recipient.notified = true;
        self.recipient.notified_at = Some(at);
        self.recipient.last_attempt_at = Some(at);
        self
    }

    pub fn build(self) -> Recipient {
        self.recipient
    }
}

impl Default for RecipientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 2026-01-01T00:00:00Z
pub fn fixed_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// `count` pending email recipients subscribed one minute apart
pub fn pending_email_recipients(count: usize) -> Vec<Recipient> {
    (0..count)
        .map(|i| RecipientBuilder::email(i).build())
        .collect()
}
