//! Mock implementations for the repository and channel traits
//!
//! In-memory doubles used by unit and integration tests without a database
//! or a real delivery channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_domain::entities::{
    ChannelKind, NewRecipient, Recipient, RecipientFilter, RecipientPage, RecipientStats,
};
use notifier_domain::ports::ChannelSender;
use notifier_domain::reports::SendReceipt;
use notifier_domain::repositories::RecipientRepository;
use notifier_errors::{NotifierError, NotifierResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock implementation of RecipientRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockRecipientRepository {
    recipients: Arc<Mutex<Vec<Recipient>>>,
    next_id: Arc<Mutex<i64>>,
    failing_writes: Arc<Mutex<HashSet<String>>>,
    fail_queries: Arc<AtomicBool>,
    mark_notified_calls: Arc<AtomicUsize>,
    record_failure_calls: Arc<AtomicUsize>,
}

impl MockRecipientRepository {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(Mutex::new(1)),
            ..Default::default()
        }
    }

    pub fn with_recipients(recipients: Vec<Recipient>) -> Self {
        let repo = Self::new();
        {
            let mut stored = repo.recipients.lock().unwrap();
            let mut next_id = repo.next_id.lock().unwrap();
            for mut recipient in recipients {
                if recipient.id == 0 {
                    recipient.id = *next_id;
                }
                *next_id = (*next_id).max(recipient.id) + 1;
                stored.push(recipient);
            }
        }
        repo
    }

    /// Outcome writes for this identity fail with a database error
    pub fn fail_writes_for(&self, identity: &str) {
        self.failing_writes
            .lock()
            .unwrap()
            .insert(identity.to_string());
    }

    /// Every list query fails with a database error
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, identity: &str) -> Option<Recipient> {
        self.recipients
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.identity == identity)
            .cloned()
    }

    pub fn all(&self) -> Vec<Recipient> {
        self.recipients.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.recipients.lock().unwrap().len()
    }

    pub fn mark_notified_calls(&self) -> usize {
        self.mark_notified_calls.load(Ordering::SeqCst)
    }

    pub fn record_failure_calls(&self) -> usize {
        self.record_failure_calls.load(Ordering::SeqCst)
    }

    fn check_query(&self) -> NotifierResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(NotifierError::database_error("mock query failure"));
        }
        Ok(())
    }

    fn check_write(&self, identity: &str) -> NotifierResult<()> {
        if self.failing_writes.lock().unwrap().contains(identity) {
            return Err(NotifierError::database_error(format!(
                "mock write failure for {identity}"
            )));
        }
        Ok(())
    }

    fn sorted_by_subscription<F>(&self, predicate: F) -> Vec<Recipient>
    where
        F: Fn(&Recipient) -> bool,
    {
        let mut matching: Vec<Recipient> = self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.subscribed_at, r.id));
        matching
    }
}

#[async_trait]
impl RecipientRepository for MockRecipientRepository {
    async fn create(&self, recipient: &NewRecipient) -> NotifierResult<Recipient> {
        let mut recipients = self.recipients.lock().unwrap();
        if recipients.iter().any(|r| r.identity == recipient.identity) {
            return Err(NotifierError::duplicate_recipient(&recipient.identity));
        }

        let mut next_id = self.next_id.lock().unwrap();
        let created = recipient.clone().into_recipient(*next_id);
        *next_id += 1;

        recipients.push(created.clone());
        Ok(created)
    }

    async fn find_by_identity(&self, identity: &str) -> NotifierResult<Option<Recipient>> {
        self.check_query()?;
        Ok(self.get(identity))
    }

    async fn delete(&self, identity: &str) -> NotifierResult<bool> {
        let mut recipients = self.recipients.lock().unwrap();
        let before = recipients.len();
        recipients.retain(|r| r.identity != identity);
        Ok(recipients.len() != before)
    }

    async fn list_pending(&self) -> NotifierResult<Vec<Recipient>> {
        self.check_query()?;
        Ok(self.sorted_by_subscription(|r| r.is_pending()))
    }

    async fn list_retryable(&self, max_attempts: u32) -> NotifierResult<Vec<Recipient>> {
        self.check_query()?;
        Ok(self.sorted_by_subscription(|r| r.is_retryable(max_attempts)))
    }

    async fn list_failed(&self) -> NotifierResult<Vec<Recipient>> {
        self.check_query()?;
        Ok(self.sorted_by_subscription(|r| !r.notified && r.attempts > 0))
    }

    async fn list(&self, filter: &RecipientFilter) -> NotifierResult<RecipientPage> {
        self.check_query()?;
        let mut matching: Vec<Recipient> = self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.notified.map_or(true, |n| r.notified == n))
            .filter(|r| filter.channel.map_or(true, |c| r.channel == c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));

        let total = matching.len() as u64;
        let page: Vec<Recipient> = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(RecipientPage::new(page, filter, total))
    }

    async fn stats(&self, max_attempts: u32) -> NotifierResult<RecipientStats> {
        self.check_query()?;
        let recipients = self.recipients.lock().unwrap();
        Ok(RecipientStats::from_recipients(
            recipients.iter(),
            max_attempts,
        ))
    }

    async fn mark_notified(&self, identity: &str, at: DateTime<Utc>) -> NotifierResult<bool> {
        self.mark_notified_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write(identity)?;
        let mut recipients = self.recipients.lock().unwrap();
        let recipient = recipients
            .iter_mut()
            .find(|r| r.identity == identity)
            .ok_or_else(|| NotifierError::recipient_not_found(identity))?;
        Ok(recipient.mark_notified(at))
    }

    async fn record_failed_attempt(
        &self,
        identity: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> NotifierResult<u32> {
        self.record_failure_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write(identity)?;
        let mut recipients = self.recipients.lock().unwrap();
        let recipient = recipients
            .iter_mut()
            .find(|r| r.identity == identity)
            .ok_or_else(|| NotifierError::recipient_not_found(identity))?;
        Ok(recipient.record_failed_attempt(error, at))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCall {
    pub identity: String,
    pub channel: ChannelKind,
    pub message: String,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    error: String,
    /// None: fail every time
    remaining: Option<usize>,
}

/// Mock implementation of ChannelSender for testing
#[derive(Debug, Clone, Default)]
pub struct MockChannelSender {
    failures: Arc<Mutex<HashMap<String, ScriptedFailure>>>,
    unready: Arc<Mutex<HashMap<ChannelKind, String>>>,
    send_delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<SentCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    ready_checks: Arc<AtomicUsize>,
}

impl MockChannelSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `identity` fails with `error`
    pub fn fail_for(&self, identity: &str, error: &str) {
        self.failures.lock().unwrap().insert(
            identity.to_string(),
            ScriptedFailure {
                error: error.to_string(),
                remaining: None,
            },
        );
    }

    /// The next `times` sends to `identity` fail, later ones succeed
    pub fn fail_times(&self, identity: &str, times: usize, error: &str) {
        self.failures.lock().unwrap().insert(
            identity.to_string(),
            ScriptedFailure {
                error: error.to_string(),
                remaining: Some(times),
            },
        );
    }

    /// `ensure_ready` fails for this channel
    pub fn not_ready(&self, channel: ChannelKind, error: &str) {
        self.unready
            .lock()
            .unwrap()
            .insert(channel, error.to_string());
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.send_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, identity: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.identity == identity)
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn ready_checks(&self) -> usize {
        self.ready_checks.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self, identity: &str) -> Option<String> {
        let mut failures = self.failures.lock().unwrap();
        let failure = failures.get_mut(identity)?;
        match failure.remaining.as_mut() {
            None => Some(failure.error.clone()),
            Some(0) => None,
            Some(remaining) => {
                *remaining -= 1;
                Some(failure.error.clone())
            }
        }
    }
}

#[async_trait]
impl ChannelSender for MockChannelSender {
    async fn send(
        &self,
        identity: &str,
        channel: ChannelKind,
        message: &str,
    ) -> NotifierResult<SendReceipt> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(SentCall {
                identity: identity.to_string(),
                channel,
                message: message.to_string(),
            });
            calls.len()
        };

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.scripted_failure(identity) {
            Some(error) => Err(NotifierError::delivery(error)),
            None => Ok(SendReceipt::with_id(format!("mock-{call_number}"))),
        }
    }

    async fn ensure_ready(&self, channel: ChannelKind) -> NotifierResult<()> {
        self.ready_checks.fetch_add(1, Ordering::SeqCst);
        match self.unready.lock().unwrap().get(&channel) {
            Some(error) => Err(NotifierError::config_error(error.clone())),
            None => Ok(()),
        }
    }
}
