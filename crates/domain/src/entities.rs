use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use notifier_errors::NotifierError;

/// 通知渠道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Whatsapp,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Whatsapp => "whatsapp",
        }
    }

    /// 是否以电话号码作为联系方式
    pub fn is_phone(&self) -> bool {
        matches!(self, ChannelKind::Sms | ChannelKind::Whatsapp)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelKind::Email),
            "sms" => Ok(ChannelKind::Sms),
            "whatsapp" => Ok(ChannelKind::Whatsapp),
            other => Err(NotifierError::validation_error(format!(
                "不支持的通知渠道: {other}"
            ))),
        }
    }
}

/// 订阅来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionSource {
    #[default]
    Website,
    Api,
    Manual,
}

impl SubscriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionSource::Website => "website",
            SubscriptionSource::Api => "api",
            SubscriptionSource::Manual => "manual",
        }
    }
}

impl fmt::Display for SubscriptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionSource {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "website" => Ok(SubscriptionSource::Website),
            "api" => Ok(SubscriptionSource::Api),
            "manual" => Ok(SubscriptionSource::Manual),
            other => Err(NotifierError::validation_error(format!(
                "不支持的订阅来源: {other}"
            ))),
        }
    }
}

/// 等待一次性广播通知的订阅者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipient {
    pub id: i64,
    /// 邮箱地址或 E.164 格式的电话号码，同一列表内唯一
    pub identity: String,
    pub channel: ChannelKind,
    pub source: SubscriptionSource,
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
    /// 失败的发送次数，只在失败时递增
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

impl Recipient {
    pub fn new(identity: String, channel: ChannelKind) -> Self {
        Self {
            id: 0, // 将由存储层生成
            identity,
            channel,
            source: SubscriptionSource::default(),
            notified: false,
            notified_at: None,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
            subscribed_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.notified
    }

    /// 待通知、已有失败记录且未达到重试上限
    pub fn is_retryable(&self, max_attempts: u32) -> bool {
        !self.notified && self.attempts > 0 && self.attempts < max_attempts
    }

    /// 已用尽自动重试次数，需要人工介入
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        !self.notified && self.attempts >= max_attempts
    }

    /// 标记为已通知。已通知的订阅者保持原样并返回 `false`。
    pub fn mark_notified(&mut self, at: DateTime<Utc>) -> bool {
        if self.notified {
            return false;
        }
        self.notified = true;
        self.notified_at = Some(at);
        self.last_attempt_at = Some(at);
        self.last_error = None;
        true
    }

    /// 记录一次失败的发送，返回累计失败次数。已通知的订阅者不受影响。
    pub fn record_failed_attempt(&mut self, error: &str, at: DateTime<Utc>) -> u32 {
        if self.notified {
            return self.attempts;
        }
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt_at = Some(at);
        self.last_error = Some(error.to_string());
        self.attempts
    }

    pub fn entity_description(&self) -> String {
        format!("订阅者 '{}' (渠道: {})", self.identity, self.channel)
    }
}

/// 新订阅请求，`identity` 需已规范化
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRecipient {
    pub identity: String,
    pub channel: ChannelKind,
    pub source: SubscriptionSource,
    pub subscribed_at: DateTime<Utc>,
}

impl NewRecipient {
    pub fn new(identity: String, channel: ChannelKind, source: SubscriptionSource) -> Self {
        Self {
            identity,
            channel,
            source,
            subscribed_at: Utc::now(),
        }
    }

    pub fn into_recipient(self, id: i64) -> Recipient {
        Recipient {
            id,
            identity: self.identity,
            channel: self.channel,
            source: self.source,
            notified: false,
            notified_at: None,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
            subscribed_at: self.subscribed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientFilter {
    pub notified: Option<bool>,
    pub channel: Option<ChannelKind>,
    /// 从1开始
    pub page: u32,
    pub limit: u32,
}

impl Default for RecipientFilter {
    fn default() -> Self {
        Self {
            notified: None,
            channel: None,
            page: 1,
            limit: 50,
        }
    }
}

impl RecipientFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientPage {
    pub recipients: Vec<Recipient>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl RecipientPage {
    pub fn new(recipients: Vec<Recipient>, filter: &RecipientFilter, total: u64) -> Self {
        let pages = if filter.limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(filter.limit))
        };
        Self {
            recipients,
            page: filter.page.max(1),
            limit: filter.limit,
            total,
            pages,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCounts {
    pub email: u64,
    pub sms: u64,
    pub whatsapp: u64,
}

impl ChannelCounts {
    pub fn add(&mut self, channel: ChannelKind, count: u64) {
        match channel {
            ChannelKind::Email => self.email += count,
            ChannelKind::Sms => self.sms += count,
            ChannelKind::Whatsapp => self.whatsapp += count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientStats {
    pub total: u64,
    pub notified: u64,
    pub pending: u64,
    /// 待通知且至少失败过一次
    pub failed: u64,
    /// 失败次数已达到重试上限
    pub exhausted: u64,
    pub by_channel: ChannelCounts,
}

impl RecipientStats {
    /// 在内存中汇总统计，供内存实现与测试使用
    pub fn from_recipients<'a, I>(recipients: I, max_attempts: u32) -> Self
    where
        I: IntoIterator<Item = &'a Recipient>,
    {
        let mut stats = Self::default();
        for recipient in recipients {
            stats.total += 1;
            if recipient.notified {
                stats.notified += 1;
            } else {
                stats.pending += 1;
                if recipient.attempts > 0 {
                    stats.failed += 1;
                }
                if recipient.is_exhausted(max_attempts) {
                    stats.exhausted += 1;
                }
            }
            stats.by_channel.add(recipient.channel, 1);
        }
        stats
    }
}
