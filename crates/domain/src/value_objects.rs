use regex::Regex;
use std::sync::LazyLock;

use crate::entities::ChannelKind;
use notifier_errors::{NotifierError, NotifierResult};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("合法的邮箱正则"));

// E.164: 加号开头，首位非0，共7到15位数字
static E164_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("合法的电话号码正则"));

/// 规范化并校验联系方式
///
/// - 邮箱：去除首尾空白并转为小写
/// - 电话：去除空白、短横线、点号和括号，以及 `whatsapp:` 前缀
pub fn normalize_identity(raw: &str, channel: ChannelKind) -> NotifierResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NotifierError::invalid_identity(raw, "联系方式不能为空"));
    }

    match channel {
        ChannelKind::Email => {
            let email = trimmed.to_lowercase();
            if EMAIL_PATTERN.is_match(&email) {
                Ok(email)
            } else {
                Err(NotifierError::invalid_identity(raw, "请输入有效的邮箱地址"))
            }
        }
        ChannelKind::Sms | ChannelKind::Whatsapp => {
            let without_prefix = trimmed.strip_prefix("whatsapp:").unwrap_or(trimmed);
            let phone: String = without_prefix
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
                .collect();
            if E164_PATTERN.is_match(&phone) {
                Ok(phone)
            } else {
                Err(NotifierError::invalid_identity(
                    raw,
                    "电话号码必须为国际格式，例如 +8613800138000",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_lowercased() {
        assert_eq!(
            normalize_identity("  Alice@Example.COM ", ChannelKind::Email).unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_invalid_email() {
        for raw in ["", "   ", "alice", "alice@", "alice@example", "a b@example.com"] {
            assert!(
                normalize_identity(raw, ChannelKind::Email).is_err(),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(
            normalize_identity("+1 (555) 000-1111", ChannelKind::Sms).unwrap(),
            "+15550001111"
        );
        assert_eq!(
            normalize_identity("whatsapp:+919876543210", ChannelKind::Whatsapp).unwrap(),
            "+919876543210"
        );
    }

    #[test]
    fn test_invalid_phone() {
        for raw in ["5550001111", "+0123456789", "+12345", "+1234567890123456", "+1555abc1111"] {
            let err = normalize_identity(raw, ChannelKind::Sms).unwrap_err();
            assert!(matches!(err, NotifierError::InvalidIdentity { .. }), "{raw}");
        }
    }
}
