use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("订阅者未找到: {identity}")]
    RecipientNotFound { identity: String },
    #[error("订阅者已存在: {identity}")]
    DuplicateRecipient { identity: String },
    #[error("无效的联系方式: {identity} - {reason}")]
    InvalidIdentity { identity: String, reason: String },
    #[error("投递失败: {0}")]
    Delivery(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("网络错误: {0}")]
    Network(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type NotifierResult<T> = Result<T, NotifierError>;

impl NotifierError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn recipient_not_found<S: Into<String>>(identity: S) -> Self {
        Self::RecipientNotFound {
            identity: identity.into(),
        }
    }
    pub fn duplicate_recipient<S: Into<String>>(identity: S) -> Self {
        Self::DuplicateRecipient {
            identity: identity.into(),
        }
    }
    pub fn invalid_identity<S: Into<String>, R: Into<String>>(identity: S, reason: R) -> Self {
        Self::InvalidIdentity {
            identity: identity.into(),
            reason: reason.into(),
        }
    }
    pub fn delivery<S: Into<String>>(msg: S) -> Self {
        Self::Delivery(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    /// 系统性错误：整个分发调用必须中止，不能按单个订阅者的失败处理
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NotifierError::Internal(_)
                | NotifierError::Configuration(_)
                | NotifierError::ValidationError(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifierError::DatabaseOperation(_)
                | NotifierError::Delivery(_)
                | NotifierError::Network(_)
                | NotifierError::Timeout(_)
        )
    }

    /// 写入订阅者 `last_error` 的失败描述。
    ///
    /// 渠道返回的错误保留原始文本（例如 `rate limited`），其他错误使用完整的显示信息。
    pub fn failure_reason(&self) -> String {
        match self {
            NotifierError::Delivery(msg) | NotifierError::Network(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            NotifierError::RecipientNotFound { .. } => "该联系方式未订阅通知",
            NotifierError::DuplicateRecipient { .. } => "该联系方式已订阅通知",
            NotifierError::InvalidIdentity { .. } => "联系方式格式有误",
            NotifierError::ValidationError(_) => "输入数据验证失败",
            NotifierError::Timeout(_) => "操作超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for NotifierError {
    fn from(err: serde_json::Error) -> Self {
        NotifierError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for NotifierError {
    fn from(err: anyhow::Error) -> Self {
        NotifierError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for NotifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifierError::Timeout(err.to_string())
        } else {
            NotifierError::Network(err.to_string())
        }
    }
}
