//! Error handling for repository operations with operation context
//!
//! Maps sqlx errors to `NotifierError` and logs each failure together with
//! the operation and the recipient it concerned.

use chrono::{DateTime, Utc};
use notifier_errors::NotifierError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{debug, error, instrument};

/// Operation context for repository operations
#[derive(Debug, Clone)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Migrate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::Migrate => write!(f, "迁移"),
        }
    }
}

/// Context information for recipient repository operations
#[derive(Debug, Clone)]
pub struct RecipientOperationContext {
    pub operation: RepositoryOperation,
    pub identity: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl RecipientOperationContext {
    pub fn new(operation: RepositoryOperation) -> Self {
        Self {
            operation,
            identity: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_identity(mut self, identity: String) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match &self.identity {
            Some(identity) => format!("订阅者 '{identity}'"),
            None => "订阅者".to_string(),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Create a database error with recipient context
    #[instrument(skip_all, fields(
        operation = %context.operation,
        identity = ?context.identity,
        timestamp = %context.timestamp,
    ))]
    pub fn recipient_database_error(
        context: RecipientOperationContext,
        error: SqlxError,
    ) -> NotifierError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(db_error) if db_error.is_unique_violation() => {
                let identity = context.identity.unwrap_or_default();
                error!(error = %error, "{}{}时发生唯一约束冲突", operation_desc, entity_desc);
                return NotifierError::duplicate_recipient(identity);
            }
            SqlxError::Database(db_error) => {
                format!("{operation_desc}{entity_desc}时发生数据库错误: {db_error}")
            }
            SqlxError::PoolClosed => {
                format!("{operation_desc}{entity_desc}时数据库连接池已关闭")
            }
            SqlxError::PoolTimedOut => {
                format!("{operation_desc}{entity_desc}时数据库连接池超时")
            }
            SqlxError::Io(io_error) => {
                format!("{operation_desc}{entity_desc}时发生I/O错误: {io_error}")
            }
            _ => format!("{operation_desc}{entity_desc}时发生未知数据库错误: {error}"),
        };

        error!(error = %error, "{}", error_msg);
        NotifierError::database_error(error_msg)
    }

    /// Stored value that cannot be mapped back to the domain
    pub fn mapping_error(context: &RecipientOperationContext, detail: impl fmt::Display) -> NotifierError {
        let error_msg = format!(
            "{}{}时数据格式错误: {}",
            context.operation,
            context.entity_description(),
            detail
        );
        error!("{}", error_msg);
        NotifierError::database_error(error_msg)
    }

    pub fn recipient_not_found(context: RecipientOperationContext) -> NotifierError {
        let identity = context.identity.clone().unwrap_or_default();
        debug!(
            "{}{}时未找到: 记录不存在",
            context.operation,
            context.entity_description()
        );
        NotifierError::recipient_not_found(identity)
    }

    pub fn log_operation_success(
        context: RecipientOperationContext,
        entity_desc: &str,
        additional_info: Option<&str>,
    ) {
        let base_msg = format!("{}{}成功", context.operation, entity_desc);

        if let Some(info) = additional_info {
            debug!("{}: {}", base_msg, info);
        } else {
            debug!("{}", base_msg);
        }
    }
}

/// Macro for creating recipient operation context easily
#[macro_export]
macro_rules! recipient_context {
    ($operation:expr) => {
        $crate::error_handling::RecipientOperationContext::new($operation)
    };
    ($operation:expr, identity = $identity:expr) => {
        $crate::error_handling::RecipientOperationContext::new($operation)
            .with_identity($identity.to_string())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_description() {
        let context = recipient_context!(RepositoryOperation::Update, identity = "a@example.com");
        assert_eq!(context.entity_description(), "订阅者 'a@example.com'");
        assert_eq!(
            recipient_context!(RepositoryOperation::Query).entity_description(),
            "订阅者"
        );
    }

    #[test]
    fn test_pool_closed_maps_to_database_operation() {
        let context = recipient_context!(RepositoryOperation::Read, identity = "a@example.com");
        let err = RepositoryErrorHelpers::recipient_database_error(context, SqlxError::PoolClosed);
        match err {
            NotifierError::DatabaseOperation(msg) => assert!(msg.contains("连接池已关闭")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_carries_identity() {
        let context = recipient_context!(RepositoryOperation::Delete, identity = "+15550001111");
        let err = RepositoryErrorHelpers::recipient_not_found(context);
        assert!(matches!(
            err,
            NotifierError::RecipientNotFound { identity } if identity == "+15550001111"
        ));
    }
}
