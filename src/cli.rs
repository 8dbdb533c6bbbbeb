use anyhow::Result;
use clap::{Parser, Subcommand};
use notifier_domain::{ChannelKind, RecipientFilter, SubscriptionSource};
use notifier_errors::NotifierError;
use serde_json::{json, Value};

use crate::app::{Application, SendOverrides};

#[derive(Parser, Debug)]
#[command(name = "notifier")]
#[command(version = "1.0.0")]
#[command(about = "批量通知分发系统")]
#[command(long_about = "向订阅者分批发送一次性广播通知，记录每次发送的结果并重试失败的发送")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 日志级别，默认取配置文件
    #[arg(short, long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// 日志格式，默认取配置文件
    #[arg(long, global = true, value_parser = ["json", "pretty"])]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 向所有待通知的订阅者发送消息，默认只预览
    Send {
        /// 自定义消息内容
        #[arg(short, long)]
        message: Option<String>,
        /// 每批并发发送数
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// 批次之间暂停的毫秒数
        #[arg(long)]
        delay_ms: Option<u64>,
        /// 实际发送，不加此参数只预览
        #[arg(long)]
        execute: bool,
    },
    /// 重新发送给失败次数低于上限的订阅者
    Retry {
        /// 失败次数上限
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// 订阅统计
    Stats,
    /// 列出订阅者
    List {
        /// 按通知状态过滤
        #[arg(long)]
        notified: Option<bool>,
        /// 按渠道过滤
        #[arg(long)]
        channel: Option<ChannelKind>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        limit: u32,
    },
    /// 列出发送失败的订阅者
    Failed,
    /// 添加订阅者
    Subscribe {
        /// 邮箱地址或国际格式的电话号码
        identity: String,
        #[arg(long, default_value = "email")]
        channel: ChannelKind,
        #[arg(long, default_value = "manual")]
        source: SubscriptionSource,
    },
    /// 取消订阅
    Unsubscribe {
        identity: String,
    },
}

/// 执行子命令，返回要输出的 JSON
pub async fn execute(app: &Application, command: Commands) -> Result<Value> {
    let output = match command {
        Commands::Send {
            message,
            batch_size,
            delay_ms,
            execute,
        } => {
            let overrides = SendOverrides {
                message,
                batch_size,
                delay_ms,
                execute,
            };
            serde_json::to_value(app.send(&overrides).await?)?
        }
        Commands::Retry { max_attempts } => serde_json::to_value(app.retry(max_attempts).await?)?,
        Commands::Stats => serde_json::to_value(app.stats().await?)?,
        Commands::List {
            notified,
            channel,
            page,
            limit,
        } => {
            let filter = RecipientFilter {
                notified,
                channel,
                page,
                limit,
            };
            serde_json::to_value(app.list(&filter).await?)?
        }
        Commands::Failed => {
            let failed = app.failed().await?;
            json!({ "count": failed.len(), "recipients": failed })
        }
        Commands::Subscribe {
            identity,
            channel,
            source,
        } => serde_json::to_value(app.subscribe(&identity, channel, source).await?)?,
        Commands::Unsubscribe { identity } => {
            app.unsubscribe(&identity).await?;
            json!({ "unsubscribed": identity })
        }
    };
    Ok(output)
}

/// 命令失败时输出的 JSON，业务错误附带面向用户的提示
pub fn error_output(err: &anyhow::Error) -> Value {
    match err.downcast_ref::<NotifierError>() {
        Some(e) => json!({ "error": e.user_message(), "detail": e.to_string() }),
        None => json!({ "error": "命令执行失败", "detail": format!("{err:#}") }),
    }
}
