use anyhow::{Context, Result};
use clap::Parser;
use notifier::app::Application;
use notifier::cli::{self, Cli};
use notifier_config::AppConfig;
use notifier_infrastructure::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    // 初始化日志系统，命令行参数优先
    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    init_logging(log_level, log_format)?;

    info!("启动批量通知分发系统");

    let app = Application::new(config).await?;
    let result = cli::execute(&app, cli.command).await;
    app.shutdown().await;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("命令执行失败: {e:#}");
            eprintln!("{}", serde_json::to_string_pretty(&cli::error_output(&e))?);
            Err(e)
        }
    }
}
