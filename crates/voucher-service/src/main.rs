//! 券码服务命令行入口
//!
//! 加载配置、初始化日志与指标、连接数据库后执行子命令。

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use voucher_service::cli::{Cli, CommandRunner, Commands};
use voucher_shared::{config::AppConfig, database::Database, observability};

const SERVICE_NAME: &str = "voucher-cli";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. 加载配置：config/default.toml -> config/{env}.toml -> config/voucher-cli.toml -> VOUCHER__*
    let (config, config_error) = match AppConfig::load(SERVICE_NAME) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // 2. 初始化可观测性，命令行日志级别优先
    let mut obs_config = config
        .observability
        .clone()
        .with_service_name(SERVICE_NAME);
    if let Some(level) = &cli.log_level {
        obs_config = obs_config.with_log_level(level.as_str());
    }
    observability::init(&obs_config)?;

    if let Some(e) = config_error {
        warn!(error = %e, "配置加载失败，使用默认配置");
    }
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 连接数据库
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    if config.database.run_migrations && !matches!(cli.command, Commands::Migrate) {
        db.run_migrations().await?;
    }

    // 4. 执行命令
    let runner = CommandRunner::new(db.clone(), &config.voucher)?;
    let result = runner.run(cli.command).await;

    db.close().await;
    result
}
