//! 可观测性
//!
//! 日志由 tracing-subscriber 输出到标准错误；指标通过 metrics 门面记录，
//! 导出端由宿主进程自行安装。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识指标的来源
    pub service_name: String,

    /// 日志级别（如 "info", "debug"）
    pub log_level: String,

    /// 是否启用 JSON 格式日志
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    /// 覆盖日志级别
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

/// 初始化日志并注册指标描述
///
/// 进程内只能调用一次，重复调用返回错误
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;
    metrics::describe_metrics(&config.service_name);

    info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Observability initialized"
    );

    Ok(())
}
