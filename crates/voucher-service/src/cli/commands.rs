//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。
//! 各子命令对应券码核心的对外操作：生成、校验、兑换、查询与活动管理。

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::models::VoucherFilter;

/// 券码服务命令行工具
///
/// 所有命令结果以 JSON 输出到标准输出，日志写入标准错误。
#[derive(Parser, Debug)]
#[command(name = "voucher-cli")]
#[command(version, about = "券码发放与兑换工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，未指定时使用配置文件
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 执行数据库迁移
    Migrate,

    /// 批量生成单次券
    Generate {
        /// 生成数量
        #[arg(short, long)]
        quantity: u32,

        /// 券类型（需在配置 voucher.types 中声明）
        #[arg(short = 't', long = "type")]
        voucher_type: String,

        /// 面值
        #[arg(short, long)]
        value: i64,

        /// 有效期截止时间（RFC 3339）
        #[arg(long)]
        valid_until: Option<DateTime<Utc>>,

        /// 券码前缀
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// 所属活动 ID
        #[arg(short, long)]
        campaign: Option<i64>,

        /// 生成分段券码（如 abcd-efgh-ijkl-mno），不指定时使用配置
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        segmented: Option<bool>,
    },

    /// 创建单张券
    Create {
        /// 券类型
        #[arg(short = 't', long = "type")]
        voucher_type: String,

        /// 面值
        #[arg(short, long)]
        value: i64,

        /// 预留用户（可重复）
        #[arg(short, long = "user")]
        users: Vec<String>,

        /// 可使用的不同用户数（0 表示不限）
        #[arg(long, default_value = "1")]
        user_limit: i32,

        /// 有效期截止时间（RFC 3339）
        #[arg(long)]
        valid_until: Option<DateTime<Utc>>,

        /// 券码前缀
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// 所属活动 ID
        #[arg(short, long)]
        campaign: Option<i64>,

        /// 显式指定券码（不指定则自动生成）
        #[arg(long)]
        code: Option<String>,

        /// 生成分段券码，不指定时使用配置
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        segmented: Option<bool>,
    },

    /// 校验券码
    Validate {
        /// 券码
        code: String,

        /// 用户 ID（匿名时不填）
        #[arg(short, long)]
        user: Option<String>,

        /// 允许的券类型（可重复，不填表示不限）
        #[arg(short, long = "allow")]
        allowed_types: Vec<String>,
    },

    /// 校验并兑换券码
    Redeem {
        /// 券码
        code: String,

        /// 用户 ID（匿名时不填）
        #[arg(short, long)]
        user: Option<String>,

        /// 允许的券类型（可重复，不填表示不限）
        #[arg(short, long = "allow")]
        allowed_types: Vec<String>,
    },

    /// 查询券状态
    Status {
        /// 券码
        code: String,
    },

    /// 列出券
    List {
        /// 过滤条件
        #[arg(short, long, value_enum, default_value_t = ListFilter::All)]
        filter: ListFilter,

        /// 仅列出该活动下的券
        #[arg(short, long)]
        campaign: Option<i64>,
    },

    /// 活动管理
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
}

/// 活动子命令
#[derive(Subcommand, Debug)]
pub enum CampaignCommands {
    /// 创建活动
    Create {
        /// 活动名称（唯一）
        name: String,

        /// 活动描述
        #[arg(short, long)]
        description: Option<String>,
    },

    /// 按名称列出活动
    List,

    /// 删除活动（仍有券时拒绝）
    Delete {
        /// 活动 ID
        id: i64,
    },

    /// 转移活动下的全部券
    Reassign {
        /// 源活动 ID
        from: i64,

        /// 目标活动 ID，不填则解除归属
        #[arg(long)]
        to: Option<i64>,
    },

    /// 活动统计
    Stats {
        /// 活动 ID
        id: i64,
    },
}

/// 列表过滤条件
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Used,
    Unused,
    Expired,
}

impl From<ListFilter> for VoucherFilter {
    fn from(filter: ListFilter) -> Self {
        match filter {
            ListFilter::All => VoucherFilter::All,
            ListFilter::Used => VoucherFilter::Used,
            ListFilter::Unused => VoucherFilter::Unused,
            ListFilter::Expired => VoucherFilter::Expired,
        }
    }
}
