//! CLI 模块
//!
//! 提供运维命令行接口：
//!
//! - `migrate` - 执行数据库迁移
//! - `generate` / `create` - 批量或单张创建券
//! - `validate` / `redeem` - 校验与兑换
//! - `status` / `list` - 查询
//! - `campaign` - 活动管理
//!
//! # 使用示例
//!
//! ```bash
//! # 生成 100 张分段券
//! voucher-cli generate -q 100 -t monetary -v 500 --prefix XMAS- --segmented
//!
//! # 为两个用户预留的券
//! voucher-cli create -t percentage -v 15 -u alice -u bob --user-limit 2
//!
//! # 兑换
//! voucher-cli redeem XMAS-abcd-efgh-ijkl-mno --user alice --allow monetary
//!
//! # 删除活动前先转移券
//! voucher-cli campaign reassign 3 --to 4 && voucher-cli campaign delete 3
//! ```

pub mod commands;
pub mod runner;

pub use commands::{CampaignCommands, Cli, Commands, ListFilter};
pub use runner::CommandRunner;
