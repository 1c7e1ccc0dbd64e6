//! 服务层
//!
//! 实现券码业务逻辑，协调仓储层、时钟与通知。
//!
//! ## 模块结构
//!
//! - `dto`: 请求与视图对象
//! - `eligibility`: 券码校验引擎（只读）
//! - `issuance_service`: 券创建与批量生成
//! - `redemption_service`: 兑换状态迁移与通知
//! - `query_service`: 券状态查询（只读）
//! - `campaign_service`: 活动管理

pub mod campaign_service;
pub mod dto;
pub mod eligibility;
pub mod issuance_service;
pub mod query_service;
pub mod redemption_service;

pub use campaign_service::CampaignService;
pub use dto::*;
pub use eligibility::EligibilityEngine;
pub use issuance_service::VoucherIssuanceService;
pub use query_service::VoucherQueryService;
pub use redemption_service::RedemptionService;
