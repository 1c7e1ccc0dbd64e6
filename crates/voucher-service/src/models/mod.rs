//! 券码服务领域模型
//!
//! 包含券、活动、兑换记录等核心实体定义

pub mod campaign;
pub mod redemption;
pub mod slot_claim;
pub mod voucher;

// 重新导出常用类型
pub use campaign::{Campaign, CampaignStats, NewCampaign};
pub use redemption::{Redemption, SlotSummary};
pub use slot_claim::SlotClaim;
pub use voucher::{MAX_CODE_LENGTH, NewVoucher, Voucher, VoucherFilter, VoucherType};
