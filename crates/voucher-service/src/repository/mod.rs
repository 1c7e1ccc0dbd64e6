//! 数据库仓储层
//!
//! 提供券、活动、兑换记录的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 兑换名额的读取-校验-写入在仓储内一次完成（Postgres 事务 / 内存互斥锁）
//! - 使用 SQLx 进行类型安全的数据库操作
//! - 定义 trait 接口以支持 mock 测试与内存实现

mod campaign_repo;
mod memory_repo;
mod traits;
mod voucher_repo;

pub use campaign_repo::CampaignRepository;
pub use memory_repo::MemoryVoucherStore;
pub use traits::*;
pub use voucher_repo::VoucherRepository;
