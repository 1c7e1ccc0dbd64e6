//! 券码服务
//!
//! 券码的生成、校验与兑换核心：
//!
//! - **券码生成**：随机、可分段、可加前缀，唯一性由存储保证
//! - **校验引擎**：按固定顺序给出具体的拒绝原因
//! - **兑换迁移**：事务内重新规划名额，支持预留名额与匿名名额的绑定
//! - **活动管理**：分组、限制删除、显式转移与统计
//!
//! 存储提供 PostgreSQL（sqlx）与内存两种实现。

pub mod cli;
pub mod clock;
pub mod code_generator;
pub mod error;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;

pub use error::{RejectionReason, Result, VoucherError};
