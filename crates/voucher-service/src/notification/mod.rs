//! 兑换通知模块
//!
//! 兑换成功后向已注册的通知接收方广播 `RedemptionCompleted` 事件。
//!
//! ## 功能特性
//!
//! - **显式注册**：接收方在构造服务时注入，没有全局信号
//! - **异步发送**：每个接收方在独立任务中执行，不阻塞兑换流程
//! - **失败隔离**：接收方失败只记录日志，不回滚兑换

pub mod channels;
pub mod sender;
pub mod types;

pub use channels::{ChannelNotifier, LogNotifier, RedemptionNotifier};
pub use sender::NotificationSender;
pub use types::RedemptionCompleted;
