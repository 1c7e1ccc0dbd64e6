//! 通知接收方
//!
//! 定义接收方 trait 并提供日志与进程内通道两种实现。

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use super::types::RedemptionCompleted;
use crate::error::{Result, VoucherError};

/// 兑换通知接收方
#[async_trait]
pub trait RedemptionNotifier: Send + Sync {
    /// 接收方名称，用于日志
    fn name(&self) -> &str;

    async fn redemption_completed(&self, event: &RedemptionCompleted) -> Result<()>;
}

/// 日志接收方
///
/// 将事件输出为一条结构化日志
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl RedemptionNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn redemption_completed(&self, event: &RedemptionCompleted) -> Result<()> {
        info!(
            event_id = %event.event_id,
            voucher_id = event.voucher_id,
            code = %event.code,
            voucher_type = %event.voucher_type,
            value = event.value,
            user_id = event.user_id.as_deref().unwrap_or("-"),
            redeemed_at = %event.redeemed_at,
            "券已兑换"
        );
        Ok(())
    }
}

/// 进程内通道接收方
///
/// 事件投递到 tokio 无界通道，接收端关闭后投递返回错误
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<RedemptionCompleted>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<RedemptionCompleted>) -> Self {
        Self { sender }
    }

    /// 创建接收方及其对应的接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RedemptionCompleted>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl RedemptionNotifier for ChannelNotifier {
    fn name(&self) -> &str {
        "channel"
    }

    async fn redemption_completed(&self, event: &RedemptionCompleted) -> Result<()> {
        self.sender
            .send(event.clone())
            .map_err(|_| VoucherError::Internal("通知通道已关闭".to_string()))
    }
}
