//! 通知发送器
//!
//! 持有已注册的接收方，兑换成功后以 fire-and-forget 方式逐个投递。

use std::sync::Arc;

use tracing::{debug, warn};

use super::channels::RedemptionNotifier;
use super::types::RedemptionCompleted;

/// 通知发送器
#[derive(Clone, Default)]
pub struct NotificationSender {
    notifiers: Vec<Arc<dyn RedemptionNotifier>>,
}

impl NotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册接收方
    pub fn register(&mut self, notifier: Arc<dyn RedemptionNotifier>) {
        self.notifiers.push(notifier);
    }

    /// 异步广播事件（fire-and-forget）
    ///
    /// 必须在 tokio 运行时内调用
    pub fn send_async(&self, event: RedemptionCompleted) {
        for notifier in &self.notifiers {
            let notifier = notifier.clone();
            let event = event.clone();

            tokio::spawn(async move {
                match notifier.redemption_completed(&event).await {
                    Ok(()) => debug!(
                        notifier = notifier.name(),
                        event_id = %event.event_id,
                        "兑换通知已投递"
                    ),
                    Err(e) => warn!(
                        notifier = notifier.name(),
                        event_id = %event.event_id,
                        voucher_id = event.voucher_id,
                        error = %e,
                        "兑换通知投递失败"
                    ),
                }
            });
        }
    }
}

impl std::fmt::Debug for NotificationSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.notifiers.iter().map(|n| n.name().to_string()).collect();
        f.debug_struct("NotificationSender")
            .field("notifiers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoucherError;
    use crate::notification::channels::ChannelNotifier;
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    struct FailingNotifier;

    #[async_trait]
    impl RedemptionNotifier for FailingNotifier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn redemption_completed(&self, _event: &RedemptionCompleted) -> crate::error::Result<()> {
            Err(VoucherError::Internal("down".to_string()))
        }
    }

    fn event() -> RedemptionCompleted {
        RedemptionCompleted {
            event_id: Uuid::new_v4(),
            voucher_id: 1,
            redemption_id: 10,
            code: "ABC".to_string(),
            voucher_type: "monetary".into(),
            value: 500,
            user_id: Some("alice".to_string()),
            redeemed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_send_async_delivers_to_every_notifier() {
        let (first, mut first_rx) = ChannelNotifier::channel();
        let (second, mut second_rx) = ChannelNotifier::channel();

        let mut sender = NotificationSender::new();
        sender.register(Arc::new(first));
        sender.register(Arc::new(second));

        let event = event();
        sender.send_async(event.clone());

        assert_eq!(first_rx.recv().await, Some(event.clone()));
        assert_eq!(second_rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_block_others() {
        let (channel, mut rx) = ChannelNotifier::channel();
        let mut sender = NotificationSender::new();
        sender.register(Arc::new(FailingNotifier));
        sender.register(Arc::new(channel));

        sender.send_async(event());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_channel_reports_error() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        assert!(notifier.redemption_completed(&event()).await.is_err());
    }
}
