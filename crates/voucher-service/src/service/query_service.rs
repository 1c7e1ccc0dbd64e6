//! 券查询服务（只读操作）

use std::sync::Arc;

use tracing::instrument;

use crate::clock::Clock;
use crate::error::{RejectionReason, Result, VoucherError};
use crate::models::{SlotSummary, Voucher, VoucherFilter};
use crate::repository::VoucherRepositoryTrait;
use crate::service::dto::VoucherStatus;

/// 券查询服务
pub struct VoucherQueryService<R>
where
    R: VoucherRepositoryTrait,
{
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> VoucherQueryService<R>
where
    R: VoucherRepositoryTrait,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 查询券状态
    #[instrument(skip(self))]
    pub async fn status(&self, code: &str) -> Result<VoucherStatus> {
        let voucher = self
            .repo
            .get_voucher_by_code(code)
            .await?
            .ok_or(RejectionReason::CodeNotFound)?;

        self.status_of(voucher).await
    }

    /// 按 ID 查询券状态
    #[instrument(skip(self))]
    pub async fn status_by_id(&self, id: i64) -> Result<VoucherStatus> {
        let voucher = self
            .repo
            .get_voucher(id)
            .await?
            .ok_or(VoucherError::VoucherNotFound(id))?;

        self.status_of(voucher).await
    }

    /// 列出券
    #[instrument(skip(self))]
    pub async fn list_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
    ) -> Result<Vec<Voucher>> {
        self.repo
            .list_vouchers(filter, campaign_id, self.clock.now())
            .await
    }

    async fn status_of(&self, voucher: Voucher) -> Result<VoucherStatus> {
        let redemptions = self.repo.list_redemptions(voucher.id).await?;
        let summary = SlotSummary::of(&redemptions);

        Ok(VoucherStatus {
            redeemed_count: summary.redeemed,
            is_redeemed: voucher.is_fully_redeemed(summary.redeemed),
            is_expired: voucher.is_expired(self.clock.now()),
            last_redeemed_at: summary.last_redeemed_at,
            remaining_uses: voucher.remaining_uses(summary.redeemed),
            voucher,
            redemptions,
        })
    }
}
