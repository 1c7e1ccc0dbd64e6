//! 内存存储
//!
//! 与 Postgres 仓储相同的原子性约定：所有状态由一把互斥锁保护，
//! 名额认领在持锁期间完成规划与写入。适用于测试和嵌入式场景。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::traits::{CampaignRepositoryTrait, VoucherRepositoryTrait};
use crate::error::{Result, VoucherError};
use crate::models::{
    Campaign, NewCampaign, NewVoucher, Redemption, SlotClaim, Voucher, VoucherFilter,
};

#[derive(Debug, Default)]
struct StoreState {
    vouchers: BTreeMap<i64, Voucher>,
    redemptions: BTreeMap<i64, Redemption>,
    campaigns: BTreeMap<i64, Campaign>,
    next_voucher_id: i64,
    next_redemption_id: i64,
    next_campaign_id: i64,
    /// 待注入的认领冲突次数
    pending_conflicts: u32,
}

impl StoreState {
    fn slots_of(&self, voucher_id: i64) -> Vec<Redemption> {
        self.redemptions
            .values()
            .filter(|r| r.voucher_id == voucher_id)
            .cloned()
            .collect()
    }

    fn has_redeemed_slot(&self, voucher_id: i64) -> bool {
        self.redemptions
            .values()
            .any(|r| r.voucher_id == voucher_id && r.is_redeemed())
    }

    fn matches(
        &self,
        voucher: &Voucher,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        if campaign_id.is_some() && voucher.campaign_id != campaign_id {
            return false;
        }
        match filter {
            VoucherFilter::All => true,
            VoucherFilter::Used => self.has_redeemed_slot(voucher.id),
            VoucherFilter::Unused => !self.has_redeemed_slot(voucher.id),
            VoucherFilter::Expired => voucher.is_expired(now),
        }
    }

    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// 内存券存储
///
/// 同时实现券仓储与活动仓储，克隆后共享同一份状态
#[derive(Debug, Clone, Default)]
pub struct MemoryVoucherStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来 n 次名额认领返回存储冲突，用于模拟并发写入
    #[cfg(any(test, feature = "test-utils"))]
    pub fn inject_claim_conflicts(&self, n: u32) {
        self.state.lock().pending_conflicts = n;
    }

    /// 券总数
    pub fn voucher_count(&self) -> usize {
        self.state.lock().vouchers.len()
    }
}

#[async_trait]
impl VoucherRepositoryTrait for MemoryVoucherStore {
    async fn insert_voucher(
        &self,
        voucher: &NewVoucher,
        reserved_users: &[String],
    ) -> Result<Voucher> {
        let mut state = self.state.lock();

        if state.vouchers.values().any(|v| v.code == voucher.code) {
            return Err(VoucherError::DuplicateCode(voucher.code.clone()));
        }
        if let Some(campaign_id) = voucher.campaign_id {
            if !state.campaigns.contains_key(&campaign_id) {
                return Err(VoucherError::CampaignNotFound(campaign_id));
            }
        }

        let id = StoreState::next_id(&mut state.next_voucher_id);
        let created = Voucher {
            id,
            code: voucher.code.clone(),
            voucher_type: voucher.voucher_type.clone(),
            value: voucher.value,
            user_limit: voucher.user_limit,
            created_at: voucher.created_at,
            valid_until: voucher.valid_until,
            campaign_id: voucher.campaign_id,
        };
        state.vouchers.insert(id, created.clone());

        for user_id in reserved_users {
            let slot_id = StoreState::next_id(&mut state.next_redemption_id);
            state.redemptions.insert(
                slot_id,
                Redemption {
                    id: slot_id,
                    voucher_id: id,
                    user_id: Some(user_id.clone()),
                    redeemed_at: None,
                },
            );
        }

        Ok(created)
    }

    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>> {
        Ok(self.state.lock().vouchers.get(&id).cloned())
    }

    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        Ok(self
            .state
            .lock()
            .vouchers
            .values()
            .find(|v| v.code == code)
            .cloned())
    }

    async fn list_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Voucher>> {
        let state = self.state.lock();
        Ok(state
            .vouchers
            .values()
            .filter(|v| state.matches(v, filter, campaign_id, now))
            .cloned()
            .collect())
    }

    async fn count_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let state = self.state.lock();
        Ok(state
            .vouchers
            .values()
            .filter(|v| state.matches(v, filter, campaign_id, now))
            .count() as i64)
    }

    async fn list_redemptions(&self, voucher_id: i64) -> Result<Vec<Redemption>> {
        Ok(self.state.lock().slots_of(voucher_id))
    }

    async fn claim_slot(
        &self,
        voucher_id: i64,
        user_id: Option<String>,
        redeemed_at: DateTime<Utc>,
    ) -> Result<Redemption> {
        let mut state = self.state.lock();

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(VoucherError::StoreConflict);
        }

        let voucher = state
            .vouchers
            .get(&voucher_id)
            .cloned()
            .ok_or(VoucherError::VoucherNotFound(voucher_id))?;
        let slots = state.slots_of(voucher_id);

        let slot_id = match SlotClaim::plan(&voucher, &slots, user_id.as_deref())? {
            SlotClaim::Restamp(id) | SlotClaim::Claim(id) => id,
            SlotClaim::Adopt(id) => {
                let slot = state
                    .redemptions
                    .get_mut(&id)
                    .ok_or(VoucherError::StoreConflict)?;
                if slot.user_id.is_some() || slot.is_redeemed() {
                    return Err(VoucherError::StoreConflict);
                }
                slot.user_id = user_id;
                id
            }
            SlotClaim::Create => {
                let id = StoreState::next_id(&mut state.next_redemption_id);
                state.redemptions.insert(
                    id,
                    Redemption {
                        id,
                        voucher_id,
                        user_id,
                        redeemed_at: None,
                    },
                );
                id
            }
        };

        let slot = state
            .redemptions
            .get_mut(&slot_id)
            .ok_or_else(|| VoucherError::Internal(format!("名额丢失: {slot_id}")))?;
        slot.redeemed_at = Some(redeemed_at);

        Ok(slot.clone())
    }
}

#[async_trait]
impl CampaignRepositoryTrait for MemoryVoucherStore {
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign> {
        let mut state = self.state.lock();

        if state.campaigns.values().any(|c| c.name == campaign.name) {
            return Err(VoucherError::CampaignNameTaken(campaign.name.clone()));
        }

        let id = StoreState::next_id(&mut state.next_campaign_id);
        let created = Campaign {
            id,
            name: campaign.name.clone(),
            description: campaign.description.clone(),
        };
        state.campaigns.insert(id, created.clone());

        Ok(created)
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        Ok(self.state.lock().campaigns.get(&id).cloned())
    }

    async fn get_campaign_by_name(&self, name: &str) -> Result<Option<Campaign>> {
        Ok(self
            .state
            .lock()
            .campaigns
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<_> = self.state.lock().campaigns.values().cloned().collect();
        campaigns.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(campaigns)
    }

    async fn delete_campaign(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock();

        if !state.campaigns.contains_key(&id) {
            return Err(VoucherError::CampaignNotFound(id));
        }

        let voucher_count = state
            .vouchers
            .values()
            .filter(|v| v.campaign_id == Some(id))
            .count() as i64;
        if voucher_count > 0 {
            return Err(VoucherError::CampaignInUse {
                campaign_id: id,
                voucher_count,
            });
        }

        state.campaigns.remove(&id);
        Ok(())
    }

    async fn reassign_vouchers(&self, from: i64, to: Option<i64>) -> Result<u64> {
        let mut state = self.state.lock();

        for campaign_id in std::iter::once(from).chain(to) {
            if !state.campaigns.contains_key(&campaign_id) {
                return Err(VoucherError::CampaignNotFound(campaign_id));
            }
        }

        let mut moved = 0;
        for voucher in state.vouchers.values_mut() {
            if voucher.campaign_id == Some(from) {
                voucher.campaign_id = to;
                moved += 1;
            }
        }

        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionReason;
    use crate::models::VoucherType;

    fn new_voucher(code: &str, user_limit: i32) -> NewVoucher {
        NewVoucher {
            code: code.to_string(),
            voucher_type: VoucherType::new("monetary"),
            value: 100,
            user_limit,
            valid_until: None,
            campaign_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let store = MemoryVoucherStore::new();
        store.insert_voucher(&new_voucher("SAME", 1), &[]).await.unwrap();

        let err = store
            .insert_voucher(&new_voucher("SAME", 1), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::DuplicateCode(code) if code == "SAME"));
        assert_eq!(store.voucher_count(), 1);
    }

    #[tokio::test]
    async fn test_reserved_users_create_unredeemed_slots() {
        let store = MemoryVoucherStore::new();
        let voucher = store
            .insert_voucher(
                &new_voucher("RSV", 2),
                &["alice".to_string(), "bob".to_string()],
            )
            .await
            .unwrap();

        let slots = store.list_redemptions(voucher.id).await.unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| !s.is_redeemed()));
    }

    #[tokio::test]
    async fn test_claim_slot_rejects_when_full() {
        let store = MemoryVoucherStore::new();
        let voucher = store.insert_voucher(&new_voucher("ONE", 1), &[]).await.unwrap();

        store.claim_slot(voucher.id, None, Utc::now()).await.unwrap();
        let err = store
            .claim_slot(voucher.id, None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionReason::AlreadyFullyRedeemed));
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = MemoryVoucherStore::new();
        let voucher = store.insert_voucher(&new_voucher("CFL", 0), &[]).await.unwrap();

        store.inject_claim_conflicts(1);
        assert!(
            store
                .claim_slot(voucher.id, Some("alice".to_string()), Utc::now())
                .await
                .unwrap_err()
                .is_conflict()
        );
        assert!(
            store
                .claim_slot(voucher.id, Some("alice".to_string()), Utc::now())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_insert_with_unknown_campaign_fails() {
        let store = MemoryVoucherStore::new();
        let mut voucher = new_voucher("CMP", 1);
        voucher.campaign_id = Some(99);

        let err = store.insert_voucher(&voucher, &[]).await.unwrap_err();
        assert!(matches!(err, VoucherError::CampaignNotFound(99)));
    }
}
