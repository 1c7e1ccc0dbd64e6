//! 活动仓储
//!
//! 活动删除采用限制策略：仍有券引用时拒绝删除，需要先显式转移券。

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::CampaignRepositoryTrait;
use crate::error::{Result, VoucherError, db_error_parts, pg_codes};
use crate::models::{Campaign, NewCampaign};

const NAME_UNIQUE_CONSTRAINT: &str = "campaigns_name_key";

/// 活动仓储
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn campaign_exists(conn: &mut sqlx::PgConnection, id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM campaigns WHERE id = $1)")
                .bind(id)
                .fetch_one(conn)
                .await?;

        Ok(exists)
    }
}

#[async_trait]
impl CampaignRepositoryTrait for CampaignRepository {
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign> {
        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description
            "#,
        )
        .bind(&campaign.name)
        .bind(&campaign.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match db_error_parts(&err) {
            Some((code, Some(constraint)))
                if code == pg_codes::UNIQUE_VIOLATION && constraint == NAME_UNIQUE_CONSTRAINT =>
            {
                VoucherError::CampaignNameTaken(campaign.name.clone())
            }
            _ => VoucherError::from(err),
        })
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT id, name, description FROM campaigns WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn get_campaign_by_name(&self, name: &str) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT id, name, description FROM campaigns WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            "SELECT id, name, description FROM campaigns ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(campaigns)
    }

    async fn delete_campaign(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // 锁定活动行，阻止并发新增引用
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(VoucherError::CampaignNotFound(id));
        }

        let voucher_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE campaign_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if voucher_count > 0 {
            return Err(VoucherError::CampaignInUse {
                campaign_id: id,
                voucher_count,
            });
        }

        sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|err| match db_error_parts(&err) {
                // ON DELETE RESTRICT 兜底
                Some((code, _)) if code == pg_codes::FOREIGN_KEY_VIOLATION => {
                    VoucherError::CampaignInUse {
                        campaign_id: id,
                        voucher_count,
                    }
                }
                _ => VoucherError::from(err),
            })?;

        tx.commit().await?;

        Ok(())
    }

    async fn reassign_vouchers(&self, from: i64, to: Option<i64>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        if !Self::campaign_exists(&mut tx, from).await? {
            return Err(VoucherError::CampaignNotFound(from));
        }
        if let Some(target) = to {
            if !Self::campaign_exists(&mut tx, target).await? {
                return Err(VoucherError::CampaignNotFound(target));
            }
        }

        let result = sqlx::query("UPDATE vouchers SET campaign_id = $2 WHERE campaign_id = $1")
            .bind(from)
            .bind(to)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
