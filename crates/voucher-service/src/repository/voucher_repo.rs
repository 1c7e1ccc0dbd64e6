//! 券仓储
//!
//! 提供券与兑换名额的数据访问。兑换名额的认领在单个事务中完成：
//! `FOR UPDATE NOWAIT` 锁定券行，重新读取名额并规划，再落库。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::traits::VoucherRepositoryTrait;
use crate::error::{Result, VoucherError, db_error_parts, pg_codes};
use crate::models::{NewVoucher, Redemption, SlotClaim, Voucher, VoucherFilter};

const VOUCHER_COLUMNS: &str =
    "v.id, v.code, v.voucher_type, v.value, v.user_limit, v.created_at, v.valid_until, v.campaign_id";

const CODE_UNIQUE_CONSTRAINT: &str = "vouchers_code_key";
const CAMPAIGN_FK_CONSTRAINT: &str = "vouchers_campaign_id_fkey";

/// 券仓储
pub struct VoucherRepository {
    pool: PgPool,
}

impl VoucherRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 过滤条件对应的 SQL 片段
    ///
    /// 参数约定：$1 活动 ID（可空），$2 当前时间（仅过期过滤使用）
    fn filter_clause(filter: VoucherFilter) -> &'static str {
        match filter {
            VoucherFilter::All => "TRUE",
            VoucherFilter::Used => {
                "EXISTS (SELECT 1 FROM voucher_redemptions r \
                 WHERE r.voucher_id = v.id AND r.redeemed_at IS NOT NULL)"
            }
            VoucherFilter::Unused => {
                "NOT EXISTS (SELECT 1 FROM voucher_redemptions r \
                 WHERE r.voucher_id = v.id AND r.redeemed_at IS NOT NULL)"
            }
            VoucherFilter::Expired => "v.valid_until IS NOT NULL AND v.valid_until < $2",
        }
    }

    /// Postgres 不接受多余的绑定参数
    fn binds_now(filter: VoucherFilter) -> bool {
        matches!(filter, VoucherFilter::Expired)
    }

    /// 插入错误映射：券码唯一约束与活动外键需要给出具体错误
    fn map_insert_error(err: sqlx::Error, voucher: &NewVoucher) -> VoucherError {
        match db_error_parts(&err) {
            Some((code, Some(constraint)))
                if code == pg_codes::UNIQUE_VIOLATION && constraint == CODE_UNIQUE_CONSTRAINT =>
            {
                VoucherError::DuplicateCode(voucher.code.clone())
            }
            Some((code, Some(constraint)))
                if code == pg_codes::FOREIGN_KEY_VIOLATION
                    && constraint == CAMPAIGN_FK_CONSTRAINT =>
            {
                VoucherError::CampaignNotFound(voucher.campaign_id.unwrap_or_default())
            }
            _ => VoucherError::from(err),
        }
    }
}

#[async_trait]
impl VoucherRepositoryTrait for VoucherRepository {
    async fn insert_voucher(
        &self,
        voucher: &NewVoucher,
        reserved_users: &[String],
    ) -> Result<Voucher> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Voucher>(
            r#"
            INSERT INTO vouchers (code, voucher_type, value, user_limit, valid_until, campaign_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, code, voucher_type, value, user_limit, created_at, valid_until, campaign_id
            "#,
        )
        .bind(&voucher.code)
        .bind(&voucher.voucher_type)
        .bind(voucher.value)
        .bind(voucher.user_limit)
        .bind(voucher.valid_until)
        .bind(voucher.campaign_id)
        .bind(voucher.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::map_insert_error(e, voucher))?;

        for user_id in reserved_users {
            sqlx::query(
                r#"
                INSERT INTO voucher_redemptions (voucher_id, user_id)
                VALUES ($1, $2)
                "#,
            )
            .bind(created.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn get_voucher(&self, id: i64) -> Result<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers v WHERE v.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers v WHERE v.code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn list_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Voucher>> {
        let sql = format!(
            r#"
            SELECT {VOUCHER_COLUMNS}
            FROM vouchers v
            WHERE ($1::BIGINT IS NULL OR v.campaign_id = $1)
              AND {}
            ORDER BY v.id ASC
            "#,
            Self::filter_clause(filter)
        );

        let mut query = sqlx::query_as::<_, Voucher>(&sql).bind(campaign_id);
        if Self::binds_now(filter) {
            query = query.bind(now);
        }
        let vouchers = query.fetch_all(&self.pool).await?;

        Ok(vouchers)
    }

    async fn count_vouchers(
        &self,
        filter: VoucherFilter,
        campaign_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM vouchers v
            WHERE ($1::BIGINT IS NULL OR v.campaign_id = $1)
              AND {}
            "#,
            Self::filter_clause(filter)
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(campaign_id);
        if Self::binds_now(filter) {
            query = query.bind(now);
        }
        let count = query.fetch_one(&self.pool).await?;

        Ok(count)
    }

    async fn list_redemptions(&self, voucher_id: i64) -> Result<Vec<Redemption>> {
        let redemptions = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, voucher_id, user_id, redeemed_at
            FROM voucher_redemptions
            WHERE voucher_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(voucher_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(redemptions)
    }

    async fn claim_slot(
        &self,
        voucher_id: i64,
        user_id: Option<String>,
        redeemed_at: DateTime<Utc>,
    ) -> Result<Redemption> {
        let mut tx = self.pool.begin().await?;

        // 锁不到立即失败（55P03），由服务层按存储冲突重试
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers v WHERE v.id = $1 FOR UPDATE NOWAIT"
        ))
        .bind(voucher_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(VoucherError::VoucherNotFound(voucher_id))?;

        let slots = sqlx::query_as::<_, Redemption>(
            r#"
            SELECT id, voucher_id, user_id, redeemed_at
            FROM voucher_redemptions
            WHERE voucher_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(voucher_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = SlotClaim::plan(&voucher, &slots, user_id.as_deref())?;
        debug!(voucher_id, ?plan, "兑换名额规划完成");

        let redemption = match plan {
            SlotClaim::Restamp(slot_id) | SlotClaim::Claim(slot_id) => {
                sqlx::query_as::<_, Redemption>(
                    r#"
                    UPDATE voucher_redemptions
                    SET redeemed_at = $2
                    WHERE id = $1
                    RETURNING id, voucher_id, user_id, redeemed_at
                    "#,
                )
                .bind(slot_id)
                .bind(redeemed_at)
                .fetch_one(&mut *tx)
                .await?
            }
            SlotClaim::Adopt(slot_id) => sqlx::query_as::<_, Redemption>(
                r#"
                UPDATE voucher_redemptions
                SET user_id = $2, redeemed_at = $3
                WHERE id = $1 AND user_id IS NULL AND redeemed_at IS NULL
                RETURNING id, voucher_id, user_id, redeemed_at
                "#,
            )
            .bind(slot_id)
            .bind(&user_id)
            .bind(redeemed_at)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(VoucherError::StoreConflict)?,
            SlotClaim::Create => {
                sqlx::query_as::<_, Redemption>(
                    r#"
                    INSERT INTO voucher_redemptions (voucher_id, user_id, redeemed_at)
                    VALUES ($1, $2, $3)
                    RETURNING id, voucher_id, user_id, redeemed_at
                    "#,
                )
                .bind(voucher_id)
                .bind(&user_id)
                .bind(redeemed_at)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(redemption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_and_unused_clauses_are_complementary() {
        let used = VoucherRepository::filter_clause(VoucherFilter::Used);
        let unused = VoucherRepository::filter_clause(VoucherFilter::Unused);
        assert_eq!(format!("NOT {used}"), unused);
    }

    #[test]
    fn test_expired_clause_uses_now_parameter() {
        let clause = VoucherRepository::filter_clause(VoucherFilter::Expired);
        assert!(clause.contains("$2"));
        assert!(clause.contains("<"));
        assert!(VoucherRepository::binds_now(VoucherFilter::Expired));
        assert!(!VoucherRepository::binds_now(VoucherFilter::Used));
    }
}
