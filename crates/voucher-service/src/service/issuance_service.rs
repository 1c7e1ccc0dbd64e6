//! 券发放服务
//!
//! 负责券的创建：参数校验、券码生成、唯一约束冲突时重新生成。
//!
//! ## 券码冲突
//!
//! 生成器不做去重，插入遇到券码唯一约束冲突时重新生成，
//! 最多尝试 `max_code_attempts` 次，之后返回 `CodeGenerationExhausted`。
//! 显式指定的券码只插入一次，冲突直接返回 `DuplicateCode`。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use voucher_shared::config::VoucherConfig;
use voucher_shared::observability::metrics;

use crate::clock::{Clock, SystemClock};
use crate::code_generator::CodeGenerator;
use crate::error::{Result, VoucherError};
use crate::models::{MAX_CODE_LENGTH, NewVoucher, Voucher, VoucherType};
use crate::repository::VoucherRepositoryTrait;
use crate::service::dto::{CreateVoucherRequest, CreateVouchersRequest};

/// 券发放服务
pub struct VoucherIssuanceService<R>
where
    R: VoucherRepositoryTrait,
{
    repo: Arc<R>,
    generator: CodeGenerator,
    voucher_types: Vec<VoucherType>,
    default_segmented: bool,
    max_code_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl<R> VoucherIssuanceService<R>
where
    R: VoucherRepositoryTrait,
{
    /// 根据券配置构建服务，生成器配置非法时返回校验错误
    pub fn new(repo: Arc<R>, config: &VoucherConfig) -> Result<Self> {
        if config.max_code_attempts == 0 {
            return Err(VoucherError::Validation(
                "max_code_attempts 必须大于 0".to_string(),
            ));
        }

        Ok(Self {
            repo,
            generator: CodeGenerator::new(&config.code)?,
            voucher_types: config
                .types
                .iter()
                .map(|t| VoucherType::new(t.key.as_str()))
                .collect(),
            default_segmented: config.code.segmented,
            max_code_attempts: config.max_code_attempts,
            clock: Arc::new(SystemClock),
        })
    }

    /// 替换创建时间所用的时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 已配置的券类型
    pub fn voucher_types(&self) -> &[VoucherType] {
        &self.voucher_types
    }

    /// 创建单张券
    #[instrument(
        skip(self, request),
        fields(voucher_type = %request.voucher_type, user_limit = request.user_limit)
    )]
    pub async fn create_voucher(&self, request: CreateVoucherRequest) -> Result<Voucher> {
        let reserved_users = self.validate_request(&request)?;

        let template = NewVoucher {
            code: String::new(),
            voucher_type: request.voucher_type.clone(),
            value: request.value,
            user_limit: request.user_limit,
            valid_until: request.valid_until,
            campaign_id: request.campaign_id,
            created_at: self.clock.now(),
        };

        let voucher = match request.code {
            Some(code) => self.insert_explicit(template, code, &reserved_users).await?,
            None => {
                let segmented = request.segmented.unwrap_or(self.default_segmented);
                self.insert_generated(template, &request.prefix, segmented, &reserved_users)
                    .await?
            }
        };

        metrics::record_voucher_created(voucher.voucher_type.as_str(), 1);
        info!(
            voucher_id = voucher.id,
            code = %voucher.code,
            reserved = reserved_users.len(),
            "券创建成功"
        );

        Ok(voucher)
    }

    /// 批量创建券
    ///
    /// 逐张创建，任一失败即中断并返回 `BatchIncomplete`，
    /// 其中带有失败前已创建的券 ID，由调用方决定保留或清理
    #[instrument(skip(self, request), fields(quantity = request.quantity, voucher_type = %request.voucher_type))]
    pub async fn create_vouchers(&self, request: CreateVouchersRequest) -> Result<Vec<Voucher>> {
        if request.quantity == 0 {
            return Err(VoucherError::Validation("批量数量必须大于 0".to_string()));
        }

        let mut created = Vec::new();
        for _ in 0..request.quantity {
            match self.create_voucher(request.to_single()).await {
                Ok(voucher) => created.push(voucher),
                Err(e) => {
                    warn!(
                        requested = request.quantity,
                        created = created.len(),
                        error = %e,
                        "批量创建中断"
                    );
                    return Err(VoucherError::BatchIncomplete {
                        requested: request.quantity,
                        created: created.len(),
                        created_ids: created.iter().map(|v| v.id).collect(),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(count = created.len(), "批量创建完成");
        Ok(created)
    }

    /// 校验请求并返回去重后的预留用户
    fn validate_request(&self, request: &CreateVoucherRequest) -> Result<Vec<String>> {
        if !self.voucher_types.contains(&request.voucher_type) {
            return Err(VoucherError::UnknownVoucherType(
                request.voucher_type.to_string(),
            ));
        }
        if request.user_limit < 0 {
            return Err(VoucherError::Validation(format!(
                "user_limit 不能为负数: {}",
                request.user_limit
            )));
        }

        let mut seen = HashSet::new();
        let reserved: Vec<String> = request
            .users
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty() && seen.insert(u.to_string()))
            .map(str::to_string)
            .collect();

        if request.user_limit != 0 && reserved.len() > request.user_limit as usize {
            return Err(VoucherError::Validation(format!(
                "预留用户数 {} 超过 user_limit {}",
                reserved.len(),
                request.user_limit
            )));
        }

        Ok(reserved)
    }

    fn check_code_length(code: &str) -> Result<()> {
        if code.is_empty() {
            return Err(VoucherError::Validation("券码不能为空".to_string()));
        }
        let length = code.chars().count();
        if length > MAX_CODE_LENGTH {
            return Err(VoucherError::Validation(format!(
                "券码长度 {} 超过上限 {}",
                length, MAX_CODE_LENGTH
            )));
        }
        Ok(())
    }

    async fn insert_explicit(
        &self,
        mut voucher: NewVoucher,
        code: String,
        reserved_users: &[String],
    ) -> Result<Voucher> {
        let code = code.trim().to_string();
        Self::check_code_length(&code)?;
        voucher.code = code;
        self.repo.insert_voucher(&voucher, reserved_users).await
    }

    async fn insert_generated(
        &self,
        mut voucher: NewVoucher,
        prefix: &str,
        segmented: bool,
        reserved_users: &[String],
    ) -> Result<Voucher> {
        for attempt in 1..=self.max_code_attempts {
            voucher.code = self.generator.generate(prefix, segmented);
            Self::check_code_length(&voucher.code)?;

            match self.repo.insert_voucher(&voucher, reserved_users).await {
                Ok(created) => return Ok(created),
                Err(VoucherError::DuplicateCode(code)) => {
                    metrics::record_code_collision();
                    warn!(attempt, code = %code, "券码冲突，重新生成");
                }
                Err(e) => return Err(e),
            }
        }

        Err(VoucherError::CodeGenerationExhausted {
            attempts: self.max_code_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::{MemoryVoucherStore, MockVoucherRepositoryTrait};
    use chrono::{TimeZone, Utc};
    use voucher_shared::config::CodeConfig;
    use mockall::Sequence;
    use mockall::predicate::always;

    fn stored(voucher: &NewVoucher) -> Voucher {
        Voucher {
            id: 1,
            code: voucher.code.clone(),
            voucher_type: voucher.voucher_type.clone(),
            value: voucher.value,
            user_limit: voucher.user_limit,
            created_at: voucher.created_at,
            valid_until: voucher.valid_until,
            campaign_id: voucher.campaign_id,
        }
    }

    fn service(repo: MockVoucherRepositoryTrait) -> VoucherIssuanceService<MockVoucherRepositoryTrait> {
        VoucherIssuanceService::new(Arc::new(repo), &VoucherConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_type_rejected_before_insert() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher().never();

        let err = service(repo)
            .create_voucher(CreateVoucherRequest::new("gift_card", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::UnknownVoucherType(t) if t == "gift_card"));
    }

    #[tokio::test]
    async fn test_negative_user_limit_rejected() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher().never();

        let err = service(repo)
            .create_voucher(CreateVoucherRequest::new("monetary", 10).with_user_limit(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reserved_users_deduplicated_and_bounded() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher()
            .withf(|_, users| users.len() == 2 && users[0] == "alice" && users[1] == "bob")
            .times(1)
            .returning(|v, _| Ok(stored(v)));
        let svc = service(repo);

        svc.create_voucher(
            CreateVoucherRequest::new("monetary", 10)
                .with_user_limit(2)
                .with_users(["alice", " alice ", "", "bob"]),
        )
        .await
        .unwrap();

        let err = svc
            .create_voucher(
                CreateVoucherRequest::new("monetary", 10).with_users(["alice", "bob"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::Validation(_)));
    }

    #[tokio::test]
    async fn test_collision_regenerates_and_keeps_user_limit() {
        let mut repo = MockVoucherRepositoryTrait::new();
        let mut seq = Sequence::new();
        repo.expect_insert_voucher()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|v, _| Err(VoucherError::DuplicateCode(v.code.clone())));
        repo.expect_insert_voucher()
            .withf(|v, _| v.user_limit == 5)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|v, _| Ok(stored(v)));

        let voucher = service(repo)
            .create_voucher(CreateVoucherRequest::new("monetary", 10).with_user_limit(5))
            .await
            .unwrap();
        assert_eq!(voucher.user_limit, 5);
    }

    #[tokio::test]
    async fn test_collisions_exhaust_attempts() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher()
            .times(10)
            .returning(|v, _| Err(VoucherError::DuplicateCode(v.code.clone())));

        let err = service(repo)
            .create_voucher(CreateVoucherRequest::new("monetary", 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VoucherError::CodeGenerationExhausted { attempts: 10 }
        ));
    }

    #[tokio::test]
    async fn test_explicit_code_not_retried() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher()
            .with(always(), always())
            .times(1)
            .returning(|v, _| Err(VoucherError::DuplicateCode(v.code.clone())));

        let err = service(repo)
            .create_voucher(CreateVoucherRequest::new("monetary", 10).with_code("SUMMER"))
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::DuplicateCode(c) if c == "SUMMER"));
    }

    #[tokio::test]
    async fn test_overlong_prefix_rejected() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher().never();

        let err = service(repo)
            .create_voucher(CreateVoucherRequest::new("monetary", 10).with_prefix("P".repeat(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::Validation(_)));
    }

    #[tokio::test]
    async fn test_batch_reports_partial_progress() {
        let mut repo = MockVoucherRepositoryTrait::new();
        let mut seq = Sequence::new();
        repo.expect_insert_voucher()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|v, _| Ok(stored(v)));
        repo.expect_insert_voucher()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(VoucherError::Internal("disk full".to_string())));

        let err = service(repo)
            .create_vouchers(CreateVouchersRequest::new(5, "monetary", 10))
            .await
            .unwrap_err();

        match err {
            VoucherError::BatchIncomplete {
                requested,
                created,
                created_ids,
                source,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(created, 2);
                assert_eq!(created_ids.len(), 2);
                assert!(matches!(*source, VoucherError::Internal(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_rejects_zero_quantity() {
        let mut repo = MockVoucherRepositoryTrait::new();
        repo.expect_insert_voucher().never();

        let err = service(repo)
            .create_vouchers(CreateVouchersRequest::new(0, "monetary", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, VoucherError::Validation(_)));
    }

    #[tokio::test]
    async fn test_huge_batch_stops_at_first_failure() {
        let config = VoucherConfig {
            code: CodeConfig {
                length: 1,
                alphabet: "A".to_string(),
                ..CodeConfig::default()
            },
            max_code_attempts: 1,
            ..VoucherConfig::default()
        };
        let svc = VoucherIssuanceService::new(Arc::new(MemoryVoucherStore::new()), &config).unwrap();

        let err = svc
            .create_vouchers(CreateVouchersRequest::new(u32::MAX, "monetary", 1))
            .await
            .unwrap_err();

        match err {
            VoucherError::BatchIncomplete {
                requested, created, ..
            } => {
                assert_eq!(requested, u32::MAX);
                assert_eq!(created, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configured_segmentation_applies_without_override() {
        let mut config = VoucherConfig::default();
        config.code.segmented = true;
        let svc = VoucherIssuanceService::new(Arc::new(MemoryVoucherStore::new()), &config).unwrap();

        let default = svc
            .create_voucher(CreateVoucherRequest::new("monetary", 10))
            .await
            .unwrap();
        assert!(default.code.contains('-'));

        let plain = svc
            .create_voucher(CreateVoucherRequest::new("monetary", 10).with_segmented(false))
            .await
            .unwrap();
        assert!(!plain.code.contains('-'));
    }

    #[tokio::test]
    async fn test_created_at_comes_from_clock() {
        let fixed = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let svc = VoucherIssuanceService::new(
            Arc::new(MemoryVoucherStore::new()),
            &VoucherConfig::default(),
        )
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(fixed)));

        let voucher = svc
            .create_voucher(CreateVoucherRequest::new("monetary", 10))
            .await
            .unwrap();
        assert_eq!(voucher.created_at, fixed);
    }
}
