//! 券码服务错误类型
//!
//! 定义服务层的业务错误和系统错误。校验拒绝统一收敛为 [`RejectionReason`]，
//! 每个原因对应独立的用户提示文案。

use serde::Serialize;
use thiserror::Error;

/// 校验拒绝原因
///
/// 顺序与校验流程一致，先命中的原因优先返回
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// 券码不存在
    CodeNotFound,
    /// 非单次券必须提供用户身份
    UserRequired,
    /// 券已被全部使用
    AlreadyFullyRedeemed,
    /// 当前账户已使用过该券
    AlreadyUsedByAccount,
    /// 所有用户名额已绑定给其他账户
    NotValidForAccount,
    /// 券类型不适用于当前场景
    TypeNotAllowedHere,
    /// 券已过期
    Expired,
}

impl RejectionReason {
    /// 错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::CodeNotFound => "CODE_NOT_FOUND",
            Self::UserRequired => "USER_REQUIRED",
            Self::AlreadyFullyRedeemed => "ALREADY_FULLY_REDEEMED",
            Self::AlreadyUsedByAccount => "ALREADY_USED_BY_ACCOUNT",
            Self::NotValidForAccount => "NOT_VALID_FOR_ACCOUNT",
            Self::TypeNotAllowedHere => "TYPE_NOT_ALLOWED_HERE",
            Self::Expired => "EXPIRED",
        }
    }

    /// 面向用户的提示文案
    pub fn message(&self) -> &'static str {
        match self {
            Self::CodeNotFound => "券码无效",
            Self::UserRequired => "使用该券码需要登录账户",
            Self::AlreadyFullyRedeemed => "券码已被使用",
            Self::AlreadyUsedByAccount => "您的账户已使用过该券码",
            Self::NotValidForAccount => "该券码不适用于您的账户",
            Self::TypeNotAllowedHere => "该券码不能在此处使用",
            Self::Expired => "券码已过期",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// 券码服务错误类型
#[derive(Debug, Error)]
pub enum VoucherError {
    // === 校验拒绝 ===
    #[error("{0}")]
    Rejected(RejectionReason),

    // === 券相关错误 ===
    #[error("券不存在: {0}")]
    VoucherNotFound(i64),

    #[error("券码已存在: {0}")]
    DuplicateCode(String),

    #[error("券码生成失败，已尝试 {attempts} 次")]
    CodeGenerationExhausted { attempts: u32 },

    #[error("未配置的券类型: {0}")]
    UnknownVoucherType(String),

    #[error("批量创建中断: 计划 {requested} 张, 已创建 {created} 张, 原因: {source}")]
    BatchIncomplete {
        requested: u32,
        created: usize,
        created_ids: Vec<i64>,
        #[source]
        source: Box<VoucherError>,
    },

    // === 活动相关错误 ===
    #[error("活动不存在: {0}")]
    CampaignNotFound(i64),

    #[error("活动名称已存在: {0}")]
    CampaignNameTaken(String),

    #[error("活动下仍有券，禁止删除: campaign_id={campaign_id}, vouchers={voucher_count}")]
    CampaignInUse {
        campaign_id: i64,
        voucher_count: i64,
    },

    // === 系统错误 ===
    #[error("存储冲突，请稍后重试")]
    StoreConflict,

    #[error("数据库错误: {0}")]
    Database(sqlx::Error),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 券码服务 Result 类型别名
pub type Result<T> = std::result::Result<T, VoucherError>;

/// PostgreSQL 错误码
pub(crate) mod pg_codes {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
}

/// 提取数据库错误码与约束名
pub(crate) fn db_error_parts(err: &sqlx::Error) -> Option<(String, Option<String>)> {
    let db_err = err.as_database_error()?;
    let code = db_err.code()?.into_owned();
    Some((code, db_err.constraint().map(str::to_string)))
}

impl From<sqlx::Error> for VoucherError {
    /// 并发类数据库错误统一归为存储冲突，其余保留原始错误
    fn from(err: sqlx::Error) -> Self {
        match db_error_parts(&err) {
            Some((code, _))
                if matches!(
                    code.as_str(),
                    pg_codes::UNIQUE_VIOLATION
                        | pg_codes::SERIALIZATION_FAILURE
                        | pg_codes::DEADLOCK_DETECTED
                        | pg_codes::LOCK_NOT_AVAILABLE
                ) =>
            {
                Self::StoreConflict
            }
            _ => Self::Database(err),
        }
    }
}

impl From<RejectionReason> for VoucherError {
    fn from(reason: RejectionReason) -> Self {
        Self::Rejected(reason)
    }
}

impl VoucherError {
    /// 取出拒绝原因
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }

    /// 是否为存储冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::StoreConflict)
    }

    /// 调用方是否值得重试
    ///
    /// 兑换内部已对存储冲突重试过一次，向外暴露的 StoreConflict 不再建议重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut) | Self::Database(sqlx::Error::Io(_))
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::StoreConflict
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.code(),
            Self::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            Self::DuplicateCode(_) => "DUPLICATE_CODE",
            Self::CodeGenerationExhausted { .. } => "CODE_GENERATION_EXHAUSTED",
            Self::UnknownVoucherType(_) => "UNKNOWN_VOUCHER_TYPE",
            Self::BatchIncomplete { .. } => "BATCH_INCOMPLETE",
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::CampaignNameTaken(_) => "CAMPAIGN_NAME_TAKEN",
            Self::CampaignInUse { .. } => "CAMPAIGN_IN_USE",
            Self::StoreConflict => "STORE_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
