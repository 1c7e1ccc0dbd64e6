//! 命令执行器
//!
//! 负责执行各 CLI 子命令的具体逻辑。
//! 将命令行参数转化为服务调用，并把结果以 JSON 打印到标准输出。

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use voucher_shared::config::VoucherConfig;
use voucher_shared::database::Database;

use crate::clock::{Clock, SystemClock};
use crate::error::VoucherError;
use crate::models::{NewCampaign, VoucherType};
use crate::notification::LogNotifier;
use crate::repository::{CampaignRepository, VoucherRepository};
use crate::service::{
    CampaignService, CreateVoucherRequest, CreateVouchersRequest, RedemptionService,
    VoucherIssuanceService, VoucherQueryService,
};

use super::commands::{CampaignCommands, Commands};

/// 命令执行器
///
/// 持有数据库连接与各服务实例，作为 CLI 与业务逻辑之间的桥梁
pub struct CommandRunner {
    db: Database,
    issuance: VoucherIssuanceService<VoucherRepository>,
    redemption: RedemptionService<VoucherRepository>,
    query: VoucherQueryService<VoucherRepository>,
    campaigns: CampaignService<CampaignRepository, VoucherRepository>,
}

impl CommandRunner {
    /// 基于数据库连接构建全部服务
    pub fn new(db: Database, config: &VoucherConfig) -> Result<Self> {
        let voucher_repo = Arc::new(VoucherRepository::new(db.pool().clone()));
        let campaign_repo = Arc::new(CampaignRepository::new(db.pool().clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let issuance = VoucherIssuanceService::new(voucher_repo.clone(), config)
            .context("券码生成配置无效")?;
        let redemption = RedemptionService::new(voucher_repo.clone(), clock.clone(), config)
            .with_notifier(Arc::new(LogNotifier));
        let query = VoucherQueryService::new(voucher_repo.clone(), clock.clone());
        let campaigns = CampaignService::new(campaign_repo, voucher_repo, clock);

        Ok(Self {
            db,
            issuance,
            redemption,
            query,
            campaigns,
        })
    }

    /// 执行子命令
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Migrate => {
                self.db.run_migrations().await?;
                print_json(&json!({ "migrated": true }))
            }
            Commands::Generate {
                quantity,
                voucher_type,
                value,
                valid_until,
                prefix,
                campaign,
                segmented,
            } => {
                let mut request =
                    CreateVouchersRequest::new(quantity, voucher_type, value).with_prefix(prefix);
                if let Some(segmented) = segmented {
                    request = request.with_segmented(segmented);
                }
                if let Some(valid_until) = valid_until {
                    request = request.with_valid_until(valid_until);
                }
                if let Some(campaign_id) = campaign {
                    request = request.with_campaign(campaign_id);
                }

                let vouchers = self.issuance.create_vouchers(request).await?;
                info!(count = vouchers.len(), "批量生成完成");
                print_json(&vouchers)
            }
            Commands::Create {
                voucher_type,
                value,
                users,
                user_limit,
                valid_until,
                prefix,
                campaign,
                code,
                segmented,
            } => {
                let mut request = CreateVoucherRequest::new(voucher_type, value)
                    .with_users(users)
                    .with_user_limit(user_limit)
                    .with_prefix(prefix);
                if let Some(segmented) = segmented {
                    request = request.with_segmented(segmented);
                }
                if let Some(valid_until) = valid_until {
                    request = request.with_valid_until(valid_until);
                }
                if let Some(campaign_id) = campaign {
                    request = request.with_campaign(campaign_id);
                }
                if let Some(code) = code {
                    request = request.with_code(code);
                }

                let voucher = self.issuance.create_voucher(request).await?;
                print_json(&voucher)
            }
            Commands::Validate {
                code,
                user,
                allowed_types,
            } => {
                let allowed = to_allowed_types(allowed_types);
                let result = self
                    .redemption
                    .eligibility()
                    .validate(&code, user.as_deref(), allowed.as_deref())
                    .await;

                match result {
                    Ok(voucher) => print_json(&json!({ "valid": true, "voucher": voucher })),
                    Err(VoucherError::Rejected(reason)) => print_json(&json!({
                        "valid": false,
                        "reason": reason,
                        "message": reason.message(),
                    })),
                    Err(e) => Err(e.into()),
                }
            }
            Commands::Redeem {
                code,
                user,
                allowed_types,
            } => {
                let allowed = to_allowed_types(allowed_types);
                let (voucher, redemption) = self
                    .redemption
                    .validate_and_redeem(&code, user.as_deref(), allowed.as_deref())
                    .await?;
                print_json(&json!({ "voucher": voucher, "redemption": redemption }))
            }
            Commands::Status { code } => {
                let status = self.query.status(&code).await?;
                print_json(&status)
            }
            Commands::List { filter, campaign } => {
                let vouchers = self.query.list_vouchers(filter.into(), campaign).await?;
                print_json(&vouchers)
            }
            Commands::Campaign { command } => self.run_campaign(command).await,
        }
    }

    async fn run_campaign(&self, command: CampaignCommands) -> Result<()> {
        match command {
            CampaignCommands::Create { name, description } => {
                let mut campaign = NewCampaign::new(name);
                if let Some(description) = description {
                    campaign = campaign.with_description(description);
                }
                let created = self.campaigns.create_campaign(campaign).await?;
                print_json(&created)
            }
            CampaignCommands::List => {
                let campaigns = self.campaigns.list_campaigns().await?;
                print_json(&campaigns)
            }
            CampaignCommands::Delete { id } => {
                self.campaigns.delete_campaign(id).await?;
                print_json(&json!({ "deleted": id }))
            }
            CampaignCommands::Reassign { from, to } => {
                let moved = self.campaigns.reassign_vouchers(from, to).await?;
                print_json(&json!({ "from": from, "to": to, "moved": moved }))
            }
            CampaignCommands::Stats { id } => {
                let stats = self.campaigns.campaign_stats(id).await?;
                print_json(&stats)
            }
        }
    }
}

/// 空列表表示不限类型
fn to_allowed_types(types: Vec<String>) -> Option<Vec<VoucherType>> {
    if types.is_empty() {
        None
    } else {
        Some(types.into_iter().map(VoucherType::from).collect())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("序列化输出失败")?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_allowed_types_means_unrestricted() {
        assert!(to_allowed_types(vec![]).is_none());

        let allowed = to_allowed_types(vec!["monetary".to_string()]).unwrap();
        assert_eq!(allowed, vec![VoucherType::new("monetary")]);
    }
}
