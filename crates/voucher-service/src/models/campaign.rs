//! 活动实体定义

use serde::{Deserialize, Serialize};

/// 活动
///
/// 券的可选分组，名称唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
}

/// 待创建的活动
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub name: String,
    pub description: Option<String>,
}

impl NewCampaign {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 活动统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub campaign_id: i64,
    pub total: i64,
    pub used: i64,
    pub unused: i64,
    pub expired: i64,
}
