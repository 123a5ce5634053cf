use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::mods::APIMod;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteScoreQuery {
    /// 发起删除的玩家
    pub user_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BestScoresQuery {
    pub limit: Option<i64>,
}

/// 难度查询；`ruleset` 为空时按谱面原生模式计算
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DifficultyRequest {
    #[serde(default)]
    pub ruleset: Option<String>,
    #[serde(default)]
    pub mods: Vec<APIMod>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BanRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BanChangeResult {
    pub beatmap_id: i64,
    pub banned: bool,
    /// 重算的成绩数
    pub affected_scores: usize,
}
