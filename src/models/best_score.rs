use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::game_mode::{GameMode, Rank};

/// pp 最高的成绩指针，每 (玩家, 谱面, 模式) 一条
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BestScore {
    pub user_id: i64,
    pub beatmap_id: i64,
    pub gamemode: GameMode,
    pub score_id: i64,
    pub pp: f64,
    /// 0..1
    pub acc: f64,
}

#[derive(Debug, FromRow)]
pub(crate) struct DbBestScore {
    pub user_id: i64,
    pub beatmap_id: i64,
    pub gamemode: String,
    pub score_id: i64,
    pub pp: f64,
    pub acc: f64,
}

impl From<DbBestScore> for BestScore {
    fn from(row: DbBestScore) -> Self {
        Self {
            user_id: row.user_id,
            beatmap_id: row.beatmap_id,
            gamemode: row.gamemode.parse().unwrap_or(GameMode::Osu),
            score_id: row.score_id,
            pp: row.pp,
            acc: row.acc,
        }
    }
}

/// 总分最高的成绩指针，冗余保存总分 / mods / 评级以便计算增量
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TotalScoreBestScore {
    pub user_id: i64,
    pub beatmap_id: i64,
    pub gamemode: GameMode,
    pub score_id: i64,
    pub total_score: i64,
    pub mods: Vec<String>,
    pub rank: Rank,
}

#[derive(Debug, FromRow)]
pub(crate) struct DbTotalScoreBestScore {
    pub user_id: i64,
    pub beatmap_id: i64,
    pub gamemode: String,
    pub score_id: i64,
    pub total_score: i64,
    pub mods: String,
    pub rank: String,
}

impl From<DbTotalScoreBestScore> for TotalScoreBestScore {
    fn from(row: DbTotalScoreBestScore) -> Self {
        Self {
            user_id: row.user_id,
            beatmap_id: row.beatmap_id,
            gamemode: row.gamemode.parse().unwrap_or(GameMode::Osu),
            score_id: row.score_id,
            total_score: row.total_score,
            mods: serde_json::from_str(&row.mods).unwrap_or_default(),
            rank: row.rank.parse().unwrap_or(Rank::F),
        }
    }
}

/// 带权重的 BP 条目
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeightedBestScore {
    #[serde(flatten)]
    pub best: BestScore,
    pub weight: f64,
    pub weighted_pp: f64,
}
