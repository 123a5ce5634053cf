use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::game_mode::GameMode;

/// 谱面上架状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BeatmapRankStatus {
    Graveyard,
    Wip,
    Pending,
    Ranked,
    Approved,
    Qualified,
    Loved,
}

impl BeatmapRankStatus {
    pub fn from_i64(v: i64) -> Self {
        match v {
            -2 => Self::Graveyard,
            -1 => Self::Wip,
            1 => Self::Ranked,
            2 => Self::Approved,
            3 => Self::Qualified,
            4 => Self::Loved,
            _ => Self::Pending,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Graveyard => -2,
            Self::Wip => -1,
            Self::Pending => 0,
            Self::Ranked => 1,
            Self::Approved => 2,
            Self::Qualified => 3,
            Self::Loved => 4,
        }
    }

    pub fn has_pp(&self) -> bool {
        matches!(self, Self::Ranked | Self::Approved)
    }

    pub fn has_leaderboard(&self) -> bool {
        matches!(self, Self::Ranked | Self::Approved | Self::Qualified | Self::Loved)
    }
}

/// 谱面元数据（由外部同步写入，此处只读）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Beatmap {
    #[serde(default)]
    pub id: i64,
    pub checksum: String,
    pub status: BeatmapRankStatus,
    pub mode: GameMode,
    /// 谱面时长，秒
    pub total_length: i64,
    pub max_combo: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct DbBeatmap {
    pub id: i64,
    pub checksum: String,
    pub status: i64,
    pub mode: String,
    pub total_length: i64,
    pub max_combo: i64,
}

impl From<DbBeatmap> for Beatmap {
    fn from(row: DbBeatmap) -> Self {
        Self {
            id: row.id,
            checksum: row.checksum,
            status: BeatmapRankStatus::from_i64(row.status),
            mode: row.mode.parse().unwrap_or(GameMode::Osu),
            total_length: row.total_length,
            max_combo: row.max_combo,
        }
    }
}

/// 被封禁（pp 强制为 0）的谱面
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BannedBeatmap {
    pub beatmap_id: i64,
    pub reason: Option<String>,
    /// 已有成绩是否已清零
    pub pp_cleared: bool,
    pub banned_at: chrono::DateTime<chrono::Utc>,
}

/// 谱面原始内容 + md5
#[derive(Debug, Clone)]
pub struct MapContent {
    pub beatmap_id: i64,
    pub raw: std::sync::Arc<str>,
    pub checksum: String,
}
