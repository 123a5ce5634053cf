use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::game_mode::{GameMode, Rank};
use crate::models::mods::APIMod;

/// 成绩 pp 的生命周期
///
/// `Unset` 只存在于内存中；落库时一定是其余状态之一。
/// `PendingRetry` 会被后台任务重新计算，成功后转为 `Computed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PpStatus {
    Unset,
    Computed,
    PendingRetry,
    ZeroForced,
    /// 未通过 / 谱面不计 pp / mod 组合不计 pp / 模式不受支持
    Ineligible,
}

impl PpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PpStatus::Unset => "unset",
            PpStatus::Computed => "computed",
            PpStatus::PendingRetry => "pending_retry",
            PpStatus::ZeroForced => "zero_forced",
            PpStatus::Ineligible => "ineligible",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "computed" => PpStatus::Computed,
            "pending_retry" => PpStatus::PendingRetry,
            "zero_forced" => PpStatus::ZeroForced,
            "ineligible" => PpStatus::Ineligible,
            _ => PpStatus::Unset,
        }
    }
}

/// 判定计数，字段名与 lazer 的 HitResult 对应
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct HitStatistics {
    pub great: u32,
    pub ok: u32,
    pub meh: u32,
    pub miss: u32,
    pub perfect: u32,
    pub good: u32,
    pub large_tick_hit: u32,
    pub large_tick_miss: u32,
    pub small_tick_hit: u32,
    pub small_tick_miss: u32,
    pub slider_tail_hit: u32,
}

impl HitStatistics {
    /// 单项判定计数的最大值
    pub fn max_count(&self) -> u32 {
        [
            self.great,
            self.ok,
            self.meh,
            self.miss,
            self.perfect,
            self.good,
            self.large_tick_hit,
            self.large_tick_miss,
            self.small_tick_hit,
            self.small_tick_miss,
            self.slider_tail_hit,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// 计入 total_hits 的判定数
    pub fn total_hits(&self) -> i64 {
        [
            self.great,
            self.ok,
            self.meh,
            self.perfect,
            self.good,
            self.large_tick_hit,
            self.large_tick_miss,
            self.small_tick_hit,
        ]
        .iter()
        .map(|&n| n as i64)
        .sum()
    }

    /// 折算为 300/100/50/miss 四档
    pub fn legacy_counts(&self, mode: GameMode) -> LegacyHitCounts {
        let mut counts = LegacyHitCounts {
            count_300: self.great as i64 + self.perfect as i64,
            count_100: self.ok as i64 + self.good as i64,
            count_50: self.meh as i64,
            count_miss: self.miss as i64,
        };
        if mode.to_base_ruleset() == GameMode::Fruits {
            counts.count_miss += self.large_tick_miss as i64;
            counts.count_50 += self.small_tick_hit as i64;
            counts.count_100 += self.large_tick_hit as i64;
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyHitCounts {
    pub count_300: i64,
    pub count_100: i64,
    pub count_50: i64,
    pub count_miss: i64,
}

/// 一次游玩结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Score {
    pub id: i64,
    pub user_id: i64,
    pub beatmap_id: i64,
    pub map_md5: String,
    pub gamemode: GameMode,
    pub mods: Vec<APIMod>,
    /// 0..1
    pub accuracy: f64,
    pub max_combo: i64,
    pub rank: Rank,
    pub passed: bool,
    /// 提交时是否满足 ranked 资格
    pub ranked: bool,
    /// 通过且谱面有排行榜
    pub leaderboard_eligible: bool,
    pub pp: f64,
    pub pp_status: PpStatus,
    pub total_score: i64,
    pub statistics: HitStatistics,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Score {
    pub fn mod_acronyms(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.acronym.as_str()).collect()
    }
}

pub(crate) const SCORE_COLUMNS: &str = "id, user_id, beatmap_id, map_md5, gamemode, mods, accuracy, max_combo, \
     rank, passed, ranked, leaderboard_eligible, pp, pp_status, total_score, n300, n100, n50, nmiss, ngeki, nkatu, \
     large_tick_hit, large_tick_miss, small_tick_hit, small_tick_miss, slider_tail_hit, \
     started_at, ended_at";

#[derive(Debug, FromRow)]
pub(crate) struct DbScore {
    pub id: i64,
    pub user_id: i64,
    pub beatmap_id: i64,
    pub map_md5: String,
    pub gamemode: String,
    pub mods: String,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rank: String,
    pub passed: bool,
    pub ranked: bool,
    pub leaderboard_eligible: bool,
    pub pp: f64,
    pub pp_status: String,
    pub total_score: i64,
    pub n300: i64,
    pub n100: i64,
    pub n50: i64,
    pub nmiss: i64,
    pub ngeki: i64,
    pub nkatu: i64,
    pub large_tick_hit: i64,
    pub large_tick_miss: i64,
    pub small_tick_hit: i64,
    pub small_tick_miss: i64,
    pub slider_tail_hit: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl From<DbScore> for Score {
    fn from(row: DbScore) -> Self {
        let count = |n: i64| n.max(0) as u32;
        Self {
            id: row.id,
            user_id: row.user_id,
            beatmap_id: row.beatmap_id,
            map_md5: row.map_md5,
            gamemode: row.gamemode.parse().unwrap_or(GameMode::Osu),
            mods: serde_json::from_str(&row.mods).unwrap_or_default(),
            accuracy: row.accuracy,
            max_combo: row.max_combo,
            rank: row.rank.parse().unwrap_or(Rank::F),
            passed: row.passed,
            ranked: row.ranked,
            leaderboard_eligible: row.leaderboard_eligible,
            pp: row.pp,
            pp_status: PpStatus::parse(&row.pp_status),
            total_score: row.total_score,
            statistics: HitStatistics {
                great: count(row.n300),
                ok: count(row.n100),
                meh: count(row.n50),
                miss: count(row.nmiss),
                perfect: count(row.ngeki),
                good: count(row.nkatu),
                large_tick_hit: count(row.large_tick_hit),
                large_tick_miss: count(row.large_tick_miss),
                small_tick_hit: count(row.small_tick_hit),
                small_tick_miss: count(row.small_tick_miss),
                slider_tail_hit: count(row.slider_tail_hit),
            },
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

/// 客户端提交的成绩
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoreSubmission {
    pub user_id: i64,
    pub ruleset_id: i64,
    #[serde(default)]
    pub beatmap_checksum: Option<String>,
    #[serde(default)]
    pub mods: Vec<APIMod>,
    #[serde(default)]
    pub statistics: HitStatistics,
    pub accuracy: f64,
    pub max_combo: i64,
    pub rank: Rank,
    pub passed: bool,
    pub total_score: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_hits_skips_misses() {
        let stats = HitStatistics {
            great: 100,
            ok: 10,
            meh: 1,
            miss: 5,
            large_tick_miss: 2,
            small_tick_miss: 7,
            ..Default::default()
        };
        assert_eq!(stats.total_hits(), 113);
    }

    #[test]
    fn catch_ticks_fold_into_legacy_counts() {
        let stats = HitStatistics {
            great: 50,
            large_tick_hit: 20,
            large_tick_miss: 3,
            small_tick_hit: 40,
            miss: 1,
            ..Default::default()
        };
        let catch = stats.legacy_counts(GameMode::FruitsRx);
        assert_eq!(catch.count_100, 20);
        assert_eq!(catch.count_50, 40);
        assert_eq!(catch.count_miss, 4);

        let osu = stats.legacy_counts(GameMode::Osu);
        assert_eq!(osu.count_300, 50);
        assert_eq!(osu.count_100, 0);
        assert_eq!(osu.count_miss, 1);
    }

    #[test]
    fn legacy_counts_widen_before_adding() {
        let stats = HitStatistics {
            great: u32::MAX,
            perfect: u32::MAX,
            ok: u32::MAX,
            good: 1,
            ..Default::default()
        };
        let counts = stats.legacy_counts(GameMode::Mania);
        assert_eq!(counts.count_300, 2 * u32::MAX as i64);
        assert_eq!(counts.count_100, u32::MAX as i64 + 1);
        assert_eq!(stats.max_count(), u32::MAX);
    }

    #[test]
    fn pp_status_round_trips_through_text() {
        for status in [PpStatus::Computed, PpStatus::PendingRetry, PpStatus::ZeroForced, PpStatus::Ineligible] {
            assert_eq!(PpStatus::parse(status.as_str()), status);
        }
    }
}
