use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::game_mode::{GameMode, Rank};

/// 玩家在某个模式下的汇总统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserStatistics {
    pub user_id: i64,
    pub mode: GameMode,
    pub count_300: i64,
    pub count_100: i64,
    pub count_50: i64,
    pub count_miss: i64,
    pub pp: f64,
    pub ranked_score: i64,
    /// 0..100
    pub hit_accuracy: f64,
    pub total_score: i64,
    pub total_hits: i64,
    pub maximum_combo: i64,
    pub play_count: i64,
    /// 秒
    pub play_time: i64,
    pub grade_ss: i64,
    pub grade_ssh: i64,
    pub grade_s: i64,
    pub grade_sh: i64,
    pub grade_a: i64,
    pub level_current: f64,
}

impl UserStatistics {
    pub fn new(user_id: i64, mode: GameMode) -> Self {
        Self {
            user_id,
            mode,
            count_300: 0,
            count_100: 0,
            count_50: 0,
            count_miss: 0,
            pp: 0.0,
            ranked_score: 0,
            hit_accuracy: 0.0,
            total_score: 0,
            total_hits: 0,
            maximum_combo: 0,
            play_count: 0,
            play_time: 0,
            grade_ss: 0,
            grade_ssh: 0,
            grade_s: 0,
            grade_sh: 0,
            grade_a: 0,
            level_current: 1.0,
        }
    }

    pub fn grade_counter_mut(&mut self, rank: Rank) -> Option<&mut i64> {
        match rank {
            Rank::X => Some(&mut self.grade_ss),
            Rank::XH => Some(&mut self.grade_ssh),
            Rank::S => Some(&mut self.grade_s),
            Rank::SH => Some(&mut self.grade_sh),
            Rank::A => Some(&mut self.grade_a),
            _ => None,
        }
    }
}

pub(crate) const STATISTICS_COLUMNS: &str = "user_id, mode, count_300, count_100, count_50, count_miss, pp, \
     ranked_score, hit_accuracy, total_score, total_hits, maximum_combo, play_count, play_time, \
     grade_ss, grade_ssh, grade_s, grade_sh, grade_a, level_current";

#[derive(Debug, FromRow)]
pub(crate) struct DbUserStatistics {
    pub user_id: i64,
    pub mode: String,
    pub count_300: i64,
    pub count_100: i64,
    pub count_50: i64,
    pub count_miss: i64,
    pub pp: f64,
    pub ranked_score: i64,
    pub hit_accuracy: f64,
    pub total_score: i64,
    pub total_hits: i64,
    pub maximum_combo: i64,
    pub play_count: i64,
    pub play_time: i64,
    pub grade_ss: i64,
    pub grade_ssh: i64,
    pub grade_s: i64,
    pub grade_sh: i64,
    pub grade_a: i64,
    pub level_current: f64,
}

impl From<DbUserStatistics> for UserStatistics {
    fn from(row: DbUserStatistics) -> Self {
        Self {
            user_id: row.user_id,
            mode: row.mode.parse().unwrap_or(GameMode::Osu),
            count_300: row.count_300,
            count_100: row.count_100,
            count_50: row.count_50,
            count_miss: row.count_miss,
            pp: row.pp,
            ranked_score: row.ranked_score,
            hit_accuracy: row.hit_accuracy,
            total_score: row.total_score,
            total_hits: row.total_hits,
            maximum_combo: row.maximum_combo,
            play_count: row.play_count,
            play_time: row.play_time,
            grade_ss: row.grade_ss,
            grade_ssh: row.grade_ssh,
            grade_s: row.grade_s,
            grade_sh: row.grade_sh,
            grade_a: row.grade_a,
            level_current: row.level_current,
        }
    }
}
