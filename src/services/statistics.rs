use sqlx::{SqliteConnection, SqlitePool};

use crate::models::best_score::{TotalScoreBestScore, WeightedBestScore};
use crate::models::game_mode::{GameMode, Rank};
use crate::models::mods::speed_rate;
use crate::models::score::Score;
use crate::models::statistics::{DbUserStatistics, UserStatistics, STATISTICS_COLUMNS};
use crate::services::ledger::{self, BestByScoreUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::level::level_from_score;
use crate::utils::pp_utils::{calculate_user_pp, weight};

/// 计算总 pp 时读取的 BP 上限
const BEST_SCORES_LIMIT: i64 = 1000;

/// 有效游玩时长（秒）：谱面时长按变速折算，不超过实际经过的时间
pub fn play_length(score: &Score, beatmap_length: i64) -> i64 {
    let rate = speed_rate(&score.mods);
    let rate = if rate > 0.0 { rate } else { 1.0 };
    let by_map = beatmap_length as f64 / rate;
    let elapsed = (score.ended_at - score.started_at).num_seconds() as f64;
    by_map.min(elapsed).max(0.0) as i64
}

pub async fn load_statistics(conn: &mut SqliteConnection, user_id: i64, mode: GameMode) -> AppResult<UserStatistics> {
    let row = sqlx::query_as::<_, DbUserStatistics>(&format!(
        "SELECT {STATISTICS_COLUMNS} FROM user_statistics WHERE user_id = ? AND mode = ?"
    ))
    .bind(user_id)
    .bind(mode.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询玩家统计失败: {e}")))?;

    Ok(row
        .map(UserStatistics::from)
        .unwrap_or_else(|| UserStatistics::new(user_id, mode)))
}

pub async fn save_statistics(conn: &mut SqliteConnection, stats: &UserStatistics) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT OR REPLACE INTO user_statistics ({STATISTICS_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(stats.user_id)
    .bind(stats.mode.as_str())
    .bind(stats.count_300)
    .bind(stats.count_100)
    .bind(stats.count_50)
    .bind(stats.count_miss)
    .bind(stats.pp)
    .bind(stats.ranked_score)
    .bind(stats.hit_accuracy)
    .bind(stats.total_score)
    .bind(stats.total_hits)
    .bind(stats.maximum_combo)
    .bind(stats.play_count)
    .bind(stats.play_time)
    .bind(stats.grade_ss)
    .bind(stats.grade_ssh)
    .bind(stats.grade_s)
    .bind(stats.grade_sh)
    .bind(stats.grade_a)
    .bind(stats.level_current)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("写入玩家统计失败: {e}")))?;
    Ok(())
}

/// 总分为 0 的指针从未计入评级与 ranked 总分
fn counted(best: &TotalScoreBestScore) -> bool {
    best.total_score > 0
}

fn adjust_grade(stats: &mut UserStatistics, rank: Rank, by: i64) {
    if let Some(counter) = stats.grade_counter_mut(rank) {
        *counter = (*counter + by).max(0);
    }
}

/// 一次提交对统计的增量更新，返回是否需要重新汇总 pp
pub fn apply_submission(
    stats: &mut UserStatistics,
    score: &Score,
    beatmap_length: i64,
    best: &BestByScoreUpdate,
    pp_replaced: bool,
) -> bool {
    stats.play_count = stats.play_count.saturating_add(1);
    stats.play_time = stats.play_time.saturating_add(play_length(score, beatmap_length));
    stats.total_score = stats.total_score.saturating_add(score.total_score);
    stats.total_hits = stats.total_hits.saturating_add(score.statistics.total_hits());

    let counts = score.statistics.legacy_counts(score.gamemode);
    stats.count_300 = stats.count_300.saturating_add(counts.count_300);
    stats.count_100 = stats.count_100.saturating_add(counts.count_100);
    stats.count_50 = stats.count_50.saturating_add(counts.count_50);
    stats.count_miss = stats.count_miss.saturating_add(counts.count_miss);

    if score.passed && score.ranked && best.replaced && best.delta > 0 {
        adjust_grade(stats, score.rank, 1);
        if let Some(previous) = best.previous.as_ref().filter(|p| counted(p)) {
            adjust_grade(stats, previous.rank, -1);
        }
        stats.ranked_score = stats.ranked_score.saturating_add(best.delta);
        stats.level_current = level_from_score(stats.ranked_score);
        stats.maximum_combo = stats.maximum_combo.max(score.max_combo);
    }

    (score.passed && score.ranked) || pp_replaced
}

/// 删除最高总分指针后回退其贡献，`promoted` 为顶替上来的次佳成绩
pub fn revert_best_by_score(
    stats: &mut UserStatistics,
    removed: &TotalScoreBestScore,
    promoted: Option<&TotalScoreBestScore>,
) {
    stats.ranked_score = stats.ranked_score.saturating_sub(removed.total_score);
    if counted(removed) {
        adjust_grade(stats, removed.rank, -1);
    }
    if let Some(promoted) = promoted {
        stats.ranked_score = stats.ranked_score.saturating_add(promoted.total_score);
        if counted(promoted) {
            adjust_grade(stats, promoted.rank, 1);
        }
    }
    stats.ranked_score = stats.ranked_score.max(0);
    stats.level_current = level_from_score(stats.ranked_score);
}

/// 由完整的 BP 集合重新计算 pp 与准确率
pub async fn refresh_pp(conn: &mut SqliteConnection, stats: &mut UserStatistics) -> AppResult<()> {
    let best = ledger::list_best_by_pp(conn, stats.user_id, stats.mode, BEST_SCORES_LIMIT).await?;
    let entries: Vec<(f64, f64)> = best.iter().map(|b| (b.pp, b.acc)).collect();
    let (pp, accuracy) = calculate_user_pp(&entries);
    stats.pp = pp;
    stats.hit_accuracy = accuracy;
    log::debug!(
        "玩家 {} {} 模式 pp 重新汇总为 {pp:.2}，准确率 {accuracy:.2}",
        stats.user_id,
        stats.mode
    );
    Ok(())
}

/// 玩家统计的只读查询
#[derive(Clone)]
pub struct StatisticsService {
    pool: SqlitePool,
}

impl StatisticsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_statistics(&self, user_id: i64, mode: GameMode) -> AppResult<UserStatistics> {
        let mut conn = self.pool.acquire().await?;
        load_statistics(&mut conn, user_id, mode).await
    }

    /// BP 列表及各自的权重
    pub async fn best_pp_scores(&self, user_id: i64, mode: GameMode, limit: i64) -> AppResult<Vec<WeightedBestScore>> {
        let limit = limit.clamp(1, BEST_SCORES_LIMIT);
        let mut conn = self.pool.acquire().await?;
        let best = ledger::list_best_by_pp(&mut conn, user_id, mode, limit).await?;

        Ok(best
            .into_iter()
            .enumerate()
            .map(|(i, best)| {
                let w = weight(i);
                WeightedBestScore {
                    weighted_pp: best.pp * w,
                    weight: w,
                    best,
                }
            })
            .collect())
    }
}
