//! 成绩行与重算队列的持久化
//!
//! 所有函数都接收 `&mut SqliteConnection`，调用方可以传入事务或单独的连接。

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};

use crate::models::score::{DbScore, PpStatus, Score, SCORE_COLUMNS};
use crate::utils::error::{AppError, AppResult};

pub async fn insert_score(conn: &mut SqliteConnection, score: &Score) -> AppResult<i64> {
    let mods = serde_json::to_string(&score.mods)?;
    let stats = &score.statistics;

    let result = sqlx::query(
        "INSERT INTO scores (user_id, beatmap_id, map_md5, gamemode, mods, accuracy, max_combo, rank, passed,
            ranked, leaderboard_eligible, pp, pp_status, total_score, n300, n100, n50, nmiss, ngeki, nkatu,
            large_tick_hit, large_tick_miss, small_tick_hit, small_tick_miss, slider_tail_hit,
            started_at, ended_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(score.user_id)
    .bind(score.beatmap_id)
    .bind(&score.map_md5)
    .bind(score.gamemode.as_str())
    .bind(mods)
    .bind(score.accuracy)
    .bind(score.max_combo)
    .bind(score.rank.as_str())
    .bind(score.passed)
    .bind(score.ranked)
    .bind(score.leaderboard_eligible)
    .bind(score.pp)
    .bind(score.pp_status.as_str())
    .bind(score.total_score)
    .bind(stats.great as i64)
    .bind(stats.ok as i64)
    .bind(stats.meh as i64)
    .bind(stats.miss as i64)
    .bind(stats.perfect as i64)
    .bind(stats.good as i64)
    .bind(stats.large_tick_hit as i64)
    .bind(stats.large_tick_miss as i64)
    .bind(stats.small_tick_hit as i64)
    .bind(stats.small_tick_miss as i64)
    .bind(stats.slider_tail_hit as i64)
    .bind(score.started_at)
    .bind(score.ended_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("写入成绩失败: {e}")))?;

    Ok(result.last_insert_rowid())
}

pub async fn get_score(conn: &mut SqliteConnection, score_id: i64) -> AppResult<Option<Score>> {
    let row = sqlx::query_as::<_, DbScore>(&format!("SELECT {SCORE_COLUMNS} FROM scores WHERE id = ?"))
        .bind(score_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("查询成绩失败: {e}")))?;

    Ok(row.map(Score::from))
}

pub async fn update_score_pp(
    conn: &mut SqliteConnection,
    score_id: i64,
    pp: f64,
    status: PpStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE scores SET pp = ?, pp_status = ? WHERE id = ?")
        .bind(pp)
        .bind(status.as_str())
        .bind(score_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("更新成绩 pp 失败: {e}")))?;
    Ok(())
}

/// 删除成绩，排行指针与重算队列随外键级联删除
pub async fn delete_score_row(conn: &mut SqliteConnection, score_id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM scores WHERE id = ?")
        .bind(score_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("删除成绩失败: {e}")))?;
    Ok(result.rows_affected() > 0)
}

/// 某谱面上所有满足 ranked 资格的成绩
pub async fn ranked_scores_on_beatmap(conn: &mut SqliteConnection, beatmap_id: i64) -> AppResult<Vec<Score>> {
    let rows = sqlx::query_as::<_, DbScore>(&format!(
        "SELECT {SCORE_COLUMNS} FROM scores WHERE beatmap_id = ? AND ranked = 1 ORDER BY id"
    ))
    .bind(beatmap_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询谱面成绩失败: {e}")))?;

    Ok(rows.into_iter().map(Score::from).collect())
}

#[derive(Debug, Clone, FromRow)]
pub struct PendingRecalculation {
    pub score_id: i64,
    pub attempts: i64,
}

pub async fn enqueue_recalculate(conn: &mut SqliteConnection, score_id: i64, reason: &str) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO pp_recalculate_queue (score_id, attempts, last_error, queued_at)
         VALUES (?, 0, ?, ?)
         ON CONFLICT(score_id) DO UPDATE SET last_error = excluded.last_error",
    )
    .bind(score_id)
    .bind(reason)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("加入重算队列失败: {e}")))?;
    Ok(())
}

pub async fn dequeue_recalculate(conn: &mut SqliteConnection, score_id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM pp_recalculate_queue WHERE score_id = ?")
        .bind(score_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("移出重算队列失败: {e}")))?;
    Ok(())
}

/// 返回递增后的失败次数
pub async fn record_attempt(conn: &mut SqliteConnection, score_id: i64, error: &str) -> AppResult<i64> {
    let attempts: Option<i64> = sqlx::query_scalar(
        "UPDATE pp_recalculate_queue SET attempts = attempts + 1, last_error = ?
         WHERE score_id = ? RETURNING attempts",
    )
    .bind(error)
    .bind(score_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("更新重算次数失败: {e}")))?;
    Ok(attempts.unwrap_or(0))
}

pub async fn list_pending(conn: &mut SqliteConnection, limit: i64) -> AppResult<Vec<PendingRecalculation>> {
    sqlx::query_as::<_, PendingRecalculation>(
        "SELECT score_id, attempts FROM pp_recalculate_queue ORDER BY queued_at, score_id LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询重算队列失败: {e}")))
}
