//! 每 (玩家, 谱面, 模式) 的两个最佳成绩指针
//!
//! 调用方负责按玩家加锁并开启事务，这里的函数只做读改写。

use sqlx::SqliteConnection;

use crate::models::best_score::{BestScore, DbBestScore, DbTotalScoreBestScore, TotalScoreBestScore};
use crate::models::game_mode::GameMode;
use crate::models::mods::mod_to_save;
use crate::models::score::{DbScore, PpStatus, Score, SCORE_COLUMNS};
use crate::utils::error::{AppError, AppResult};

/// `update_best_by_score` 的结果
#[derive(Debug, Clone, Default)]
pub struct BestByScoreUpdate {
    pub delta: i64,
    /// 被替换掉的旧指针
    pub previous: Option<TotalScoreBestScore>,
    pub replaced: bool,
}

pub async fn get_best_by_score(
    conn: &mut SqliteConnection,
    user_id: i64,
    beatmap_id: i64,
    mode: GameMode,
) -> AppResult<Option<TotalScoreBestScore>> {
    let row = sqlx::query_as::<_, DbTotalScoreBestScore>(
        "SELECT user_id, beatmap_id, gamemode, score_id, total_score, mods, rank
         FROM total_score_best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?",
    )
    .bind(user_id)
    .bind(beatmap_id)
    .bind(mode.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询最高总分失败: {e}")))?;

    Ok(row.map(TotalScoreBestScore::from))
}

pub async fn get_best_by_pp(
    conn: &mut SqliteConnection,
    user_id: i64,
    beatmap_id: i64,
    mode: GameMode,
) -> AppResult<Option<BestScore>> {
    let row = sqlx::query_as::<_, DbBestScore>(
        "SELECT user_id, beatmap_id, gamemode, score_id, pp, acc
         FROM best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?",
    )
    .bind(user_id)
    .bind(beatmap_id)
    .bind(mode.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询 BP 失败: {e}")))?;

    Ok(row.map(BestScore::from))
}

/// 玩家在某模式下的全部 BP，按 pp 降序
pub async fn list_best_by_pp(
    conn: &mut SqliteConnection,
    user_id: i64,
    mode: GameMode,
    limit: i64,
) -> AppResult<Vec<BestScore>> {
    let rows = sqlx::query_as::<_, DbBestScore>(
        "SELECT user_id, beatmap_id, gamemode, score_id, pp, acc
         FROM best_scores WHERE user_id = ? AND gamemode = ?
         ORDER BY pp DESC, score_id ASC LIMIT ?",
    )
    .bind(user_id)
    .bind(mode.as_str())
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询 BP 列表失败: {e}")))?;

    Ok(rows.into_iter().map(BestScore::from).collect())
}

async fn write_best_by_score(conn: &mut SqliteConnection, score: &Score) -> AppResult<()> {
    sqlx::query("DELETE FROM total_score_best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?")
        .bind(score.user_id)
        .bind(score.beatmap_id)
        .bind(score.gamemode.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("删除旧最高总分失败: {e}")))?;

    sqlx::query(
        "INSERT INTO total_score_best_scores (score_id, user_id, beatmap_id, gamemode, total_score, mods, rank)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(score.id)
    .bind(score.user_id)
    .bind(score.beatmap_id)
    .bind(score.gamemode.as_str())
    .bind(score.total_score)
    .bind(serde_json::to_string(&mod_to_save(&score.mods))?)
    .bind(score.rank.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("写入最高总分失败: {e}")))?;

    Ok(())
}

async fn write_best_by_pp(conn: &mut SqliteConnection, score: &Score) -> AppResult<()> {
    sqlx::query("DELETE FROM best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?")
        .bind(score.user_id)
        .bind(score.beatmap_id)
        .bind(score.gamemode.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("删除旧 BP 失败: {e}")))?;

    sqlx::query(
        "INSERT INTO best_scores (score_id, user_id, beatmap_id, gamemode, pp, acc)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(score.id)
    .bind(score.user_id)
    .bind(score.beatmap_id)
    .bind(score.gamemode.as_str())
    .bind(score.pp)
    .bind(score.accuracy)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("写入 BP 失败: {e}")))?;

    Ok(())
}

/// 只有通过且满足 ranked 资格的成绩参与；返回总分增量与被替换的旧指针
pub async fn update_best_by_score(conn: &mut SqliteConnection, score: &Score) -> AppResult<BestByScoreUpdate> {
    if !(score.passed && score.ranked) {
        return Ok(BestByScoreUpdate::default());
    }

    let existing = get_best_by_score(conn, score.user_id, score.beatmap_id, score.gamemode).await?;
    let (delta, replace) = match &existing {
        // 同一条成绩已经计入过
        Some(best) if best.score_id == score.id => (0, false),
        Some(best) => (score.total_score - best.total_score, score.total_score > best.total_score),
        None => (score.total_score, true),
    };

    log::debug!(
        "成绩 {} 总分增量 {delta}，旧指针 {:?}",
        score.id,
        existing.as_ref().map(|b| b.score_id)
    );

    if replace {
        write_best_by_score(conn, score).await?;
        Ok(BestByScoreUpdate {
            delta,
            previous: existing,
            replaced: true,
        })
    } else {
        Ok(BestByScoreUpdate {
            delta,
            previous: None,
            replaced: false,
        })
    }
}

/// 只有 pp 已算出的成绩参与；返回是否替换了 BP
pub async fn update_best_by_pp(conn: &mut SqliteConnection, score: &Score) -> AppResult<bool> {
    if score.pp_status != PpStatus::Computed {
        return Ok(false);
    }

    let existing = get_best_by_pp(conn, score.user_id, score.beatmap_id, score.gamemode).await?;
    let replace = match &existing {
        Some(best) if best.score_id == score.id => (best.pp - score.pp).abs() > f64::EPSILON,
        Some(best) => score.pp > best.pp,
        None => true,
    };

    if replace {
        write_best_by_pp(conn, score).await?;
        log::debug!(
            "玩家 {} 谱面 {} BP 更新为成绩 {} ({:.2}pp)",
            score.user_id,
            score.beatmap_id,
            score.id,
            score.pp
        );
    }
    Ok(replace)
}

/// 重新选出该键下总分最高的成绩作为指针，返回新指针
pub async fn rebuild_best_by_score(
    conn: &mut SqliteConnection,
    user_id: i64,
    beatmap_id: i64,
    mode: GameMode,
) -> AppResult<Option<TotalScoreBestScore>> {
    let candidate = sqlx::query_as::<_, DbScore>(&format!(
        "SELECT {SCORE_COLUMNS} FROM scores
         WHERE user_id = ? AND beatmap_id = ? AND gamemode = ? AND passed = 1 AND ranked = 1
         ORDER BY total_score DESC, id ASC LIMIT 1"
    ))
    .bind(user_id)
    .bind(beatmap_id)
    .bind(mode.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询次高总分失败: {e}")))?;

    match candidate.map(Score::from) {
        Some(score) => {
            write_best_by_score(conn, &score).await?;
            get_best_by_score(conn, user_id, beatmap_id, mode).await
        }
        None => {
            sqlx::query("DELETE FROM total_score_best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?")
                .bind(user_id)
                .bind(beatmap_id)
                .bind(mode.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::DatabaseError(format!("删除最高总分失败: {e}")))?;
            Ok(None)
        }
    }
}

/// 重新选出该键下 pp 最高且已算出 pp 的成绩作为 BP
pub async fn rebuild_best_by_pp(
    conn: &mut SqliteConnection,
    user_id: i64,
    beatmap_id: i64,
    mode: GameMode,
) -> AppResult<Option<BestScore>> {
    let candidate = sqlx::query_as::<_, DbScore>(&format!(
        "SELECT {SCORE_COLUMNS} FROM scores
         WHERE user_id = ? AND beatmap_id = ? AND gamemode = ? AND pp_status = 'computed'
         ORDER BY pp DESC, id ASC LIMIT 1"
    ))
    .bind(user_id)
    .bind(beatmap_id)
    .bind(mode.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询次高 pp 失败: {e}")))?;

    match candidate.map(Score::from) {
        Some(score) => {
            write_best_by_pp(conn, &score).await?;
            get_best_by_pp(conn, user_id, beatmap_id, mode).await
        }
        None => {
            sqlx::query("DELETE FROM best_scores WHERE user_id = ? AND beatmap_id = ? AND gamemode = ?")
                .bind(user_id)
                .bind(beatmap_id)
                .bind(mode.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::DatabaseError(format!("删除 BP 失败: {e}")))?;
            Ok(None)
        }
    }
}

/// 剩余最高总分指针中的最大连击
pub async fn max_combo_of_best_scores(conn: &mut SqliteConnection, user_id: i64, mode: GameMode) -> AppResult<i64> {
    let combo: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(s.max_combo) FROM total_score_best_scores t
         JOIN scores s ON s.id = t.score_id
         WHERE t.user_id = ? AND t.gamemode = ?",
    )
    .bind(user_id)
    .bind(mode.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("查询最大连击失败: {e}")))?;

    Ok(combo.unwrap_or(0))
}
