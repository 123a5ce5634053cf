use chrono::Utc;
use moka::future::Cache;
use sqlx::{SqliteConnection, SqlitePool};
use std::time::Duration;

use crate::models::beatmap::BannedBeatmap;
use crate::utils::error::{AppError, AppResult};

/// 谱面封禁表
///
/// 只缓存"已封禁"的结果；未封禁的查询每次都落到数据库，解封时清掉对应缓存。
#[derive(Clone)]
pub struct BanRegistry {
    pool: SqlitePool,
    banned_cache: Cache<i64, ()>,
}

impl BanRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            banned_cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(Duration::from_secs(60 * 60))
                .build(),
        }
    }

    pub async fn is_banned(&self, beatmap_id: i64) -> AppResult<bool> {
        if self.banned_cache.contains_key(&beatmap_id) {
            return Ok(true);
        }

        let mut conn = self.pool.acquire().await?;
        self.is_banned_in(&mut conn, beatmap_id).await
    }

    /// 在调用方的连接或事务上直接查表，不读缓存
    pub async fn is_banned_in(&self, conn: &mut SqliteConnection, beatmap_id: i64) -> AppResult<bool> {
        let banned: Option<i64> =
            sqlx::query_scalar("SELECT beatmap_id FROM banned_beatmaps WHERE beatmap_id = ?")
                .bind(beatmap_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| AppError::DatabaseError(format!("查询谱面封禁状态失败: {e}")))?;

        if banned.is_some() {
            self.banned_cache.insert(beatmap_id, ()).await;
        }
        Ok(banned.is_some())
    }

    /// 封禁谱面，返回是否为新封禁；重复封禁是无害的
    pub async fn add(&self, beatmap_id: i64, reason: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO banned_beatmaps (beatmap_id, reason, pp_cleared, banned_at)
             VALUES (?, ?, 0, ?)",
        )
        .bind(beatmap_id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("封禁谱面失败: {e}")))?;

        self.banned_cache.insert(beatmap_id, ()).await;

        let inserted = result.rows_affected() > 0;
        if inserted {
            log::warn!("谱面 {beatmap_id} 已封禁: {reason}");
        }
        Ok(inserted)
    }

    pub async fn remove(&self, beatmap_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM banned_beatmaps WHERE beatmap_id = ?")
            .bind(beatmap_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("解封谱面失败: {e}")))?;

        self.banned_cache.invalidate(&beatmap_id).await;

        let removed = result.rows_affected() > 0;
        if removed {
            log::info!("谱面 {beatmap_id} 已解封");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> AppResult<Vec<BannedBeatmap>> {
        sqlx::query_as::<_, BannedBeatmap>(
            "SELECT beatmap_id, reason, pp_cleared, banned_at FROM banned_beatmaps ORDER BY banned_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("查询封禁列表失败: {e}")))
    }

    /// 已封禁但成绩尚未清零的谱面
    pub async fn list_uncleared(&self) -> AppResult<Vec<i64>> {
        sqlx::query_scalar("SELECT beatmap_id FROM banned_beatmaps WHERE pp_cleared = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("查询待清理封禁谱面失败: {e}")))
    }

    pub async fn mark_cleared(&self, beatmap_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE banned_beatmaps SET pp_cleared = 1 WHERE beatmap_id = ?")
            .bind(beatmap_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("更新封禁状态失败: {e}")))?;
        Ok(())
    }
}
