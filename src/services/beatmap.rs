use async_trait::async_trait;
use md5::{Digest, Md5};
use moka::future::Cache;
use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::beatmap::{Beatmap, DbBeatmap, MapContent};
use crate::utils::error::{AppError, AppResult};

/// 谱面元数据读取
#[derive(Clone)]
pub struct BeatmapService {
    pool: SqlitePool,
}

impl BeatmapService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_beatmap(&self, beatmap_id: i64) -> AppResult<Option<Beatmap>> {
        let row = sqlx::query_as::<_, DbBeatmap>(
            "SELECT id, checksum, status, mode, total_length, max_combo FROM beatmaps WHERE id = ?",
        )
        .bind(beatmap_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("查询谱面失败: {e}")))?;

        Ok(row.map(Beatmap::from))
    }

    /// 谱面同步任务写入元数据时使用
    pub async fn upsert_beatmap(&self, beatmap: &Beatmap) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO beatmaps (id, checksum, status, mode, total_length, max_combo)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                checksum = excluded.checksum,
                status = excluded.status,
                mode = excluded.mode,
                total_length = excluded.total_length,
                max_combo = excluded.max_combo",
        )
        .bind(beatmap.id)
        .bind(&beatmap.checksum)
        .bind(beatmap.status.as_i64())
        .bind(beatmap.mode.as_str())
        .bind(beatmap.total_length)
        .bind(beatmap.max_combo)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("写入谱面失败: {e}")))?;

        Ok(())
    }
}

/// 谱面原始内容来源
#[async_trait]
pub trait MapContentStore: Send + Sync {
    async fn get_or_fetch(&self, beatmap_id: i64) -> AppResult<MapContent>;
}

pub fn checksum(raw: &str) -> String {
    hex::encode(Md5::digest(raw.as_bytes()))
}

/// 带 TTL 缓存的镜像下载器
pub struct BeatmapRawFetcher {
    client: Client,
    mirrors: Vec<String>,
    fetch_timeout: Duration,
    cache: Cache<i64, MapContent>,
}

impl BeatmapRawFetcher {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            mirrors: config.beatmap_mirrors.clone(),
            fetch_timeout: config.fetch_timeout(),
            // 谱面文件体积小，缓存 2000 张
            cache: Cache::builder()
                .max_capacity(2000)
                .time_to_live(config.beatmap_cache_ttl())
                .build(),
        }
    }

    async fn fetch_from_mirror(&self, url: &str) -> AppResult<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ContentFetch(format!("{url} 返回 HTTP {}", response.status())));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(AppError::ContentFetch(format!("{url} 返回空内容")));
        }
        Ok(body)
    }

    async fn fetch_upstream(&self, beatmap_id: i64) -> AppResult<MapContent> {
        let mut timed_out = false;
        for template in &self.mirrors {
            let url = template
                .replace("{beatmap_id}", &beatmap_id.to_string())
                .replace("{id}", &beatmap_id.to_string());

            match tokio::time::timeout(self.fetch_timeout, self.fetch_from_mirror(&url)).await {
                Ok(Ok(raw)) => {
                    log::debug!("从 {url} 获取谱面 {beatmap_id} 成功");
                    let checksum = checksum(&raw);
                    return Ok(MapContent {
                        beatmap_id,
                        raw: Arc::from(raw),
                        checksum,
                    });
                }
                Ok(Err(e)) => log::warn!("从 {url} 获取谱面 {beatmap_id} 失败: {e}"),
                Err(_) => {
                    timed_out = true;
                    log::warn!("从 {url} 获取谱面 {beatmap_id} 超时");
                }
            }
        }

        if timed_out {
            Err(AppError::Timeout(format!("获取谱面 {beatmap_id} 超时")))
        } else {
            Err(AppError::ContentFetch(format!("所有镜像都无法提供谱面 {beatmap_id}")))
        }
    }
}

#[async_trait]
impl MapContentStore for BeatmapRawFetcher {
    async fn get_or_fetch(&self, beatmap_id: i64) -> AppResult<MapContent> {
        if let Some(cached) = self.cache.get(&beatmap_id).await {
            log::debug!("谱面 {beatmap_id} 内容缓存命中");
            return Ok(cached);
        }
        // 同一谱面的并发请求只会下载一次
        let content = self
            .cache
            .try_get_with(beatmap_id, self.fetch_upstream(beatmap_id))
            .await?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::beatmap::BeatmapRankStatus;
    use crate::models::game_mode::GameMode;
    use crate::utils::db::memory_pool;

    #[tokio::test]
    async fn upsert_then_read_beatmap() {
        let pool = memory_pool().await;
        let service = BeatmapService::new(pool);
        assert!(service.get_beatmap(1).await.unwrap().is_none());

        let mut beatmap = Beatmap {
            id: 1,
            checksum: "abc".into(),
            status: BeatmapRankStatus::Pending,
            mode: GameMode::Taiko,
            total_length: 90,
            max_combo: 400,
        };
        service.upsert_beatmap(&beatmap).await.unwrap();
        beatmap.status = BeatmapRankStatus::Ranked;
        service.upsert_beatmap(&beatmap).await.unwrap();

        let stored = service.get_beatmap(1).await.unwrap().unwrap();
        assert_eq!(stored.status, BeatmapRankStatus::Ranked);
        assert_eq!(stored.mode, GameMode::Taiko);
        assert_eq!(stored.total_length, 90);
    }

    #[test]
    fn checksum_is_md5_hex() {
        assert_eq!(checksum(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn unreachable_mirrors_report_fetch_error() {
        let config = AppConfig {
            beatmap_mirrors: vec!["http://127.0.0.1:9/osu/{beatmap_id}".into()],
            fetch_timeout_secs: 2,
            ..AppConfig::default()
        };
        let fetcher = BeatmapRawFetcher::new(Client::new(), &config);
        let err = fetcher.get_or_fetch(75).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
