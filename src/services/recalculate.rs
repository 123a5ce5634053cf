//! 待重算成绩与封禁变更后的 pp 重算

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::models::game_mode::GameMode;
use crate::models::score::{PpStatus, Score};
use crate::services::pp_gate::PpCacheGate;
use crate::services::score_submission::{evaluate_pp, recheck_ban, PpResolution, UserModeLocks};
use crate::services::{ledger, score_store, statistics};
use crate::utils::error::{AppError, AppResult};

/// 单条成绩最多重试的次数，超过后移出队列，状态保持待重算
const MAX_ATTEMPTS: i64 = 5;
const BATCH_SIZE: i64 = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RecalculateSummary {
    pub processed: usize,
    pub computed: usize,
    pub zeroed: usize,
    pub still_pending: usize,
    pub dropped: usize,
}

pub struct RecalculateService {
    pool: SqlitePool,
    gate: Arc<PpCacheGate>,
    locks: Arc<UserModeLocks>,
}

impl RecalculateService {
    pub fn new(pool: SqlitePool, gate: Arc<PpCacheGate>, locks: Arc<UserModeLocks>) -> Self {
        Self { pool, gate, locks }
    }

    /// 重算队列中的成绩，成功后更新 BP 与玩家统计
    pub async fn recompute_pending_results(&self) -> AppResult<RecalculateSummary> {
        let pending = {
            let mut conn = self.pool.acquire().await?;
            score_store::list_pending(&mut conn, BATCH_SIZE).await?
        };

        let mut summary = RecalculateSummary::default();
        for item in pending {
            let score = {
                let mut conn = self.pool.acquire().await?;
                score_store::get_score(&mut conn, item.score_id).await?
            };
            let Some(score) = score else {
                continue;
            };
            summary.processed += 1;

            let resolution = evaluate_pp(&self.gate, &score).await?;

            let _guard = self.locks.lock((score.user_id, score.gamemode)).await;
            let mut tx = self.pool.begin().await?;

            if let Some(reason) = &resolution.retry_reason {
                let attempts = score_store::record_attempt(&mut tx, score.id, reason).await?;
                if attempts >= MAX_ATTEMPTS {
                    score_store::dequeue_recalculate(&mut tx, score.id).await?;
                    log::warn!("成绩 {} 重算 {attempts} 次仍失败，移出队列: {reason}", score.id);
                    summary.dropped += 1;
                } else {
                    summary.still_pending += 1;
                }
                tx.commit().await?;
                continue;
            }

            score_store::dequeue_recalculate(&mut tx, score.id).await?;
            let resolution = recheck_ban(&self.gate, &mut tx, score.beatmap_id, resolution).await?;
            score_store::update_score_pp(&mut tx, score.id, resolution.pp, resolution.status).await?;

            let updated = Score {
                pp: resolution.pp,
                pp_status: resolution.status,
                ..score
            };
            if ledger::update_best_by_pp(&mut tx, &updated).await? {
                let mut stats = statistics::load_statistics(&mut tx, updated.user_id, updated.gamemode).await?;
                statistics::refresh_pp(&mut tx, &mut stats).await?;
                statistics::save_statistics(&mut tx, &stats).await?;
            }
            tx.commit().await?;

            match resolution.status {
                PpStatus::Computed => summary.computed += 1,
                _ => summary.zeroed += 1,
            }
            log::info!(
                "成绩 {} 重算完成: pp={:.2} ({})",
                updated.id,
                updated.pp,
                updated.pp_status.as_str()
            );
        }

        Ok(summary)
    }

    /// 谱面封禁状态变化后重算其上所有 ranked 成绩，返回受影响的成绩数
    pub async fn recompute_for_ban_change(&self, beatmap_id: i64) -> AppResult<usize> {
        let banned = self.gate.bans().is_banned(beatmap_id).await?;
        let scores = {
            let mut conn = self.pool.acquire().await?;
            score_store::ranked_scores_on_beatmap(&mut conn, beatmap_id).await?
        };

        // 先在锁外完成计算
        let mut groups: HashMap<(i64, GameMode), Vec<(Score, PpResolution)>> = HashMap::new();
        for score in scores {
            let resolution = if banned {
                if score.pp_status == PpStatus::Ineligible {
                    continue;
                }
                PpResolution::zero_forced()
            } else {
                evaluate_pp(&self.gate, &score).await?
            };
            groups
                .entry((score.user_id, score.gamemode))
                .or_default()
                .push((score, resolution));
        }

        let mut affected = 0;
        for ((user_id, mode), entries) in groups {
            let _guard = self.locks.lock((user_id, mode)).await;
            let mut tx = self.pool.begin().await?;

            for (score, resolution) in &entries {
                match &resolution.retry_reason {
                    Some(reason) => score_store::enqueue_recalculate(&mut tx, score.id, reason).await?,
                    None => score_store::dequeue_recalculate(&mut tx, score.id).await?,
                }
                let resolution = recheck_ban(&self.gate, &mut tx, beatmap_id, resolution.clone()).await?;
                score_store::update_score_pp(&mut tx, score.id, resolution.pp, resolution.status).await?;
            }
            ledger::rebuild_best_by_pp(&mut tx, user_id, beatmap_id, mode).await?;

            let mut stats = statistics::load_statistics(&mut tx, user_id, mode).await?;
            statistics::refresh_pp(&mut tx, &mut stats).await?;
            statistics::save_statistics(&mut tx, &stats).await?;
            tx.commit().await?;

            affected += entries.len();
        }

        if banned {
            self.gate.bans().mark_cleared(beatmap_id).await?;
        }
        log::info!(
            "谱面 {beatmap_id} {}后重算了 {affected} 条成绩",
            if banned { "封禁" } else { "解封" }
        );
        Ok(affected)
    }

    pub async fn ban_beatmap(&self, beatmap_id: i64, reason: &str) -> AppResult<usize> {
        self.gate.bans().add(beatmap_id, reason).await?;
        self.recompute_for_ban_change(beatmap_id).await
    }

    pub async fn unban_beatmap(&self, beatmap_id: i64) -> AppResult<usize> {
        if !self.gate.bans().remove(beatmap_id).await? {
            return Err(AppError::NotFound(format!("谱面 {beatmap_id} 未被封禁")));
        }
        self.recompute_for_ban_change(beatmap_id).await
    }

    /// 可疑检测自动封禁的谱面，其已有成绩在这里清零
    pub async fn sweep_uncleared_bans(&self) -> AppResult<usize> {
        let uncleared = self.gate.bans().list_uncleared().await?;
        let mut affected = 0;
        for beatmap_id in uncleared {
            affected += self.recompute_for_ban_change(beatmap_id).await?;
        }
        Ok(affected)
    }

    fn prune_locks(&self) {
        self.locks.prune();
        log::debug!("清理空闲锁后剩余 {} 把", self.locks.len());
    }
}

/// 后台定时重算
pub fn spawn_recalculate_task(service: Arc<RecalculateService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::info!("pp 重算任务已启动，间隔 {}s", interval.as_secs());

        loop {
            ticker.tick().await;

            match service.recompute_pending_results().await {
                Ok(summary) if summary.processed > 0 => log::info!("pp 重算完成: {summary:?}"),
                Ok(_) => log::debug!("重算队列为空"),
                Err(e) => log::error!("pp 重算失败: {e}"),
            }
            match service.sweep_uncleared_bans().await {
                Ok(0) => {}
                Ok(n) => log::info!("清理封禁谱面成绩 {n} 条"),
                Err(e) => log::error!("清理封禁谱面失败: {e}"),
            }
            service.prune_locks();
        }
    })
}
