use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

use crate::models::beatmap::Beatmap;
use crate::models::game_mode::{GameMode, Rank};
use crate::models::score::{PpStatus, Score, ScoreSubmission};
use crate::services::beatmap::BeatmapService;
use crate::services::calculator::CalculateError;
use crate::services::mod_policy::ModPolicy;
use crate::services::pp_gate::PpCacheGate;
use crate::services::{ledger, score_store, statistics};
use crate::utils::error::{AppError, AppResult};
use crate::utils::keyed_lock::KeyedLocks;

/// 单次成绩总分上限，与客户端 int32 总分一致
pub const MAX_TOTAL_SCORE: i64 = i32::MAX as i64;
/// 单项判定计数与连击的上限
pub const MAX_HIT_COUNT: u32 = 10_000_000;

/// 统计行按 (玩家, 模式) 存放，排行指针与统计的修改都在这把锁下进行
pub type UserModeLocks = KeyedLocks<(i64, GameMode)>;

/// 计算结束后成绩的 pp 与状态
#[derive(Debug, Clone, PartialEq)]
pub struct PpResolution {
    pub pp: f64,
    pub status: PpStatus,
    /// 需要稍后重算时的失败原因
    pub retry_reason: Option<String>,
}

impl PpResolution {
    fn ineligible() -> Self {
        Self {
            pp: 0.0,
            status: PpStatus::Ineligible,
            retry_reason: None,
        }
    }

    fn retry(err: &AppError) -> Self {
        Self {
            pp: 0.0,
            status: PpStatus::PendingRetry,
            retry_reason: Some(err.to_string()),
        }
    }

    pub(crate) fn zero_forced() -> Self {
        Self {
            pp: 0.0,
            status: PpStatus::ZeroForced,
            retry_reason: None,
        }
    }
}

/// 计算器故障降级为待重算；封禁表或数据库故障向上传递
pub async fn evaluate_pp(gate: &PpCacheGate, score: &Score) -> AppResult<PpResolution> {
    if gate.bans().is_banned(score.beatmap_id).await? {
        log::debug!("谱面 {} 已封禁，成绩 {} 不做计算", score.beatmap_id, score.id);
        return Ok(PpResolution::zero_forced());
    }

    match gate.supports_performance(score.gamemode).await {
        Ok(true) => {}
        Ok(false) => {
            log::debug!("当前计算器不支持 {} 模式，成绩 {} 不计 pp", score.gamemode, score.id);
            return Ok(PpResolution::ineligible());
        }
        Err(e) if e.is_retryable() => {
            log::warn!("查询计算器能力失败，成绩 {} 稍后重算: {e}", score.id);
            return Ok(PpResolution::retry(&e));
        }
        Err(e) => return Err(e),
    }

    match gate.compute_pp(score).await {
        Ok(outcome) => Ok(PpResolution {
            pp: outcome.pp(),
            status: outcome.status(),
            retry_reason: None,
        }),
        Err(AppError::Calculate(CalculateError::Convert(msg))) => {
            log::info!("谱面 {} 无法转换为 {} 模式，不计 pp: {msg}", score.beatmap_id, score.gamemode);
            Ok(PpResolution::ineligible())
        }
        Err(e) if e.is_retryable() => {
            log::warn!("成绩 {} pp 计算失败，稍后重算: {e}", score.id);
            Ok(PpResolution::retry(&e))
        }
        Err(e) => Err(e),
    }
}

/// 计算在锁外进行，期间谱面可能被封禁；落库前在同一事务内复查
///
/// 调用前事务里必须已经有过写操作。
pub(crate) async fn recheck_ban(
    gate: &PpCacheGate,
    conn: &mut SqliteConnection,
    beatmap_id: i64,
    resolution: PpResolution,
) -> AppResult<PpResolution> {
    if resolution.status != PpStatus::Computed {
        return Ok(resolution);
    }
    if gate.bans().is_banned_in(conn, beatmap_id).await? {
        log::warn!("谱面 {beatmap_id} 在计算期间被封禁，pp {:.2} 改记为 0", resolution.pp);
        return Ok(PpResolution::zero_forced());
    }
    Ok(resolution)
}

/// 成绩提交入口
pub struct ScoreSubmissionService {
    pool: SqlitePool,
    beatmaps: BeatmapService,
    gate: Arc<PpCacheGate>,
    policy: ModPolicy,
    locks: Arc<UserModeLocks>,
}

impl ScoreSubmissionService {
    pub fn new(
        pool: SqlitePool,
        beatmaps: BeatmapService,
        gate: Arc<PpCacheGate>,
        policy: ModPolicy,
        locks: Arc<UserModeLocks>,
    ) -> Self {
        Self {
            pool,
            beatmaps,
            gate,
            policy,
            locks,
        }
    }

    fn build_score(&self, beatmap: &Beatmap, payload: ScoreSubmission) -> AppResult<Score> {
        let base_mode = GameMode::from_ruleset_id(payload.ruleset_id)
            .filter(|m| !m.is_variant())
            .ok_or_else(|| AppError::ValidationError(format!("无效的 ruleset_id: {}", payload.ruleset_id)))?;

        if !payload.accuracy.is_finite() || !(0.0..=1.0).contains(&payload.accuracy) {
            return Err(AppError::ValidationError(format!("准确率超出范围: {}", payload.accuracy)));
        }
        if payload.total_score < 0 || payload.max_combo < 0 {
            return Err(AppError::ValidationError("总分与连击不能为负数".to_string()));
        }
        if payload.total_score > MAX_TOTAL_SCORE {
            return Err(AppError::ValidationError(format!("总分超出上限: {}", payload.total_score)));
        }
        if payload.max_combo > MAX_HIT_COUNT as i64 || payload.statistics.max_count() > MAX_HIT_COUNT {
            return Err(AppError::ValidationError("判定计数或连击超出上限".to_string()));
        }
        if let Some(checksum) = &payload.beatmap_checksum {
            if !beatmap.checksum.is_empty() && checksum != &beatmap.checksum {
                return Err(AppError::ValidationError(format!("谱面 {} 校验和不匹配", beatmap.id)));
            }
        }

        let acronyms: Vec<&str> = payload.mods.iter().map(|m| m.acronym.as_str()).collect();
        let gamemode = base_mode.to_special_mode(&acronyms, self.policy.enable_rx(), self.policy.enable_ap());

        let ended_at = payload.ended_at.unwrap_or_else(Utc::now);
        let started_at = payload.started_at.unwrap_or(ended_at);
        let rank = if payload.passed { payload.rank } else { Rank::F };
        let ranked = self
            .policy
            .is_ranked_eligible(payload.passed, beatmap.status, gamemode, &payload.mods);
        let leaderboard_eligible = payload.passed && self.policy.is_eligible_for_leaderboard(beatmap.status);

        Ok(Score {
            id: 0,
            user_id: payload.user_id,
            beatmap_id: beatmap.id,
            map_md5: beatmap.checksum.clone(),
            gamemode,
            mods: payload.mods,
            accuracy: payload.accuracy,
            max_combo: payload.max_combo,
            rank,
            passed: payload.passed,
            ranked,
            leaderboard_eligible,
            pp: 0.0,
            pp_status: PpStatus::Unset,
            total_score: payload.total_score,
            statistics: payload.statistics,
            started_at,
            ended_at,
        })
    }

    pub async fn submit(&self, beatmap_id: i64, payload: ScoreSubmission) -> AppResult<Score> {
        let beatmap = self
            .beatmaps
            .get_beatmap(beatmap_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("谱面 {beatmap_id}")))?;

        let mut score = self.build_score(&beatmap, payload)?;
        log::info!(
            "玩家 {} 提交成绩: 谱面 {beatmap_id} 模式 {} passed={} 总分 {} ranked={}",
            score.user_id,
            score.gamemode,
            score.passed,
            score.total_score,
            score.ranked
        );

        // 计算在加锁之前完成
        let resolution = if score.ranked {
            evaluate_pp(&self.gate, &score).await?
        } else {
            PpResolution::ineligible()
        };
        score.pp = resolution.pp;
        score.pp_status = resolution.status;

        let _guard = self.locks.lock((score.user_id, score.gamemode)).await;
        let mut tx = self.pool.begin().await?;

        score.id = score_store::insert_score(&mut tx, &score).await?;
        let resolution = recheck_ban(&self.gate, &mut tx, score.beatmap_id, resolution).await?;
        if resolution.status != score.pp_status {
            score.pp = resolution.pp;
            score.pp_status = resolution.status;
            score_store::update_score_pp(&mut tx, score.id, score.pp, score.pp_status).await?;
        }
        if let Some(reason) = &resolution.retry_reason {
            score_store::enqueue_recalculate(&mut tx, score.id, reason).await?;
            log::warn!("成绩 {} 已加入 pp 重算队列", score.id);
        }

        let best = ledger::update_best_by_score(&mut tx, &score).await?;
        let pp_replaced = ledger::update_best_by_pp(&mut tx, &score).await?;

        let mut stats = statistics::load_statistics(&mut tx, score.user_id, score.gamemode).await?;
        if statistics::apply_submission(&mut stats, &score, beatmap.total_length, &best, pp_replaced) {
            statistics::refresh_pp(&mut tx, &mut stats).await?;
        }
        statistics::save_statistics(&mut tx, &stats).await?;

        tx.commit().await?;

        log::info!(
            "成绩 {} 已保存: pp={:.2} ({}) 总分增量 {}",
            score.id,
            score.pp,
            score.pp_status.as_str(),
            best.delta.max(0)
        );
        Ok(score)
    }

    pub async fn get_score(&self, score_id: i64) -> AppResult<Score> {
        let mut conn = self.pool.acquire().await?;
        score_store::get_score(&mut conn, score_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("成绩 {score_id}")))
    }

    /// 玩家主动删除成绩，空出的排行指针由次佳成绩顶上
    pub async fn delete_score(&self, score_id: i64, user_id: i64) -> AppResult<()> {
        let score = self.get_score(score_id).await?;
        if score.user_id != user_id {
            return Err(AppError::ValidationError(format!("成绩 {score_id} 不属于玩家 {user_id}")));
        }

        let key = (score.user_id, score.beatmap_id, score.gamemode);
        let _guard = self.locks.lock((score.user_id, score.gamemode)).await;

        // 在锁内读取指针，事务的第一条语句即为写操作
        let (best_score, best_pp) = {
            let mut conn = self.pool.acquire().await?;
            (
                ledger::get_best_by_score(&mut conn, key.0, key.1, key.2).await?,
                ledger::get_best_by_pp(&mut conn, key.0, key.1, key.2).await?,
            )
        };

        let mut tx = self.pool.begin().await?;
        if !score_store::delete_score_row(&mut tx, score_id).await? {
            return Err(AppError::NotFound(format!("成绩 {score_id}")));
        }

        let mut stats = statistics::load_statistics(&mut tx, score.user_id, score.gamemode).await?;

        if let Some(removed) = best_score.filter(|b| b.score_id == score_id) {
            let promoted = ledger::rebuild_best_by_score(&mut tx, key.0, key.1, key.2).await?;
            statistics::revert_best_by_score(&mut stats, &removed, promoted.as_ref());
            stats.maximum_combo = ledger::max_combo_of_best_scores(&mut tx, score.user_id, score.gamemode).await?;
            log::debug!(
                "成绩 {score_id} 的最高总分指针由 {:?} 顶替",
                promoted.as_ref().map(|p| p.score_id)
            );
        }
        if best_pp.is_some_and(|b| b.score_id == score_id) {
            ledger::rebuild_best_by_pp(&mut tx, key.0, key.1, key.2).await?;
        }

        statistics::refresh_pp(&mut tx, &mut stats).await?;
        statistics::save_statistics(&mut tx, &stats).await?;
        tx.commit().await?;

        log::info!("玩家 {user_id} 删除了成绩 {score_id}");
        Ok(())
    }
}
