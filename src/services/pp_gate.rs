use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::game_mode::GameMode;
use crate::models::mods::{mods_hash, APIMod};
use crate::models::performance::DifficultyAttributes;
use crate::models::score::{PpStatus, Score};
use crate::services::ban_registry::BanRegistry;
use crate::services::beatmap::MapContentStore;
use crate::services::calculator::PerformanceCalculator;
use crate::utils::error::{AppError, AppResult};
use crate::utils::pp_utils::PP_SANITY_CEILING;
use crate::utils::suspicious::{check_suspicion, parse_beatmap, SuspicionReason};

#[derive(Debug, Clone, PartialEq)]
pub enum ZeroReason {
    BannedBeatmap,
    SuspiciousBeatmap(SuspicionReason),
    /// 计算结果超过可信上限
    Implausible(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PpOutcome {
    Computed(f64),
    ZeroForced(ZeroReason),
}

impl PpOutcome {
    pub fn pp(&self) -> f64 {
        match self {
            PpOutcome::Computed(pp) => *pp,
            PpOutcome::ZeroForced(_) => 0.0,
        }
    }

    pub fn status(&self) -> PpStatus {
        match self {
            PpOutcome::Computed(_) => PpStatus::Computed,
            PpOutcome::ZeroForced(_) => PpStatus::ZeroForced,
        }
    }
}

type DifficultyKey = (i64, Option<GameMode>, String);

/// 计算器调用入口：封禁 / 可疑检测 / 超时 / 合理性上限
pub struct PpCacheGate {
    calculator: Arc<dyn PerformanceCalculator>,
    content: Arc<dyn MapContentStore>,
    bans: BanRegistry,
    difficulty_cache: Cache<DifficultyKey, DifficultyAttributes>,
    suspicious_check: bool,
    calculation_timeout: Duration,
}

impl PpCacheGate {
    pub fn new(
        calculator: Arc<dyn PerformanceCalculator>,
        content: Arc<dyn MapContentStore>,
        bans: BanRegistry,
        config: &AppConfig,
    ) -> Self {
        Self {
            calculator,
            content,
            bans,
            difficulty_cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(config.difficulty_cache_ttl())
                .build(),
            suspicious_check: config.suspicious_score_check,
            calculation_timeout: config.calculation_timeout(),
        }
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub async fn supports_performance(&self, mode: GameMode) -> AppResult<bool> {
        Ok(self.calculator.can_calculate_performance(mode).await?)
    }

    /// 可疑检测失败只记录日志，不影响计算
    async fn detect(&self, beatmap_id: i64, raw: Arc<str>, mode: GameMode) -> Option<SuspicionReason> {
        let checked = tokio::task::spawn_blocking(move || {
            parse_beatmap(&raw, Some(mode)).map(|parsed| check_suspicion(&parsed))
        })
        .await;

        match checked {
            Ok(Ok(reason)) => reason,
            Ok(Err(e)) => {
                log::warn!("谱面 {beatmap_id} 可疑检测失败，跳过: {e}");
                None
            }
            Err(e) => {
                log::warn!("谱面 {beatmap_id} 可疑检测线程异常: {e}");
                None
            }
        }
    }

    pub async fn compute_pp(&self, score: &Score) -> AppResult<PpOutcome> {
        let beatmap_id = score.beatmap_id;

        if self.bans.is_banned(beatmap_id).await? {
            log::debug!("谱面 {beatmap_id} 已封禁，成绩 pp 记为 0");
            return Ok(PpOutcome::ZeroForced(ZeroReason::BannedBeatmap));
        }

        let content = self.content.get_or_fetch(beatmap_id).await?;
        if !score.map_md5.is_empty() && score.map_md5 != content.checksum {
            log::warn!(
                "谱面 {beatmap_id} 校验和不一致: 成绩 {}，当前内容 {}",
                score.map_md5,
                content.checksum
            );
        }

        if self.suspicious_check {
            if let Some(reason) = self.detect(beatmap_id, content.raw.clone(), score.gamemode).await {
                log::warn!("谱面 {beatmap_id} 被判定为可疑 ({reason})，封禁并将 pp 记为 0");
                self.bans.add(beatmap_id, &reason.to_string()).await?;
                return Ok(PpOutcome::ZeroForced(ZeroReason::SuspiciousBeatmap(reason)));
            }
        }

        let attrs = tokio::time::timeout(
            self.calculation_timeout,
            self.calculator.calculate_performance(content.raw.clone(), score),
        )
        .await
        .map_err(|_| AppError::Timeout(format!("谱面 {beatmap_id} pp 计算超时")))??;

        let pp = attrs.pp();
        if !pp.is_finite() || pp > PP_SANITY_CEILING {
            log::warn!(
                "玩家 {} 在谱面 {beatmap_id} 的成绩 pp={pp} 超出上限，仅将该成绩记为 0",
                score.user_id
            );
            return Ok(PpOutcome::ZeroForced(ZeroReason::Implausible(pp)));
        }

        Ok(PpOutcome::Computed(pp.max(0.0)))
    }

    pub async fn get_difficulty(
        &self,
        beatmap_id: i64,
        mode: Option<GameMode>,
        mods: &[APIMod],
    ) -> AppResult<DifficultyAttributes> {
        if self.bans.is_banned(beatmap_id).await? {
            return Err(AppError::ValidationError(format!("谱面 {beatmap_id} 已被封禁")));
        }
        if let Some(mode) = mode {
            if !self.calculator.can_calculate_difficulty(mode).await? {
                return Err(AppError::ValidationError(format!("当前计算器不支持 {mode} 模式")));
            }
        }

        let key = (beatmap_id, mode, mods_hash(mods));
        if let Some(cached) = self.difficulty_cache.get(&key).await {
            log::debug!("谱面 {beatmap_id} 难度缓存命中");
            return Ok(cached);
        }

        let attrs = self
            .difficulty_cache
            .try_get_with(key, async {
                let content = self.content.get_or_fetch(beatmap_id).await?;
                let attrs = tokio::time::timeout(
                    self.calculation_timeout,
                    self.calculator.calculate_difficulty(content.raw, mods, mode),
                )
                .await
                .map_err(|_| AppError::Timeout(format!("谱面 {beatmap_id} 难度计算超时")))??;
                Ok::<_, AppError>(attrs)
            })
            .await?;
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::calculator::CalculateError;
    use crate::test_support::{sample_score, StubCalculator, StubContentStore, DENSE_MAP, OSU_MAP};
    use crate::utils::db::memory_pool;

    async fn gate_with(
        calculator: Arc<StubCalculator>,
        content: Arc<StubContentStore>,
        config: &AppConfig,
    ) -> PpCacheGate {
        let bans = BanRegistry::new(memory_pool().await);
        PpCacheGate::new(calculator, content, bans, config)
    }

    #[tokio::test]
    async fn returns_calculator_value() {
        let calc = Arc::new(StubCalculator::fixed(245.5));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc.clone(), content, &AppConfig::default()).await;

        let outcome = gate.compute_pp(&sample_score(1, 1, GameMode::Osu)).await.unwrap();
        assert_eq!(outcome, PpOutcome::Computed(245.5));
        assert_eq!(calc.performance_calls(), 1);
    }

    #[tokio::test]
    async fn banned_map_skips_fetch_and_calculation() {
        let calc = Arc::new(StubCalculator::fixed(100.0));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc.clone(), content.clone(), &AppConfig::default()).await;
        gate.bans().add(1, "manual").await.unwrap();

        let outcome = gate.compute_pp(&sample_score(1, 1, GameMode::Osu)).await.unwrap();
        assert_eq!(outcome, PpOutcome::ZeroForced(ZeroReason::BannedBeatmap));
        assert_eq!(calc.performance_calls(), 0);
        assert_eq!(content.fetches(), 0);
    }

    #[tokio::test]
    async fn suspicious_map_is_banned_before_calculation() {
        let calc = Arc::new(StubCalculator::fixed(100.0));
        let content = Arc::new(StubContentStore::with_map(2, &DENSE_MAP));
        let gate = gate_with(calc.clone(), content, &AppConfig::default()).await;

        let outcome = gate.compute_pp(&sample_score(1, 2, GameMode::Osu)).await.unwrap();
        assert_eq!(
            outcome,
            PpOutcome::ZeroForced(ZeroReason::SuspiciousBeatmap(SuspicionReason::Density))
        );
        assert_eq!(calc.performance_calls(), 0);
        assert!(gate.bans().is_banned(2).await.unwrap());
    }

    #[tokio::test]
    async fn detector_can_be_disabled() {
        let calc = Arc::new(StubCalculator::fixed(100.0));
        let content = Arc::new(StubContentStore::with_map(2, &DENSE_MAP));
        let config = AppConfig {
            suspicious_score_check: false,
            ..AppConfig::default()
        };
        let gate = gate_with(calc, content, &config).await;

        let outcome = gate.compute_pp(&sample_score(1, 2, GameMode::Osu)).await.unwrap();
        assert_eq!(outcome, PpOutcome::Computed(100.0));
        assert!(!gate.bans().is_banned(2).await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_map_is_not_suspicious() {
        let calc = Arc::new(StubCalculator::fixed(80.0));
        let content = Arc::new(StubContentStore::with_map(3, "not an osu file"));
        let gate = gate_with(calc, content, &AppConfig::default()).await;

        let outcome = gate.compute_pp(&sample_score(1, 3, GameMode::Osu)).await.unwrap();
        assert_eq!(outcome, PpOutcome::Computed(80.0));
    }

    #[tokio::test]
    async fn implausible_value_zeroes_only_this_result() {
        let calc = Arc::new(StubCalculator::fixed(3000.5));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc, content, &AppConfig::default()).await;

        let outcome = gate.compute_pp(&sample_score(1, 1, GameMode::Osu)).await.unwrap();
        assert_eq!(outcome, PpOutcome::ZeroForced(ZeroReason::Implausible(3000.5)));
        assert!(!gate.bans().is_banned(1).await.unwrap());
    }

    #[tokio::test]
    async fn calculator_errors_surface_typed() {
        let calc = Arc::new(StubCalculator::failing(CalculateError::Performance("down".into())));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc, content, &AppConfig::default()).await;

        let err = gate.compute_pp(&sample_score(1, 1, GameMode::Osu)).await.unwrap_err();
        assert!(matches!(err, AppError::Calculate(CalculateError::Performance(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_calculator_times_out() {
        let calc = Arc::new(StubCalculator::fixed(50.0).with_delay(Duration::from_secs(3)));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let config = AppConfig {
            calculation_timeout_secs: 1,
            ..AppConfig::default()
        };
        let gate = gate_with(calc, content, &config).await;

        let err = gate.compute_pp(&sample_score(1, 1, GameMode::Osu)).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_content_is_retryable() {
        let calc = Arc::new(StubCalculator::fixed(50.0));
        let content = Arc::new(StubContentStore::default());
        let gate = gate_with(calc.clone(), content, &AppConfig::default()).await;

        let err = gate.compute_pp(&sample_score(1, 404, GameMode::Osu)).await.unwrap_err();
        assert!(matches!(err, AppError::ContentFetch(_)));
        assert_eq!(calc.performance_calls(), 0);
    }

    #[tokio::test]
    async fn difficulty_is_cached_per_mods_hash() {
        let calc = Arc::new(StubCalculator::fixed(50.0));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc.clone(), content, &AppConfig::default()).await;

        let hd_dt = [APIMod::new("HD"), APIMod::new("DT")];
        let dt_hd = [APIMod::new("DT"), APIMod::new("HD")];
        gate.get_difficulty(1, Some(GameMode::Osu), &hd_dt).await.unwrap();
        gate.get_difficulty(1, Some(GameMode::Osu), &dt_hd).await.unwrap();
        assert_eq!(calc.difficulty_calls(), 1);

        gate.get_difficulty(1, Some(GameMode::Osu), &[]).await.unwrap();
        assert_eq!(calc.difficulty_calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_difficulty_requests_collapse() {
        let calc = Arc::new(StubCalculator::fixed(50.0).with_delay(Duration::from_millis(100)));
        let content = Arc::new(StubContentStore::with_map(1, OSU_MAP));
        let gate = gate_with(calc.clone(), content, &AppConfig::default()).await;

        let (a, b) = tokio::join!(
            gate.get_difficulty(1, None, &[]),
            gate.get_difficulty(1, None, &[])
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calc.difficulty_calls(), 1);
    }
}
