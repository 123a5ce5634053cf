use async_trait::async_trait;
use rosu_pp::any::{
    DifficultyAttributes as RosuDifficulty, PerformanceAttributes as RosuPerformance,
};
use rosu_pp::model::mods::GameMods;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use super::{AvailableModes, CalculateError, PerformanceCalculator};
use crate::models::game_mode::GameMode;
use crate::models::mods::{mods_to_legacy, APIMod, RATE_CHANGE_MODS};
use crate::models::performance::{
    DifficultyAttributes, GenericDifficultyAttributes, GenericPerformanceAttributes,
    ManiaPerformanceAttributes, OsuDifficultyAttributes, OsuPerformanceAttributes,
    PerformanceAttributes, TaikoDifficultyAttributes, TaikoPerformanceAttributes,
};
use crate::models::score::Score;

/// 进程内 rosu-pp 计算器，计算在阻塞线程池中执行
#[derive(Debug, Clone, Default)]
pub struct RosuCalculator;

impl RosuCalculator {
    pub fn new() -> Self {
        Self
    }
}

/// 只有显式设置了 speed_change 时才覆盖默认倍速
fn custom_clock_rate(mods: &[APIMod]) -> Option<f64> {
    let mut custom = None;
    for m in mods.iter().filter(|m| RATE_CHANGE_MODS.contains(&m.acronym.as_str())) {
        if let Some(rate) = m.settings.get("speed_change").and_then(Value::as_f64) {
            custom = Some(custom.unwrap_or(1.0) * rate);
        }
    }
    custom
}

fn load_map(raw: &str, mode: Option<GameMode>, bits: u32) -> Result<rosu_pp::Beatmap, CalculateError> {
    let mut map = rosu_pp::Beatmap::from_str(raw)
        .map_err(|e| CalculateError::Difficulty(format!("谱面解析失败: {e}")))?;
    if let Some(mode) = mode {
        map.convert_mut(mode.to_rosu(), &GameMods::from(bits))
            .map_err(|e| CalculateError::Convert(format!("{e} ({mode})")))?;
    }
    Ok(map)
}

fn performance_blocking(raw: &str, score: &Score) -> Result<PerformanceAttributes, CalculateError> {
    let bits = mods_to_legacy(&score.mods);
    let map = load_map(raw, Some(score.gamemode), bits)?;
    let stats = &score.statistics;

    let mut perf = rosu_pp::Performance::new(&map)
        .mods(bits)
        .lazer(true)
        .accuracy((score.accuracy * 100.0).clamp(0.0, 100.0))
        .combo(score.max_combo.max(0) as u32)
        .large_tick_hits(stats.large_tick_hit)
        .small_tick_hits(stats.small_tick_hit)
        .slider_end_hits(stats.slider_tail_hit)
        .n_geki(stats.perfect)
        .n_katu(stats.good)
        .n300(stats.great)
        .n100(stats.ok)
        .n50(stats.meh)
        .misses(stats.miss);
    if let Some(rate) = custom_clock_rate(&score.mods) {
        perf = perf.clock_rate(rate);
    }

    Ok(match perf.calculate() {
        RosuPerformance::Osu(attrs) => PerformanceAttributes::Osu(OsuPerformanceAttributes {
            pp: attrs.pp,
            aim: attrs.pp_aim,
            speed: attrs.pp_speed,
            accuracy: attrs.pp_acc,
            flashlight: attrs.pp_flashlight,
            effective_miss_count: attrs.effective_miss_count,
        }),
        RosuPerformance::Taiko(attrs) => PerformanceAttributes::Taiko(TaikoPerformanceAttributes {
            pp: attrs.pp,
            difficulty: attrs.pp_difficulty,
            accuracy: attrs.pp_acc,
        }),
        RosuPerformance::Mania(attrs) => PerformanceAttributes::Mania(ManiaPerformanceAttributes {
            pp: attrs.pp,
            difficulty: attrs.pp_difficulty,
        }),
        RosuPerformance::Catch(attrs) => {
            PerformanceAttributes::Generic(GenericPerformanceAttributes { pp: attrs.pp })
        }
    })
}

fn difficulty_blocking(
    raw: &str,
    mods: &[APIMod],
    mode: Option<GameMode>,
) -> Result<DifficultyAttributes, CalculateError> {
    let bits = mods_to_legacy(mods);
    let map = load_map(raw, mode, bits)?;

    let mut difficulty = rosu_pp::Difficulty::new().mods(bits);
    if let Some(rate) = custom_clock_rate(mods) {
        difficulty = difficulty.clock_rate(rate);
    }
    let attrs = difficulty.calculate(&map);
    let star_rating = attrs.stars();
    let max_combo = attrs.max_combo();

    Ok(match attrs {
        RosuDifficulty::Osu(osu) => DifficultyAttributes::Osu(OsuDifficultyAttributes {
            star_rating,
            max_combo,
            aim_difficulty: osu.aim,
            speed_difficulty: osu.speed,
            speed_note_count: osu.speed_note_count,
            flashlight_difficulty: osu.flashlight,
            slider_factor: osu.slider_factor,
            aim_difficult_strain_count: osu.aim_difficult_strain_count,
            speed_difficult_strain_count: osu.speed_difficult_strain_count,
        }),
        RosuDifficulty::Taiko(taiko) => DifficultyAttributes::Taiko(TaikoDifficultyAttributes {
            star_rating,
            max_combo,
            rhythm_difficulty: taiko.rhythm,
            mono_stamina_factor: taiko.mono_stamina_factor,
        }),
        _ => DifficultyAttributes::Generic(GenericDifficultyAttributes {
            star_rating,
            max_combo,
        }),
    })
}

#[async_trait]
impl PerformanceCalculator for RosuCalculator {
    async fn get_available_modes(&self) -> Result<AvailableModes, CalculateError> {
        let base = [GameMode::Osu, GameMode::Taiko, GameMode::Fruits, GameMode::Mania];
        Ok(AvailableModes {
            has_performance_calculator: base.into_iter().collect(),
            has_difficulty_calculator: base.into_iter().collect(),
        })
    }

    async fn calculate_performance(
        &self,
        beatmap_raw: Arc<str>,
        score: &Score,
    ) -> Result<PerformanceAttributes, CalculateError> {
        let score = score.clone();
        tokio::task::spawn_blocking(move || performance_blocking(&beatmap_raw, &score))
            .await
            .map_err(|e| CalculateError::Other(format!("计算线程异常退出: {e}")))?
    }

    async fn calculate_difficulty(
        &self,
        beatmap_raw: Arc<str>,
        mods: &[APIMod],
        mode: Option<GameMode>,
    ) -> Result<DifficultyAttributes, CalculateError> {
        let mods = mods.to_vec();
        tokio::task::spawn_blocking(move || difficulty_blocking(&beatmap_raw, &mods, mode))
            .await
            .map_err(|e| CalculateError::Other(format!("计算线程异常退出: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_score, OSU_MAP, MANIA_MAP};
    use serde_json::json;

    #[test]
    fn clock_rate_only_when_configured() {
        assert_eq!(custom_clock_rate(&[APIMod::new("DT")]), None);
        let mods = [APIMod::new("HT").with_setting("speed_change", json!(0.8))];
        assert_eq!(custom_clock_rate(&mods), Some(0.8));
    }

    #[tokio::test]
    async fn osu_map_yields_osu_attributes() {
        let calc = RosuCalculator::new();
        let score = sample_score(1, 1, GameMode::Osu);
        let attrs = calc
            .calculate_performance(Arc::from(OSU_MAP), &score)
            .await
            .unwrap();
        assert!(matches!(attrs, PerformanceAttributes::Osu(_)));
        assert!(attrs.pp().is_finite() && attrs.pp() >= 0.0);

        let diff = calc
            .calculate_difficulty(Arc::from(OSU_MAP), &[], Some(GameMode::Osu))
            .await
            .unwrap();
        assert!(matches!(diff, DifficultyAttributes::Osu(_)));
    }

    #[tokio::test]
    async fn mania_map_cannot_be_converted_to_osu() {
        let calc = RosuCalculator::new();
        let score = sample_score(1, 1, GameMode::Osu);
        let err = calc
            .calculate_performance(Arc::from(MANIA_MAP), &score)
            .await
            .unwrap_err();
        assert!(matches!(err, CalculateError::Convert(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn variant_modes_use_base_capabilities() {
        let calc = RosuCalculator::new();
        assert!(calc.can_calculate_performance(GameMode::OsuRx).await.unwrap());
        assert!(calc.can_calculate_difficulty(GameMode::FruitsRx).await.unwrap());
    }
}
