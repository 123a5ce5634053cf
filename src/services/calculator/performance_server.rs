use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::{AvailableModes, CalculateError, PerformanceCalculator};
use crate::models::game_mode::GameMode;
use crate::models::mods::APIMod;
use crate::models::performance::{DifficultyAttributes, PerformanceAttributes};
use crate::models::score::Score;

/// 远程 osu-performance-server
pub struct PerformanceServerCalculator {
    client: Client,
    server_url: String,
    available: OnceCell<AvailableModes>,
}

#[derive(Debug, Serialize)]
struct PerformanceStatistics {
    great: u32,
    ok: u32,
    meh: u32,
    miss: u32,
    perfect: u32,
    good: u32,
    large_tick_hit: u32,
    large_tick_miss: u32,
    small_tick_hit: u32,
    slider_tail_hit: u32,
}

#[derive(Debug, Serialize)]
struct PerformanceRequest<'a> {
    beatmap_id: i64,
    beatmap_file: &'a str,
    checksum: &'a str,
    accuracy: f64,
    combo: i64,
    mods: &'a [APIMod],
    statistics: PerformanceStatistics,
    ruleset: &'static str,
}

#[derive(Debug, Serialize)]
struct DifficultyRequest<'a> {
    beatmap_file: &'a str,
    mods: &'a [APIMod],
    ruleset: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct AvailableRulesets {
    #[serde(default)]
    has_performance_calculator: Vec<String>,
    #[serde(default)]
    has_difficulty_calculator: Vec<String>,
}

fn parse_modes(names: &[String]) -> std::collections::HashSet<GameMode> {
    names
        .iter()
        .filter_map(|name| name.parse::<GameMode>().ok())
        .map(GameMode::to_base_ruleset)
        .collect()
}

impl PerformanceServerCalculator {
    pub fn new(client: Client, server_url: String) -> Self {
        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            available: OnceCell::new(),
        }
    }

    async fn fetch_available_modes(&self) -> Result<AvailableModes, CalculateError> {
        let response = self
            .client
            .get(format!("{}/available_rulesets", self.server_url))
            .send()
            .await
            .map_err(|e| CalculateError::Other(format!("获取可用模式失败: {e}")))?;

        if !response.status().is_success() {
            return Err(CalculateError::Other(format!(
                "获取可用模式失败: HTTP {}",
                response.status()
            )));
        }

        let rulesets = response
            .json::<AvailableRulesets>()
            .await
            .map_err(|e| CalculateError::Other(format!("可用模式响应无法解析: {e}")))?;

        let modes = AvailableModes {
            has_performance_calculator: parse_modes(&rulesets.has_performance_calculator),
            has_difficulty_calculator: parse_modes(&rulesets.has_difficulty_calculator),
        };
        log::info!(
            "远程计算服务支持的模式: pp {:?}, 难度 {:?}",
            modes.has_performance_calculator,
            modes.has_difficulty_calculator
        );
        Ok(modes)
    }
}

#[async_trait]
impl PerformanceCalculator for PerformanceServerCalculator {
    async fn get_available_modes(&self) -> Result<AvailableModes, CalculateError> {
        // 成功后缓存；失败不缓存，下次再试
        self.available
            .get_or_try_init(|| self.fetch_available_modes())
            .await
            .cloned()
    }

    async fn calculate_performance(
        &self,
        beatmap_raw: Arc<str>,
        score: &Score,
    ) -> Result<PerformanceAttributes, CalculateError> {
        let stats = &score.statistics;
        let body = PerformanceRequest {
            beatmap_id: score.beatmap_id,
            beatmap_file: &beatmap_raw,
            checksum: &score.map_md5,
            accuracy: score.accuracy,
            combo: score.max_combo,
            mods: &score.mods,
            statistics: PerformanceStatistics {
                great: stats.great,
                ok: stats.ok,
                meh: stats.meh,
                miss: stats.miss,
                perfect: stats.perfect,
                good: stats.good,
                large_tick_hit: stats.large_tick_hit,
                large_tick_miss: stats.large_tick_miss,
                small_tick_hit: stats.small_tick_hit,
                slider_tail_hit: stats.slider_tail_hit,
            },
            ruleset: score.gamemode.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/performance", self.server_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CalculateError::Performance(format!("请求计算服务失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CalculateError::Performance(format!("HTTP {status}: {text}")));
        }

        response
            .json::<PerformanceAttributes>()
            .await
            .map_err(|e| CalculateError::Other(format!("计算服务响应无法解析: {e}")))
    }

    async fn calculate_difficulty(
        &self,
        beatmap_raw: Arc<str>,
        mods: &[APIMod],
        mode: Option<GameMode>,
    ) -> Result<DifficultyAttributes, CalculateError> {
        let body = DifficultyRequest {
            beatmap_file: &beatmap_raw,
            mods,
            ruleset: mode.map(|m| m.ruleset_id()),
        };

        let response = self
            .client
            .post(format!("{}/difficulty", self.server_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CalculateError::Difficulty(format!("请求计算服务失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CalculateError::Difficulty(format!("HTTP {status}: {text}")));
        }

        response
            .json::<DifficultyAttributes>()
            .await
            .map_err(|e| CalculateError::Difficulty(format!("计算服务响应无法解析: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_score;

    #[test]
    fn performance_request_matches_server_schema() {
        let mut score = sample_score(7, 42, GameMode::OsuRx);
        score.statistics.great = 300;
        score.statistics.slider_tail_hit = 12;
        let body = PerformanceRequest {
            beatmap_id: score.beatmap_id,
            beatmap_file: "raw",
            checksum: &score.map_md5,
            accuracy: score.accuracy,
            combo: score.max_combo,
            mods: &score.mods,
            statistics: PerformanceStatistics {
                great: score.statistics.great,
                ok: 0,
                meh: 0,
                miss: 0,
                perfect: 0,
                good: 0,
                large_tick_hit: 0,
                large_tick_miss: 0,
                small_tick_hit: 0,
                slider_tail_hit: score.statistics.slider_tail_hit,
            },
            ruleset: score.gamemode.as_str(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ruleset"], "osurx");
        assert_eq!(json["beatmap_id"], 42);
        assert_eq!(json["statistics"]["great"], 300);
        assert_eq!(json["statistics"]["slider_tail_hit"], 12);
    }

    #[test]
    fn available_rulesets_fold_variants() {
        let modes = parse_modes(&["osu".into(), "taikorx".into(), "unknown".into()]);
        assert!(modes.contains(&GameMode::Osu));
        assert!(modes.contains(&GameMode::Taiko));
        assert_eq!(modes.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_retryable_error() {
        let calc = PerformanceServerCalculator::new(Client::new(), "http://127.0.0.1:9/".into());
        let score = sample_score(1, 1, GameMode::Osu);
        let err = calc
            .calculate_performance(Arc::from("osu file format v14"), &score)
            .await
            .unwrap_err();
        assert!(matches!(err, CalculateError::Performance(_)));
        assert!(err.is_retryable());
        assert!(calc.get_available_modes().await.is_err());
    }
}
