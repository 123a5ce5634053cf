//! pp / 难度计算端口
//!
//! 两个实现：进程内的 rosu-pp 与远程 osu-performance-server，启动时按配置选择其一并注入。

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AppConfig, CalculatorKind};
use crate::models::game_mode::GameMode;
use crate::models::mods::APIMod;
use crate::models::performance::{DifficultyAttributes, PerformanceAttributes};
use crate::models::score::Score;

pub mod performance_server;
pub mod rosu;

pub use performance_server::PerformanceServerCalculator;
pub use rosu::RosuCalculator;

#[derive(Debug, Clone, Error)]
pub enum CalculateError {
    /// 谱面无法解析
    #[error("难度计算失败: {0}")]
    Difficulty(String),

    /// 谱面无法转换到目标模式
    #[error("谱面无法转换: {0}")]
    Convert(String),

    #[error("表现分计算失败: {0}")]
    Performance(String),

    #[error("未知计算错误: {0}")]
    Other(String),
}

impl CalculateError {
    /// 转谱失败是谱面本身的问题，重试没有意义
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CalculateError::Convert(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AvailableModes {
    pub has_performance_calculator: HashSet<GameMode>,
    pub has_difficulty_calculator: HashSet<GameMode>,
}

#[async_trait]
pub trait PerformanceCalculator: Send + Sync {
    async fn get_available_modes(&self) -> Result<AvailableModes, CalculateError>;

    async fn calculate_performance(
        &self,
        beatmap_raw: Arc<str>,
        score: &Score,
    ) -> Result<PerformanceAttributes, CalculateError>;

    async fn calculate_difficulty(
        &self,
        beatmap_raw: Arc<str>,
        mods: &[APIMod],
        mode: Option<GameMode>,
    ) -> Result<DifficultyAttributes, CalculateError>;

    /// 变体模式按基础模式判断能力
    async fn can_calculate_performance(&self, mode: GameMode) -> Result<bool, CalculateError> {
        let modes = self.get_available_modes().await?;
        Ok(modes.has_performance_calculator.contains(&mode.to_base_ruleset()))
    }

    async fn can_calculate_difficulty(&self, mode: GameMode) -> Result<bool, CalculateError> {
        let modes = self.get_available_modes().await?;
        Ok(modes.has_difficulty_calculator.contains(&mode.to_base_ruleset()))
    }
}

pub fn build_calculator(
    config: &AppConfig,
    client: reqwest::Client,
) -> Arc<dyn PerformanceCalculator> {
    match config.calculator {
        CalculatorKind::Rosu => {
            log::info!("使用 rosu-pp 进行 pp 计算");
            Arc::new(RosuCalculator::new())
        }
        CalculatorKind::PerformanceServer => {
            log::info!("使用远程计算服务: {}", config.performance_server_url);
            Arc::new(PerformanceServerCalculator::new(
                client,
                config.performance_server_url.clone(),
            ))
        }
    }
}
