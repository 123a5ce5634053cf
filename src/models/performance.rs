use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OsuPerformanceAttributes {
    pub pp: f64,
    pub aim: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub flashlight: f64,
    pub effective_miss_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaikoPerformanceAttributes {
    pub pp: f64,
    pub difficulty: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ManiaPerformanceAttributes {
    pub pp: f64,
    pub difficulty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenericPerformanceAttributes {
    pub pp: f64,
}

/// 计算器返回的 pp 及分项，按模式区分字段
///
/// 无标签反序列化按声明顺序尝试，字段多的变体在前。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PerformanceAttributes {
    Osu(OsuPerformanceAttributes),
    Taiko(TaikoPerformanceAttributes),
    Mania(ManiaPerformanceAttributes),
    Generic(GenericPerformanceAttributes),
}

impl PerformanceAttributes {
    pub fn pp(&self) -> f64 {
        match self {
            PerformanceAttributes::Osu(a) => a.pp,
            PerformanceAttributes::Taiko(a) => a.pp,
            PerformanceAttributes::Mania(a) => a.pp,
            PerformanceAttributes::Generic(a) => a.pp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OsuDifficultyAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
    pub aim_difficulty: f64,
    pub speed_difficulty: f64,
    pub speed_note_count: f64,
    #[serde(default)]
    pub flashlight_difficulty: f64,
    pub slider_factor: f64,
    pub aim_difficult_strain_count: f64,
    pub speed_difficult_strain_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaikoDifficultyAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
    pub rhythm_difficulty: f64,
    pub mono_stamina_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GenericDifficultyAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DifficultyAttributes {
    Osu(OsuDifficultyAttributes),
    Taiko(TaikoDifficultyAttributes),
    Generic(GenericDifficultyAttributes),
}

impl DifficultyAttributes {
    pub fn star_rating(&self) -> f64 {
        match self {
            DifficultyAttributes::Osu(a) => a.star_rating,
            DifficultyAttributes::Taiko(a) => a.star_rating,
            DifficultyAttributes::Generic(a) => a.star_rating,
        }
    }

    pub fn max_combo(&self) -> u32 {
        match self {
            DifficultyAttributes::Osu(a) => a.max_combo,
            DifficultyAttributes::Taiko(a) => a.max_combo,
            DifficultyAttributes::Generic(a) => a.max_combo,
        }
    }
}
