use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::utils::error::AppError;

/// 游戏模式，包含 RX / AP 变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Osu,
    Taiko,
    Fruits,
    Mania,
    OsuRx,
    OsuAp,
    TaikoRx,
    FruitsRx,
}

impl GameMode {
    pub const ALL: [GameMode; 8] = [
        GameMode::Osu,
        GameMode::Taiko,
        GameMode::Fruits,
        GameMode::Mania,
        GameMode::OsuRx,
        GameMode::OsuAp,
        GameMode::TaikoRx,
        GameMode::FruitsRx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Osu => "osu",
            GameMode::Taiko => "taiko",
            GameMode::Fruits => "fruits",
            GameMode::Mania => "mania",
            GameMode::OsuRx => "osurx",
            GameMode::OsuAp => "osuap",
            GameMode::TaikoRx => "taikorx",
            GameMode::FruitsRx => "fruitsrx",
        }
    }

    /// 客户端的 ruleset id，变体模式归到基础模式
    pub fn ruleset_id(&self) -> u8 {
        match self.to_base_ruleset() {
            GameMode::Taiko => 1,
            GameMode::Fruits => 2,
            GameMode::Mania => 3,
            _ => 0,
        }
    }

    /// 0..=3 为基础模式，4..=7 为变体模式
    pub fn from_ruleset_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(GameMode::Osu),
            1 => Some(GameMode::Taiko),
            2 => Some(GameMode::Fruits),
            3 => Some(GameMode::Mania),
            4 => Some(GameMode::OsuRx),
            5 => Some(GameMode::OsuAp),
            6 => Some(GameMode::TaikoRx),
            7 => Some(GameMode::FruitsRx),
            _ => None,
        }
    }

    pub fn to_base_ruleset(self) -> Self {
        match self {
            GameMode::OsuRx | GameMode::OsuAp => GameMode::Osu,
            GameMode::TaikoRx => GameMode::Taiko,
            GameMode::FruitsRx => GameMode::Fruits,
            other => other,
        }
    }

    pub fn is_variant(&self) -> bool {
        self.to_base_ruleset() != *self
    }

    /// 根据 RX / AP mod 把提交提升为对应的变体模式
    pub fn to_special_mode<S: AsRef<str>>(self, acronyms: &[S], enable_rx: bool, enable_ap: bool) -> Self {
        if !matches!(self, GameMode::Osu | GameMode::Taiko | GameMode::Fruits) {
            return self;
        }
        if !enable_rx && !enable_ap {
            return self;
        }
        let has = |acronym: &str| acronyms.iter().any(|a| a.as_ref() == acronym);
        if enable_ap && self == GameMode::Osu && has("AP") {
            return GameMode::OsuAp;
        }
        if enable_rx && has("RX") {
            return match self {
                GameMode::Osu => GameMode::OsuRx,
                GameMode::Taiko => GameMode::TaikoRx,
                _ => GameMode::FruitsRx,
            };
        }
        self
    }

    pub fn to_rosu(self) -> rosu_pp::model::mode::GameMode {
        use rosu_pp::model::mode::GameMode as RosuMode;
        match self.to_base_ruleset() {
            GameMode::Taiko => RosuMode::Taiko,
            GameMode::Fruits => RosuMode::Catch,
            GameMode::Mania => RosuMode::Mania,
            _ => RosuMode::Osu,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = AppError;

    /// 同时接受名称和数字 id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return GameMode::from_ruleset_id(id)
                .ok_or_else(|| AppError::ValidationError(format!("无效的 ruleset id: {id}")));
        }
        let lower = s.to_lowercase();
        GameMode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| AppError::ValidationError(format!("无效的游戏模式: {s}")))
    }
}

/// 成绩评级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Rank {
    X,
    XH,
    S,
    SH,
    A,
    B,
    C,
    D,
    F,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::X => "X",
            Rank::XH => "XH",
            Rank::S => "S",
            Rank::SH => "SH",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::F => "F",
        }
    }

    /// 是否计入统计里的评级计数
    pub fn in_statistics(&self) -> bool {
        matches!(self, Rank::X | Rank::XH | Rank::S | Rank::SH | Rank::A)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "X" | "SS" => Ok(Rank::X),
            "XH" | "SSH" => Ok(Rank::XH),
            "S" => Ok(Rank::S),
            "SH" => Ok(Rank::SH),
            "A" => Ok(Rank::A),
            "B" => Ok(Rank::B),
            "C" => Ok(Rank::C),
            "D" => Ok(Rank::D),
            "F" => Ok(Rank::F),
            other => Err(AppError::ValidationError(format!("无效的评级: {other}"))),
        }
    }
}
