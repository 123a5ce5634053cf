use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::error::{AppError, AppResult};

/// pp 计算后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorKind {
    /// 进程内 rosu-pp
    Rosu,
    /// 远程 osu-performance-server
    PerformanceServer,
}

impl FromStr for CalculatorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rosu" => Ok(Self::Rosu),
            "performance_server" | "performance-server" => Ok(Self::PerformanceServer),
            other => Err(AppError::ConfigError(format!("未知的计算器类型: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub log_level: String,
    pub cors_allowed_origins: Vec<String>,

    pub calculator: CalculatorKind,
    pub performance_server_url: String,

    // 反作弊 / pp 资格
    pub suspicious_score_check: bool,
    pub enable_rx: bool,
    pub enable_ap: bool,
    pub enable_all_mods_pp: bool,
    pub disabled_pp_mods: Vec<String>,
    pub disable_rate_change_pp: bool,
    pub enable_all_beatmap_pp: bool,
    pub enable_all_beatmap_leaderboard: bool,

    // 缓存与超时
    pub beatmap_cache_expire_hours: u64,
    pub difficulty_cache_ttl_secs: u64,
    pub calculation_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub recalculate_interval_secs: u64,
    pub beatmap_mirrors: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite:lazer_scores.db".to_string(),
            log_level: "info".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            calculator: CalculatorKind::Rosu,
            performance_server_url: "http://localhost:5225".to_string(),
            suspicious_score_check: true,
            enable_rx: false,
            enable_ap: false,
            enable_all_mods_pp: false,
            disabled_pp_mods: Vec::new(),
            disable_rate_change_pp: false,
            enable_all_beatmap_pp: false,
            enable_all_beatmap_leaderboard: false,
            beatmap_cache_expire_hours: 24,
            difficulty_cache_ttl_secs: 600,
            calculation_timeout_secs: 10,
            fetch_timeout_secs: 12,
            recalculate_interval_secs: 300,
            beatmap_mirrors: vec![
                "https://osu.ppy.sh/osu/{beatmap_id}".to_string(),
                "https://osu.direct/api/osu/{beatmap_id}".to_string(),
                "https://catboy.best/osu/{beatmap_id}".to_string(),
            ],
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            log::warn!("环境变量 {key}={v} 无法解析，使用默认值");
            default
        }),
        Err(_) => default,
    }
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let calculator = match env::var("CALCULATOR") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                log::warn!("{e}，回退为 rosu");
                CalculatorKind::Rosu
            }),
            Err(_) => defaults.calculator,
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS", defaults.cors_allowed_origins),
            calculator,
            performance_server_url: env::var("PERFORMANCE_SERVER_URL")
                .unwrap_or(defaults.performance_server_url),
            suspicious_score_check: env_or("SUSPICIOUS_SCORE_CHECK", defaults.suspicious_score_check),
            enable_rx: env_or("ENABLE_RX", defaults.enable_rx),
            enable_ap: env_or("ENABLE_AP", defaults.enable_ap),
            enable_all_mods_pp: env_or("ENABLE_ALL_MODS_PP", defaults.enable_all_mods_pp),
            disabled_pp_mods: env_list("DISABLED_PP_MODS", defaults.disabled_pp_mods),
            disable_rate_change_pp: env_or("DISABLE_RATE_CHANGE_PP", defaults.disable_rate_change_pp),
            enable_all_beatmap_pp: env_or("ENABLE_ALL_BEATMAP_PP", defaults.enable_all_beatmap_pp),
            enable_all_beatmap_leaderboard: env_or(
                "ENABLE_ALL_BEATMAP_LEADERBOARD",
                defaults.enable_all_beatmap_leaderboard,
            ),
            beatmap_cache_expire_hours: env_or(
                "BEATMAP_CACHE_EXPIRE_HOURS",
                defaults.beatmap_cache_expire_hours,
            ),
            difficulty_cache_ttl_secs: env_or(
                "DIFFICULTY_CACHE_TTL_SECS",
                defaults.difficulty_cache_ttl_secs,
            ),
            calculation_timeout_secs: env_or(
                "CALCULATION_TIMEOUT_SECS",
                defaults.calculation_timeout_secs,
            ),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            recalculate_interval_secs: env_or(
                "RECALCULATE_INTERVAL_SECS",
                defaults.recalculate_interval_secs,
            ),
            beatmap_mirrors: env_list("BEATMAP_MIRRORS", defaults.beatmap_mirrors),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| AppError::ConfigError(format!("无法打开配置文件: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AppError::ConfigError(format!("读取配置文件失败: {e}")))?;

        serde_json::from_str(&contents)
            .map_err(|e| AppError::ConfigError(format!("解析配置文件失败: {e}")))
    }

    pub fn calculation_timeout(&self) -> Duration {
        Duration::from_secs(self.calculation_timeout_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn beatmap_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.beatmap_cache_expire_hours * 60 * 60)
    }

    pub fn difficulty_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.difficulty_cache_ttl_secs)
    }

    pub fn recalculate_interval(&self) -> Duration {
        Duration::from_secs(self.recalculate_interval_secs.max(10))
    }
}
