//! 测试用桩实现与样例数据

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::beatmap::{Beatmap, BeatmapRankStatus, MapContent};
use crate::models::game_mode::{GameMode, Rank};
use crate::models::mods::APIMod;
use crate::models::performance::{
    DifficultyAttributes, GenericDifficultyAttributes, GenericPerformanceAttributes,
    PerformanceAttributes,
};
use crate::models::score::{HitStatistics, PpStatus, Score, ScoreSubmission};
use crate::services::beatmap::{checksum, BeatmapService, MapContentStore};
use crate::services::calculator::{AvailableModes, CalculateError, PerformanceCalculator};
use crate::utils::error::{AppError, AppResult};

pub const OSU_MAP: &str = "osu file format v14

[General]
AudioFilename: audio.mp3
Mode: 0

[Difficulty]
HPDrainRate:5
CircleSize:4
OverallDifficulty:8
ApproachRate:9
SliderMultiplier:1.4
SliderTickRate:1

[TimingPoints]
0,500,4,2,0,100,1,0

[HitObjects]
64,96,1000,1,0,0:0:0:0:
192,96,1500,1,0,0:0:0:0:
320,96,2000,1,0,0:0:0:0:
448,96,2500,1,0,0:0:0:0:
448,288,3000,1,0,0:0:0:0:
320,288,3500,1,0,0:0:0:0:
192,288,4000,1,0,0:0:0:0:
64,288,4500,1,0,0:0:0:0:
100,192,5000,2,0,L|300:192,1,200
";

pub const MANIA_MAP: &str = "osu file format v14

[General]
AudioFilename: audio.mp3
Mode: 3

[Difficulty]
HPDrainRate:8
CircleSize:4
OverallDifficulty:8
ApproachRate:5
SliderMultiplier:1.4
SliderTickRate:1

[TimingPoints]
0,500,4,2,0,100,1,0

[HitObjects]
64,192,1000,1,0,0:0:0:0:
192,192,1250,1,0,0:0:0:0:
320,192,1500,1,0,0:0:0:0:
448,192,1750,1,0,0:0:0:0:
64,192,2000,128,0,2500:0:0:0:0:
";

/// 1 秒内塞进 120 个物件
pub static DENSE_MAP: Lazy<String> = Lazy::new(|| {
    let mut raw = String::from(
        "osu file format v14\n\n[General]\nMode: 0\n\n[Difficulty]\nCircleSize:4\nOverallDifficulty:8\nApproachRate:9\n\n[TimingPoints]\n0,500,4,2,0,100,1,0\n\n[HitObjects]\n",
    );
    for i in 0..120 {
        raw.push_str(&format!("256,192,{},1,0,0:0:0:0:\n", 1000 + i * 5));
    }
    raw
});

/// 任意数量物件的标准模式谱面
pub fn osu_map_with_objects(count: usize) -> String {
    let mut raw = String::with_capacity(count * 28 + 200);
    raw.push_str(
        "osu file format v14\n\n[General]\nMode: 0\n\n[Difficulty]\nCircleSize:4\nOverallDifficulty:8\n\n[TimingPoints]\n0,500,4,2,0,100,1,0\n\n[HitObjects]\n",
    );
    for i in 0..count {
        raw.push_str(&format!("256,192,{},1,0,0:0:0:0:\n", i * 100));
    }
    raw
}

pub fn sample_score(user_id: i64, beatmap_id: i64, mode: GameMode) -> Score {
    let ended_at = Utc::now();
    Score {
        id: 0,
        user_id,
        beatmap_id,
        map_md5: String::new(),
        gamemode: mode,
        mods: Vec::new(),
        accuracy: 0.98,
        max_combo: 10,
        rank: Rank::S,
        passed: true,
        ranked: true,
        leaderboard_eligible: true,
        pp: 0.0,
        pp_status: PpStatus::Unset,
        total_score: 900_000,
        statistics: HitStatistics {
            great: 8,
            ok: 1,
            slider_tail_hit: 1,
            ..Default::default()
        },
        started_at: ended_at - ChronoDuration::seconds(60),
        ended_at,
    }
}

pub fn sample_submission(user_id: i64, ruleset_id: i64, total_score: i64, rank: Rank) -> ScoreSubmission {
    let ended_at = Utc::now();
    ScoreSubmission {
        user_id,
        ruleset_id,
        beatmap_checksum: None,
        mods: Vec::new(),
        statistics: HitStatistics {
            great: 8,
            ok: 1,
            miss: 1,
            ..Default::default()
        },
        accuracy: 0.95,
        max_combo: 9,
        rank,
        passed: true,
        total_score,
        started_at: Some(ended_at - ChronoDuration::seconds(40)),
        ended_at: Some(ended_at),
    }
}

pub async fn seed_beatmap(pool: &SqlitePool, id: i64, status: BeatmapRankStatus, mode: GameMode) {
    BeatmapService::new(pool.clone())
        .upsert_beatmap(&Beatmap {
            id,
            checksum: String::new(),
            status,
            mode,
            total_length: 30,
            max_combo: 10,
        })
        .await
        .unwrap();
}

type PpFn = Box<dyn Fn(&Score) -> Result<f64, CalculateError> + Send + Sync>;

/// 按脚本返回 pp 的计算器
pub struct StubCalculator {
    pp_fn: PpFn,
    failure: Mutex<Option<CalculateError>>,
    delay: Option<Duration>,
    modes: HashSet<GameMode>,
    modes_unreachable: bool,
    performance_calls: AtomicUsize,
    difficulty_calls: AtomicUsize,
}

impl StubCalculator {
    pub fn from_fn(f: impl Fn(&Score) -> Result<f64, CalculateError> + Send + Sync + 'static) -> Self {
        Self {
            pp_fn: Box::new(f),
            failure: Mutex::new(None),
            delay: None,
            modes: [GameMode::Osu, GameMode::Taiko, GameMode::Fruits, GameMode::Mania]
                .into_iter()
                .collect(),
            modes_unreachable: false,
            performance_calls: AtomicUsize::new(0),
            difficulty_calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(pp: f64) -> Self {
        Self::from_fn(move |_| Ok(pp))
    }

    pub fn failing(err: CalculateError) -> Self {
        let stub = Self::fixed(0.0);
        stub.set_failure(Some(err));
        stub
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without_mode(mut self, mode: GameMode) -> Self {
        self.modes.remove(&mode);
        self
    }

    /// 能力查询也失败，模拟远程计算器整体不可用
    pub fn with_modes_unreachable(mut self) -> Self {
        self.modes_unreachable = true;
        self
    }

    pub fn set_failure(&self, err: Option<CalculateError>) {
        *self.failure.lock().unwrap() = err;
    }

    pub fn performance_calls(&self) -> usize {
        self.performance_calls.load(Ordering::SeqCst)
    }

    pub fn difficulty_calls(&self) -> usize {
        self.difficulty_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerformanceCalculator for StubCalculator {
    async fn get_available_modes(&self) -> Result<AvailableModes, CalculateError> {
        if self.modes_unreachable {
            return Err(CalculateError::Other("available_rulesets unreachable".into()));
        }
        Ok(AvailableModes {
            has_performance_calculator: self.modes.clone(),
            has_difficulty_calculator: self.modes.clone(),
        })
    }

    async fn calculate_performance(
        &self,
        _beatmap_raw: Arc<str>,
        score: &Score,
    ) -> Result<PerformanceAttributes, CalculateError> {
        self.performance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let pp = (self.pp_fn)(score)?;
        Ok(PerformanceAttributes::Generic(GenericPerformanceAttributes { pp }))
    }

    async fn calculate_difficulty(
        &self,
        _beatmap_raw: Arc<str>,
        mods: &[APIMod],
        _mode: Option<GameMode>,
    ) -> Result<DifficultyAttributes, CalculateError> {
        self.difficulty_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(DifficultyAttributes::Generic(GenericDifficultyAttributes {
            star_rating: 5.0 + mods.len() as f64,
            max_combo: 10,
        }))
    }
}

/// 内存中的谱面内容
#[derive(Default)]
pub struct StubContentStore {
    maps: Mutex<HashMap<i64, String>>,
    fetches: AtomicUsize,
}

impl StubContentStore {
    pub fn with_map(beatmap_id: i64, raw: &str) -> Self {
        let store = Self::default();
        store.insert(beatmap_id, raw);
        store
    }

    pub fn insert(&self, beatmap_id: i64, raw: &str) {
        self.maps.lock().unwrap().insert(beatmap_id, raw.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MapContentStore for StubContentStore {
    async fn get_or_fetch(&self, beatmap_id: i64) -> AppResult<MapContent> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let raw = self
            .maps
            .lock()
            .unwrap()
            .get(&beatmap_id)
            .cloned()
            .ok_or_else(|| AppError::ContentFetch(format!("谱面 {beatmap_id} 不存在")))?;
        Ok(MapContent {
            beatmap_id,
            checksum: checksum(&raw),
            raw: Arc::from(raw),
        })
    }
}
