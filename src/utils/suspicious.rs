//! 谱面可疑内容检测
//!
//! 纯函数，只看物件列表，不依赖计算器 / 缓存 / 数据库。
//! 命中任意一条规则即视为可疑，对应谱面的 pp 会被强制归零。

use std::fmt;

use rosu_map::section::general::GameMode as MapMode;
use rosu_map::section::hit_objects::HitObjectKind;

use crate::models::game_mode::GameMode;
use crate::utils::error::{AppError, AppResult};

const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

const MAX_OBJECTS: usize = 500_000;
/// 太鼓计算在物件多时格外昂贵
const MAX_OBJECTS_TAIKO: usize = 20_000;

/// 1 秒内 100 个物件 = 6000BPM
const DENSITY_PER_1S: usize = 100;
/// 10 秒内 250 个物件 = 1500BPM
const DENSITY_PER_10S: usize = 250;

const MAX_SLIDER_REPEATS: i32 = 1000;

const PLAYFIELD_WIDTH: f32 = 512.0;
const PLAYFIELD_HEIGHT: f32 = 384.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionReason {
    ObjectCount,
    Length,
    Density,
    SliderRepeats,
    SliderPosition,
    /// 多个物件起始时间完全相同
    Simultaneous,
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SuspicionReason::ObjectCount => "物件数量过多",
            SuspicionReason::Length => "谱面时长超过 24 小时",
            SuspicionReason::Density => "物件密度异常",
            SuspicionReason::SliderRepeats => "滑条折返次数异常",
            SuspicionReason::SliderPosition => "滑条控制点超出游玩区域",
            SuspicionReason::Simultaneous => "存在起始时间相同的物件",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Circle,
    /// `control_points` 为绝对坐标
    Slider {
        repeats: i32,
        control_points: Vec<(f32, f32)>,
    },
    Spinner,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub start_time: f64,
    pub pos: (f32, f32),
    pub kind: ObjectKind,
}

impl PlacedObject {
    pub fn circle(start_time: f64, x: f32, y: f32) -> Self {
        Self {
            start_time,
            pos: (x, y),
            kind: ObjectKind::Circle,
        }
    }
}

/// 检测用的谱面视图
#[derive(Debug, Clone)]
pub struct ParsedBeatmap {
    /// 基础模式
    pub mode: GameMode,
    /// mania 下即键数
    pub circle_size: f32,
    pub objects: Vec<PlacedObject>,
}

fn from_map_mode(mode: MapMode) -> GameMode {
    match mode {
        MapMode::Taiko => GameMode::Taiko,
        MapMode::Catch => GameMode::Fruits,
        MapMode::Mania => GameMode::Mania,
        _ => GameMode::Osu,
    }
}

/// 解析 .osu 内容
///
/// `target` 为成绩的模式；原生 osu! 谱面会按转谱后的模式检测。
pub fn parse_beatmap(raw: &str, target: Option<GameMode>) -> AppResult<ParsedBeatmap> {
    let map = rosu_map::Beatmap::from_bytes(raw.as_bytes())
        .map_err(|e| AppError::BeatmapParse(e.to_string()))?;

    let native = from_map_mode(map.mode);
    let mode = match (native, target) {
        (GameMode::Osu, Some(target)) => target.to_base_ruleset(),
        _ => native,
    };

    let objects = map
        .hit_objects
        .iter()
        .map(|h| match &h.kind {
            HitObjectKind::Circle(c) => PlacedObject {
                start_time: h.start_time,
                pos: (c.pos.x, c.pos.y),
                kind: ObjectKind::Circle,
            },
            HitObjectKind::Slider(s) => {
                let head = (s.pos.x, s.pos.y);
                let control_points = s
                    .path
                    .control_points()
                    .iter()
                    .map(|cp| (head.0 + cp.pos.x, head.1 + cp.pos.y))
                    .collect();
                PlacedObject {
                    start_time: h.start_time,
                    pos: head,
                    kind: ObjectKind::Slider {
                        repeats: s.repeat_count,
                        control_points,
                    },
                }
            }
            HitObjectKind::Spinner(s) => PlacedObject {
                start_time: h.start_time,
                pos: (s.pos.x, s.pos.y),
                kind: ObjectKind::Spinner,
            },
            HitObjectKind::Hold(hold) => PlacedObject {
                start_time: h.start_time,
                pos: (hold.pos_x, PLAYFIELD_HEIGHT / 2.0),
                kind: ObjectKind::Hold,
            },
        })
        .collect();

    Ok(ParsedBeatmap {
        mode,
        circle_size: map.circle_size,
        objects,
    })
}

fn too_many_objects(map: &ParsedBeatmap) -> bool {
    match map.mode {
        GameMode::Taiko => map.objects.len() > MAX_OBJECTS_TAIKO,
        _ => map.objects.len() > MAX_OBJECTS,
    }
}

fn too_long(objects: &[PlacedObject]) -> bool {
    match objects {
        [first, .., last] => last.start_time - first.start_time > DAY_MS,
        _ => false,
    }
}

fn density_windows(map: &ParsedBeatmap) -> (usize, usize) {
    match map.mode {
        GameMode::Taiko => (DENSITY_PER_1S * 2, DENSITY_PER_10S * 2),
        GameMode::Mania => {
            let lanes_per_hand = (map.circle_size / 2.0).max(1.0);
            (
                (DENSITY_PER_1S as f32 * lanes_per_hand) as usize,
                (DENSITY_PER_10S as f32 * lanes_per_hand) as usize,
            )
        }
        _ => (DENSITY_PER_1S, DENSITY_PER_10S),
    }
}

fn too_dense(objects: &[PlacedObject], per_1s: usize, per_10s: usize) -> bool {
    objects.iter().enumerate().any(|(i, curr)| {
        let within = |k: usize, span: f64| {
            objects
                .get(i + k)
                .is_some_and(|other| other.start_time - curr.start_time < span)
        };
        within(per_1s, 1000.0) || within(per_10s, 10_000.0)
    })
}

fn outside_playfield((x, y): (f32, f32)) -> bool {
    x < -PLAYFIELD_WIDTH
        || x > PLAYFIELD_WIDTH * 2.0
        || y < -PLAYFIELD_HEIGHT
        || y > PLAYFIELD_HEIGHT * 2.0
}

fn check_geometry(objects: &[PlacedObject]) -> Option<SuspicionReason> {
    for obj in objects {
        if let ObjectKind::Slider {
            repeats,
            control_points,
        } = &obj.kind
        {
            if *repeats > MAX_SLIDER_REPEATS {
                return Some(SuspicionReason::SliderRepeats);
            }
            if outside_playfield(obj.pos) || control_points.iter().copied().any(outside_playfield) {
                return Some(SuspicionReason::SliderPosition);
            }
        }
    }
    None
}

fn has_simultaneous(objects: &[PlacedObject]) -> bool {
    objects
        .windows(2)
        .any(|pair| pair[0].start_time == pair[1].start_time)
}

/// 返回命中的第一条规则，未命中返回 `None`
pub fn check_suspicion(map: &ParsedBeatmap) -> Option<SuspicionReason> {
    if too_many_objects(map) {
        return Some(SuspicionReason::ObjectCount);
    }

    let mut objects: Vec<&PlacedObject> = map.objects.iter().collect();
    objects.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let objects: Vec<PlacedObject> = objects.into_iter().cloned().collect();

    if too_long(&objects) {
        return Some(SuspicionReason::Length);
    }

    let (run_density, run_geometry, run_simultaneous) = match map.mode {
        GameMode::Mania => (true, false, false),
        GameMode::Fruits => (false, true, true),
        _ => (true, true, true),
    };

    if run_density {
        let (per_1s, per_10s) = density_windows(map);
        if too_dense(&objects, per_1s, per_10s) {
            return Some(SuspicionReason::Density);
        }
    }

    if run_geometry {
        if let Some(reason) = check_geometry(&objects) {
            return Some(reason);
        }
    }

    if run_simultaneous && has_simultaneous(&objects) {
        return Some(SuspicionReason::Simultaneous);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(mode: GameMode, objects: Vec<PlacedObject>) -> ParsedBeatmap {
        ParsedBeatmap {
            mode,
            circle_size: 4.0,
            objects,
        }
    }

    /// 每 `gap` 毫秒一个物件
    fn stream(count: usize, gap: f64) -> Vec<PlacedObject> {
        (0..count)
            .map(|i| PlacedObject::circle(i as f64 * gap, 256.0, 192.0))
            .collect()
    }

    fn slider(start_time: f64, repeats: i32, control_points: Vec<(f32, f32)>) -> PlacedObject {
        PlacedObject {
            start_time,
            pos: (100.0, 100.0),
            kind: ObjectKind::Slider {
                repeats,
                control_points,
            },
        }
    }

    #[test]
    fn normal_map_is_clean() {
        for mode in [GameMode::Osu, GameMode::Taiko, GameMode::Fruits, GameMode::Mania] {
            assert_eq!(check_suspicion(&map(mode, stream(2000, 120.0))), None);
        }
        assert_eq!(check_suspicion(&map(GameMode::Osu, Vec::new())), None);
    }

    #[test]
    fn object_ceiling_depends_on_mode() {
        let objects = stream(600_001, 100.0);
        let osu = map(GameMode::Osu, objects);
        assert_eq!(check_suspicion(&osu), Some(SuspicionReason::ObjectCount));

        let taiko = map(GameMode::Taiko, stream(20_001, 200.0));
        assert_eq!(check_suspicion(&taiko), Some(SuspicionReason::ObjectCount));
        let osu = map(GameMode::Osu, stream(20_001, 200.0));
        assert_eq!(check_suspicion(&osu), None);
    }

    #[test]
    fn day_long_map_is_flagged() {
        let objects = vec![
            PlacedObject::circle(0.0, 0.0, 0.0),
            PlacedObject::circle(DAY_MS + 1.0, 0.0, 0.0),
        ];
        assert_eq!(check_suspicion(&map(GameMode::Fruits, objects)), Some(SuspicionReason::Length));
    }

    #[test]
    fn density_windows_scale_per_mode() {
        // 101 个物件挤在 1 秒内
        let burst = stream(101, 9.0);
        assert_eq!(check_suspicion(&map(GameMode::Osu, burst.clone())), Some(SuspicionReason::Density));
        // 太鼓窗口加倍
        assert_eq!(check_suspicion(&map(GameMode::Taiko, burst.clone())), None);
        // 4K mania 每只手两条轨道
        assert_eq!(check_suspicion(&map(GameMode::Mania, burst.clone())), None);
        // 接水果不检测密度
        assert_eq!(check_suspicion(&map(GameMode::Fruits, burst)), None);

        let mut seven_key = map(GameMode::Mania, stream(301, 3.0));
        seven_key.circle_size = 7.0;
        assert_eq!(check_suspicion(&seven_key), None);
        seven_key.objects = stream(351, 2.0);
        assert_eq!(check_suspicion(&seven_key), Some(SuspicionReason::Density));
    }

    #[test]
    fn ten_second_window() {
        // 251 个物件在 10 秒内，但任意 1 秒内不到 100 个
        let objects = stream(251, 39.0);
        assert_eq!(check_suspicion(&map(GameMode::Osu, objects)), Some(SuspicionReason::Density));
    }

    #[test]
    fn slider_geometry() {
        let repeats = vec![slider(0.0, 1001, vec![(100.0, 100.0)])];
        assert_eq!(check_suspicion(&map(GameMode::Osu, repeats)), Some(SuspicionReason::SliderRepeats));

        let far = vec![slider(0.0, 1, vec![(100.0, 100.0), (1025.0, 100.0)])];
        assert_eq!(check_suspicion(&map(GameMode::Fruits, far.clone())), Some(SuspicionReason::SliderPosition));
        // mania 不检测几何
        assert_eq!(check_suspicion(&map(GameMode::Mania, far)), None);

        let edge = vec![slider(0.0, 1000, vec![(-512.0, 768.0), (1024.0, -384.0)])];
        assert_eq!(check_suspicion(&map(GameMode::Osu, edge)), None);
    }

    #[test]
    fn identical_start_times() {
        let mut objects = stream(10, 200.0);
        objects.push(PlacedObject::circle(400.0, 10.0, 10.0));
        assert_eq!(check_suspicion(&map(GameMode::Taiko, objects.clone())), Some(SuspicionReason::Simultaneous));
        // mania 和弦是正常的
        assert_eq!(check_suspicion(&map(GameMode::Mania, objects)), None);
    }

    const SAMPLE_OSU: &str = "osu file format v14

[General]
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
256,192,1000,1,0,0:0:0:0:
256,192,1500,1,0,0:0:0:0:
100,100,2000,2,0,L|200:100,1,100
";

    #[test]
    fn parse_converts_relative_control_points() {
        let parsed = parse_beatmap(SAMPLE_OSU, None).unwrap();
        assert_eq!(parsed.mode, GameMode::Osu);
        assert_eq!(parsed.objects.len(), 3);
        match &parsed.objects[2].kind {
            ObjectKind::Slider { control_points, .. } => {
                assert!(control_points.iter().any(|&(x, y)| x == 200.0 && y == 100.0));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(check_suspicion(&parsed), None);

        let converted = parse_beatmap(SAMPLE_OSU, Some(GameMode::TaikoRx)).unwrap();
        assert_eq!(converted.mode, GameMode::Taiko);
    }
}
