use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::config::AppConfig;
use crate::models::beatmap::BeatmapRankStatus;
use crate::models::game_mode::GameMode;
use crate::models::mods::{APIMod, RATE_CHANGE_MODS};

/// 该设置项允许任意取值
const NO_CHECK: &str = "DO_NO_CHECK";

/// 空表表示该 mod 没有设置项，或任意设置都可以拿 pp
type ExpectedSettings = HashMap<&'static str, Value>;

fn common_config() -> HashMap<&'static str, ExpectedSettings> {
    let mut table: HashMap<&'static str, ExpectedSettings> = HashMap::new();
    table.insert("EZ", HashMap::from([("retries", json!(2))]));
    table.insert(
        "HT",
        HashMap::from([("speed_change", json!(0.75)), ("adjust_pitch", json!(NO_CHECK))]),
    );
    table.insert("DC", HashMap::from([("speed_change", json!(0.75))]));
    table.insert(
        "DT",
        HashMap::from([("speed_change", json!(1.5)), ("adjust_pitch", json!(NO_CHECK))]),
    );
    table.insert("NC", HashMap::from([("speed_change", json!(1.5))]));
    table.insert(
        "FL",
        HashMap::from([("size_multiplier", json!(1.0)), ("combo_based_size", json!(true))]),
    );
    for acronym in ["NF", "HR", "SD", "PF", "HD", "AC", "MU", "TD"] {
        table.insert(acronym, HashMap::new());
    }
    table
}

/// 各 ruleset 可以获得 pp 的 mod 及其期望设置
static RANKED_MODS: Lazy<[HashMap<&'static str, ExpectedSettings>; 4]> = Lazy::new(|| {
    let mut osu = common_config();
    let mut taiko = common_config();
    let mut catch = common_config();
    let mut mania = common_config();

    if let Some(hd) = osu.get_mut("HD") {
        hd.insert("only_fade_approach_circles", json!(false));
    }
    if let Some(fl) = osu.get_mut("FL") {
        fl.insert("follow_delay", json!(1.0));
    }
    for acronym in ["BL", "NS", "SO", "TC"] {
        osu.insert(acronym, HashMap::new());
    }

    if let Some(ez) = taiko.get_mut("EZ") {
        ez.remove("retries");
    }

    catch.insert("NS", HashMap::new());

    mania.remove("HR");
    if let Some(fl) = mania.get_mut("FL") {
        fl.insert("combo_based_size", json!(false));
    }
    mania.insert("MR", HashMap::new());
    for acronym in ["4K", "5K", "6K", "7K", "8K", "9K"] {
        mania.insert(acronym, HashMap::new());
    }

    [osu, taiko, catch, mania]
});

fn values_match(actual: &Value, expected: &Value) -> bool {
    if expected.as_str() == Some(NO_CHECK) {
        return true;
    }
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => actual == expected,
    }
}

/// pp 资格策略
#[derive(Debug, Clone)]
pub struct ModPolicy {
    enable_rx: bool,
    enable_ap: bool,
    enable_all_mods_pp: bool,
    disabled_pp_mods: Vec<String>,
    disable_rate_change_pp: bool,
    enable_all_beatmap_pp: bool,
    enable_all_beatmap_leaderboard: bool,
}

impl ModPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enable_rx: config.enable_rx,
            enable_ap: config.enable_ap,
            enable_all_mods_pp: config.enable_all_mods_pp,
            disabled_pp_mods: config.disabled_pp_mods.clone(),
            disable_rate_change_pp: config.disable_rate_change_pp,
            enable_all_beatmap_pp: config.enable_all_beatmap_pp,
            enable_all_beatmap_leaderboard: config.enable_all_beatmap_leaderboard,
        }
    }

    pub fn enable_rx(&self) -> bool {
        self.enable_rx
    }

    pub fn enable_ap(&self) -> bool {
        self.enable_ap
    }

    pub fn is_eligible_for_pp(&self, mode: GameMode, mods: &[APIMod]) -> bool {
        if self.disable_rate_change_pp
            && mods
                .iter()
                .any(|m| RATE_CHANGE_MODS.contains(&m.acronym.as_str()) && !m.settings.is_empty())
        {
            return false;
        }

        if self.enable_all_mods_pp {
            return !mods
                .iter()
                .any(|m| self.disabled_pp_mods.iter().any(|d| d == &m.acronym));
        }

        let ruleset_id = mode.ruleset_id();
        let ranked_mods = &RANKED_MODS[ruleset_id as usize];

        for m in mods {
            if self.enable_rx && m.acronym == "RX" && ruleset_id <= 2 {
                continue;
            }
            if self.enable_ap && m.acronym == "AP" && ruleset_id == 0 {
                continue;
            }

            let Some(expected) = ranked_mods.get(m.acronym.as_str()) else {
                return false;
            };
            if expected.is_empty() {
                continue;
            }
            for (setting, value) in &m.settings {
                match expected.get(setting.as_str()) {
                    Some(expected_value) if values_match(value, expected_value) => {}
                    _ => return false,
                }
            }
        }

        true
    }

    pub fn has_pp(&self, status: BeatmapRankStatus) -> bool {
        self.enable_all_beatmap_pp || status.has_pp()
    }

    /// 排行榜资格只看谱面状态，与 pp 资格相互独立
    pub fn is_eligible_for_leaderboard(&self, status: BeatmapRankStatus) -> bool {
        self.enable_all_beatmap_leaderboard || status.has_leaderboard()
    }

    /// 通过 && 谱面计 pp && mod 组合计 pp
    pub fn is_ranked_eligible(
        &self,
        passed: bool,
        status: BeatmapRankStatus,
        mode: GameMode,
        mods: &[APIMod],
    ) -> bool {
        passed && self.has_pp(status) && self.is_eligible_for_pp(mode, mods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ModPolicy {
        ModPolicy::from_config(&AppConfig::default())
    }

    #[test]
    fn vanilla_ranked_mods() {
        let p = policy();
        assert!(p.is_eligible_for_pp(GameMode::Osu, &[]));
        assert!(p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("HD"), APIMod::new("DT")]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("AT")]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("RX")]));
    }

    #[test]
    fn settings_must_match_expected_values() {
        let p = policy();
        let default_dt = APIMod::new("DT").with_setting("speed_change", json!(1.5));
        let custom_dt = APIMod::new("DT").with_setting("speed_change", json!(1.3));
        let pitch = APIMod::new("HT").with_setting("adjust_pitch", json!(true));
        let unknown = APIMod::new("DT").with_setting("mystery", json!(1));

        assert!(p.is_eligible_for_pp(GameMode::Osu, &[default_dt]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[custom_dt]));
        assert!(p.is_eligible_for_pp(GameMode::Taiko, &[pitch]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[unknown]));
    }

    #[test]
    fn ruleset_specific_tables() {
        let p = policy();
        assert!(!p.is_eligible_for_pp(GameMode::Mania, &[APIMod::new("HR")]));
        assert!(p.is_eligible_for_pp(GameMode::Mania, &[APIMod::new("7K"), APIMod::new("MR")]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("7K")]));
        assert!(p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("SO")]));
        assert!(!p.is_eligible_for_pp(GameMode::Taiko, &[APIMod::new("SO")]));

        // 太鼓的 EZ 没有期望设置，任意设置都可以
        let ez = APIMod::new("EZ").with_setting("retries", json!(5));
        assert!(p.is_eligible_for_pp(GameMode::Taiko, &[ez.clone()]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[ez]));

        let fl = APIMod::new("FL").with_setting("combo_based_size", json!(false));
        assert!(p.is_eligible_for_pp(GameMode::Mania, &[fl.clone()]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[fl]));
    }

    #[test]
    fn relax_and_autopilot_switches() {
        let p = ModPolicy::from_config(&AppConfig {
            enable_rx: true,
            enable_ap: true,
            ..AppConfig::default()
        });
        assert!(p.is_eligible_for_pp(GameMode::OsuRx, &[APIMod::new("RX")]));
        assert!(p.is_eligible_for_pp(GameMode::FruitsRx, &[APIMod::new("RX")]));
        assert!(!p.is_eligible_for_pp(GameMode::Mania, &[APIMod::new("RX")]));
        assert!(p.is_eligible_for_pp(GameMode::OsuAp, &[APIMod::new("AP")]));
        assert!(!p.is_eligible_for_pp(GameMode::Taiko, &[APIMod::new("AP")]));
    }

    #[test]
    fn all_mods_mode_and_rate_change_switch() {
        let p = ModPolicy::from_config(&AppConfig {
            enable_all_mods_pp: true,
            disabled_pp_mods: vec!["AT".into()],
            disable_rate_change_pp: true,
            ..AppConfig::default()
        });
        assert!(p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("WG")]));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("AT")]));
        assert!(p.is_eligible_for_pp(GameMode::Osu, &[APIMod::new("DT")]));
        let rate = APIMod::new("DT").with_setting("speed_change", json!(1.5));
        assert!(!p.is_eligible_for_pp(GameMode::Osu, &[rate]));
    }

    #[test]
    fn beatmap_status_gate() {
        let p = policy();
        assert!(p.has_pp(BeatmapRankStatus::Ranked));
        assert!(!p.has_pp(BeatmapRankStatus::Loved));
        assert!(!p.is_ranked_eligible(false, BeatmapRankStatus::Ranked, GameMode::Osu, &[]));

        let all = ModPolicy::from_config(&AppConfig {
            enable_all_beatmap_pp: true,
            ..AppConfig::default()
        });
        assert!(all.is_ranked_eligible(true, BeatmapRankStatus::Graveyard, GameMode::Osu, &[]));
    }

    #[test]
    fn leaderboard_gate_is_separate_from_pp() {
        let p = policy();
        assert!(p.is_eligible_for_leaderboard(BeatmapRankStatus::Loved));
        assert!(p.is_eligible_for_leaderboard(BeatmapRankStatus::Qualified));
        assert!(!p.has_pp(BeatmapRankStatus::Qualified));
        assert!(!p.is_eligible_for_leaderboard(BeatmapRankStatus::Graveyard));
        assert!(!p.is_eligible_for_leaderboard(BeatmapRankStatus::Pending));

        let all = ModPolicy::from_config(&AppConfig {
            enable_all_beatmap_leaderboard: true,
            ..AppConfig::default()
        });
        assert!(all.is_eligible_for_leaderboard(BeatmapRankStatus::Wip));
        assert!(!all.has_pp(BeatmapRankStatus::Wip));
    }
}
