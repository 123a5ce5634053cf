use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// lazer 客户端提交的 mod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct APIMod {
    pub acronym: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub settings: BTreeMap<String, Value>,
}

impl APIMod {
    pub fn new(acronym: impl Into<String>) -> Self {
        Self {
            acronym: acronym.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

pub const RATE_CHANGE_MODS: [&str; 4] = ["DT", "NC", "HT", "DC"];

/// 旧版 mod 位
pub fn legacy_bit(acronym: &str) -> u32 {
    match acronym {
        "NF" => 1 << 0,
        "EZ" => 1 << 1,
        "TD" => 1 << 2,
        "HD" => 1 << 3,
        "HR" => 1 << 4,
        "SD" => 1 << 5,
        "DT" => 1 << 6,
        "RX" => 1 << 7,
        "HT" => 1 << 8,
        "NC" => (1 << 9) | (1 << 6),
        "FL" => 1 << 10,
        "AT" => 1 << 11,
        "SO" => 1 << 12,
        "AP" => 1 << 13,
        "PF" => (1 << 14) | (1 << 5),
        "4K" => 1 << 15,
        "5K" => 1 << 16,
        "6K" => 1 << 17,
        "7K" => 1 << 18,
        "8K" => 1 << 19,
        "FI" => 1 << 20,
        "RD" => 1 << 21,
        "CN" => 1 << 22,
        "TP" => 1 << 23,
        "9K" => 1 << 24,
        "CO" => 1 << 25,
        "1K" => 1 << 26,
        "3K" => 1 << 27,
        "2K" => 1 << 28,
        "SV2" => 1 << 29,
        "MR" => 1 << 30,
        _ => 0,
    }
}

pub fn mods_to_legacy(mods: &[APIMod]) -> u32 {
    mods.iter().fold(0, |acc, m| acc | legacy_bit(&m.acronym))
}

/// DT/NC/HT/DC 的 speed_change 连乘
pub fn speed_rate(mods: &[APIMod]) -> f64 {
    mods.iter()
        .filter(|m| RATE_CHANGE_MODS.contains(&m.acronym.as_str()))
        .map(|m| {
            m.settings
                .get("speed_change")
                .and_then(Value::as_f64)
                .unwrap_or(1.0)
        })
        .product()
}

/// 去重并排序后的缩写，用于持久化
pub fn mod_to_save(mods: &[APIMod]) -> Vec<String> {
    let mut acronyms: Vec<String> = mods.iter().map(|m| m.acronym.clone()).collect();
    acronyms.sort();
    acronyms.dedup();
    acronyms
}

/// 与顺序无关的 mod 组合哈希，作为难度缓存键的一部分
pub fn mods_hash(mods: &[APIMod]) -> String {
    let mut sorted: Vec<&APIMod> = mods.iter().collect();
    sorted.sort_by(|a, b| a.acronym.cmp(&b.acronym));

    let mut hasher = Md5::new();
    for m in sorted {
        hasher.update(m.acronym.as_bytes());
        // BTreeMap 序列化后键有序
        if let Ok(settings) = serde_json::to_string(&m.settings) {
            hasher.update(settings.as_bytes());
        }
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nightcore_and_perfect_imply_parent_bits() {
        let mods = vec![APIMod::new("NC"), APIMod::new("PF"), APIMod::new("HD")];
        let bits = mods_to_legacy(&mods);
        assert_eq!(bits & 64, 64);
        assert_eq!(bits & 32, 32);
        assert_eq!(bits & 8, 8);
        assert_eq!(mods_to_legacy(&[APIMod::new("XX")]), 0);
    }

    #[test]
    fn speed_rate_multiplies_rate_mods() {
        let mods = vec![
            APIMod::new("DT").with_setting("speed_change", json!(1.2)),
            APIMod::new("HD"),
        ];
        assert!((speed_rate(&mods) - 1.2).abs() < 1e-9);
        assert_eq!(speed_rate(&[APIMod::new("DT")]), 1.0);
        assert_eq!(speed_rate(&[]), 1.0);
    }

    #[test]
    fn hash_ignores_order_but_not_settings() {
        let a = vec![APIMod::new("HD"), APIMod::new("DT")];
        let b = vec![APIMod::new("DT"), APIMod::new("HD")];
        let c = vec![
            APIMod::new("DT").with_setting("speed_change", json!(1.3)),
            APIMod::new("HD"),
        ];
        assert_eq!(mods_hash(&a), mods_hash(&b));
        assert_ne!(mods_hash(&a), mods_hash(&c));
        assert_eq!(mod_to_save(&b), vec!["DT".to_string(), "HD".to_string()]);
    }
}
