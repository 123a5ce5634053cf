//! 等级与总分之间的换算，需要和客户端公布的等级表完全一致。

use once_cell::sync::Lazy;

/// 表外每级所需分数
const OVERFLOW_STEP: f64 = 99_999_999_999.0;
/// 100 级对应的分数
const LEVEL_100_SCORE: f64 = 26_931_190_827.0;

/// 到达 `level` 级需要的累计分数
pub fn score_from_level(level: u32) -> f64 {
    let n = level as f64;
    if level <= 100 {
        5000.0 / 3.0 * (4.0 * n.powi(3) - 3.0 * n.powi(2) - n) + 1.25 * 1.8_f64.powf(n - 60.0)
    } else {
        LEVEL_100_SCORE + OVERFLOW_STEP * (n - 100.0)
    }
}

/// `TO_NEXT_LEVEL[i]` 为从 i+1 级升到 i+2 级所需分数
static TO_NEXT_LEVEL: Lazy<Vec<f64>> = Lazy::new(|| {
    (1..=100)
        .map(|n| (score_from_level(n + 1) - score_from_level(n)).round())
        .collect()
});

/// 由总分计算带小数的等级，0 分为 1 级
pub fn level_from_score(total_score: i64) -> f64 {
    let mut remaining = total_score.max(0) as f64;
    let mut level = 0.0_f64;

    for &next in TO_NEXT_LEVEL.iter() {
        if remaining <= 0.0 {
            return level + 1.0;
        }
        level += (remaining / next).min(1.0);
        remaining -= next;
    }

    // 表外每级分数相同，直接折算
    if remaining > 0.0 {
        level += remaining / OVERFLOW_STEP;
    }
    level + 1.0
}
