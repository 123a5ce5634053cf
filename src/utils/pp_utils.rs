use log::debug;

/// 单次成绩 pp 的可信上限
pub const PP_SANITY_CEILING: f64 = 3000.0;

const WEIGHT_DECAY: f64 = 0.95;

/// 第 i 个 BP 的权重 (从 0 开始)
pub fn weight(index: usize) -> f64 {
    WEIGHT_DECAY.powi(index as i32)
}

/// 由 BP 列表计算总 pp 与准确率
///
/// `entries` 为 (pp, acc) 列表，acc 取 0..1，函数内部会按 pp 降序排序。
/// 返回的准确率取 0..100。
pub fn calculate_user_pp(entries: &[(f64, f64)]) -> (f64, f64) {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut pp_sum = 0.0;
    let mut acc_sum = 0.0;
    for (i, (pp, acc)) in sorted.iter().enumerate() {
        let w = weight(i);
        pp_sum += pp * w;
        acc_sum += acc * w;
    }

    let n = sorted.len();
    let accuracy = if n == 0 {
        0.0
    } else {
        let bonus = 100.0 / (20.0 * (1.0 - WEIGHT_DECAY.powi(n as i32)));
        (acc_sum * bonus).clamp(0.0, 100.0)
    };

    debug!("BP 数量 {n}，加权 pp {pp_sum:.2}，加权准确率 {accuracy:.2}");
    (pp_sum, accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_decay_geometrically() {
        assert_eq!(weight(0), 1.0);
        assert!((weight(1) - 0.95).abs() < 1e-12);
        assert!((weight(10) - 0.95_f64.powi(10)).abs() < 1e-12);
    }

    #[test]
    fn unsorted_input_is_weighted_by_rank() {
        let (pp, _) = calculate_user_pp(&[(100.0, 1.0), (200.0, 1.0)]);
        assert!((pp - (200.0 + 100.0 * 0.95)).abs() < 1e-9);
    }

    #[test]
    fn accuracy_is_normalised_and_clamped() {
        assert_eq!(calculate_user_pp(&[]), (0.0, 0.0));

        // 单个 100% 成绩：1 * 100 / (20 * 0.05) = 100
        let (_, acc) = calculate_user_pp(&[(50.0, 1.0)]);
        assert!((acc - 100.0).abs() < 1e-9);

        let entries: Vec<(f64, f64)> = (0..200).map(|i| (1000.0 - i as f64, 0.97)).collect();
        let (_, acc) = calculate_user_pp(&entries);
        assert!((0.0..=100.0).contains(&acc));
        assert!((acc - 97.0).abs() < 1e-6);
    }
}
