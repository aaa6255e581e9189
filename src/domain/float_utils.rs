// ==========================================
// 生产序列号矩阵 - 浮点数量比较工具
// ==========================================
// 数量比较一律按计量单位舍入精度进行, 不直接使用 ==
// ==========================================

/// 按舍入精度取整（半数向上, 远离零）
///
/// # 参数
/// - value: 原始数值
/// - rounding: 舍入精度（如 0.01）, 非正数时原样返回
pub fn float_round(value: f64, rounding: f64) -> f64 {
    if rounding <= 0.0 {
        return value;
    }
    let steps = value / rounding;
    // 补偿二进制表示误差, 避免 2.675 / 0.01 = 267.49999...
    let epsilon = steps.abs().max(1.0) * f64::EPSILON * 4.0;
    (steps + epsilon.copysign(steps)).round() * rounding
}

/// 在舍入精度内是否为零
pub fn float_is_zero(value: f64, rounding: f64) -> bool {
    if rounding <= 0.0 {
        return value == 0.0;
    }
    float_round(value, rounding).abs() < rounding
}

/// 小数位数转换为舍入精度（2 → 0.01）
pub fn digits_to_rounding(digits: u32) -> f64 {
    10f64.powi(-(digits as i32))
}

/// 按小数位数比较两个数值
///
/// # 返回
/// - -1: value1 < value2
/// - 0: 相等（精度内）
/// - 1: value1 > value2
pub fn float_compare(value1: f64, value2: f64, digits: u32) -> i8 {
    let rounding = digits_to_rounding(digits);
    let delta = float_round(value1, rounding) - float_round(value2, rounding);
    if float_is_zero(delta, rounding) {
        0
    } else if delta < 0.0 {
        -1
    } else {
        1
    }
}
