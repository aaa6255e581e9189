// ==========================================
// 生产序列号矩阵 - 日志系统初始化
// ==========================================
// CLI: 输出到 stderr（stdout 保留给 JSON 结果）, 默认只开本 crate 的 info
// 测试: 输出到测试捕获, 本 crate debug, 依赖库 warn
// RUST_LOG 存在时覆盖默认过滤器
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// CLI 默认过滤器
pub const DEFAULT_FILTER: &str = "warn,mrp_serial_matrix=info";

/// 测试默认过滤器
pub const TEST_FILTER: &str = "warn,mrp_serial_matrix=debug";

/// 读取 RUST_LOG, 未设置或无法解析时使用给定默认值
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 初始化 CLI 日志
///
/// ```no_run
/// mrp_serial_matrix::logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();
}

/// 初始化测试日志（可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter(TEST_FILTER))
        .with_test_writer()
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_scope_crate_level() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
        assert!(TEST_FILTER.parse::<EnvFilter>().is_ok());
        assert!(DEFAULT_FILTER.contains("mrp_serial_matrix=info"));
        assert!(TEST_FILTER.contains("mrp_serial_matrix=debug"));
    }

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
        tracing::debug!("日志已初始化");
    }
}
