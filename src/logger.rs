//! 日志初始化

use tracing::Level;

use crate::config::LoggingConfig;

/// 解析日志级别，无法识别时使用 `info`
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// 安装全局 fmt 订阅者
///
/// 只有第一次调用生效，返回是否本次完成了安装。
pub fn init(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }
    tracing_subscriber::fmt()
        .with_max_level(parse_level(&config.level))
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARN "), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_init_disabled() {
        let config = LoggingConfig {
            enabled: false,
            ..LoggingConfig::default()
        };
        assert!(!init(&config));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
