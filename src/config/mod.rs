//! 配置管理模块
//!
//! 提供 YAML 配置文件支持：Shell 传输、Binder 桥接、后端选择顺序和日志级别。

mod types;
mod yaml;

pub use types::{BinderConfig, BrokerConfig, LoggingConfig, ShellConfig};
pub use yaml::{load_config, ConfigError, ConfigManager};
