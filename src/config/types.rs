//! 配置类型定义
//!
//! 定义特权代理的配置结构，支持 YAML 序列化/反序列化，缺省字段使用默认值。

use serde::{Deserialize, Serialize};

use crate::backends::{BackendCapability, DEFAULT_BACKEND_ORDER};

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    /// 特权 Shell 配置
    #[serde(default)]
    pub shell: ShellConfig,
    /// Binder 桥接配置
    #[serde(default)]
    pub binder: BinderConfig,
    /// 后端选择顺序（靠前者优先）
    #[serde(default = "default_backend_order")]
    pub backend_order: Vec<BackendCapability>,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_backend_order() -> Vec<BackendCapability> {
    DEFAULT_BACKEND_ORDER.to_vec()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            shell: ShellConfig::default(),
            binder: BinderConfig::default(),
            backend_order: default_backend_order(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============ Shell 配置 ============

/// 特权 Shell 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    /// Shell 可执行文件
    #[serde(default = "default_shell_binary")]
    pub binary: String,
    /// 启动参数
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// root 探测命令，输出 `0` 视为拥有 root
    #[serde(default = "default_root_probe")]
    pub root_probe: String,
}

fn default_shell_binary() -> String {
    "su".to_string()
}

fn default_root_probe() -> String {
    "id -u".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            binary: default_shell_binary(),
            args: Vec::new(),
            root_probe: default_root_probe(),
        }
    }
}

impl ShellConfig {
    /// 使用普通 `sh` 作为传输（无 root，主要用于测试和调试）
    pub fn plain_sh() -> Self {
        Self {
            binary: "sh".to_string(),
            ..Self::default()
        }
    }
}

// ============ Binder 配置 ============

/// Binder 桥接配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinderConfig {
    /// 系统 API 级别；为空时启动时通过 `getprop` 探测
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_int: Option<u32>,
    /// 目标用户 ID
    #[serde(default)]
    pub user_id: i32,
    /// 调用方包名（setApplicationEnabledSetting 需要）
    #[serde(default = "default_calling_package")]
    pub calling_package: String,
    /// 权限请求码
    #[serde(default = "default_permission_request_code")]
    pub permission_request_code: i32,
}

fn default_calling_package() -> String {
    "com.android.shell".to_string()
}

fn default_permission_request_code() -> i32 {
    1001
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            sdk_int: None,
            user_id: 0,
            calling_package: default_calling_package(),
            permission_request_code: default_permission_request_code(),
        }
    }
}

// ============ 日志配置 ============

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 是否启用日志
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            level: default_log_level(),
        }
    }
}
