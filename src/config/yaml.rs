//! YAML 配置文件支持
//!
//! 提供配置的加载、保存功能，文件不存在时返回默认配置。

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::BrokerConfig;
use crate::backends::BackendCapability;

/// 配置错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("配置读取错误: {0}")]
    ReadError(String),
    /// 文件写入错误
    #[error("配置写入错误: {0}")]
    WriteError(String),
    /// YAML 解析错误
    #[error("YAML 解析错误: {0}")]
    ParseError(String),
    /// YAML 序列化错误
    #[error("YAML 序列化错误: {0}")]
    SerializeError(String),
    /// 配置验证错误
    #[error("配置验证错误: {0}")]
    ValidationError(String),
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 当前配置
    config: BrokerConfig,
    /// 配置文件路径
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器（默认配置）
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config: BrokerConfig::default(),
            config_path,
        }
    }

    /// 从文件加载配置
    ///
    /// 如果文件不存在，返回默认配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
            Self::parse_yaml(&content)?
        } else {
            tracing::debug!("[配置] 配置文件不存在，使用默认配置: {:?}", path);
            BrokerConfig::default()
        };

        Ok(Self {
            config,
            config_path: path.to_path_buf(),
        })
    }

    /// 从 YAML 字符串解析并验证配置
    pub fn parse_yaml(yaml: &str) -> Result<BrokerConfig, ConfigError> {
        let config: BrokerConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 将配置序列化为 YAML 字符串
    pub fn to_yaml(config: &BrokerConfig) -> Result<String, ConfigError> {
        serde_yaml::to_string(config).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    fn validate(config: &BrokerConfig) -> Result<(), ConfigError> {
        if config.shell.binary.trim().is_empty() {
            return Err(ConfigError::ValidationError("shell.binary 不能为空".into()));
        }
        if config.backend_order.is_empty() {
            return Err(ConfigError::ValidationError(
                "backend_order 至少包含一个后端".into(),
            ));
        }
        if config.backend_order.contains(&BackendCapability::None) {
            return Err(ConfigError::ValidationError(
                "backend_order 不能包含 none".into(),
            ));
        }
        Ok(())
    }

    /// 保存配置到文件
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&self.config_path)
    }

    /// 保存配置到指定路径
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        let yaml = Self::to_yaml(&self.config)?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    /// 获取当前配置
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// 设置配置
    pub fn set_config(&mut self, config: BrokerConfig) {
        self.config = config;
    }

    /// 获取配置文件路径
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 获取默认配置文件路径
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("privbroker")
            .join("config.yaml")
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Self::default_config_path())
    }
}

/// 从默认路径加载配置
pub fn load_config() -> Result<BrokerConfig, ConfigError> {
    ConfigManager::load(&ConfigManager::default_config_path()).map(|m| m.config)
}
