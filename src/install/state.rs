//! 安装状态定义

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 安装包元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub package_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub version_name: String,
    pub version_code: i64,
}

/// 已安装版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version_name: String,
    pub version_code: i64,
}

/// 需要用户确认时系统给出的确认请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationIntent {
    /// 确认界面的 Intent action
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl ConfirmationIntent {
    /// 从回调负载解析；缺少 action 或 action 为空时返回 `None`
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let intent: Self = serde_json::from_value(payload.clone()).ok()?;
        if intent.action.trim().is_empty() {
            return None;
        }
        Some(intent)
    }
}

/// 安装状态
///
/// `Success` 与 `Error` 为终态，进入后忽略后续系统事件，只能通过 `reset` 回到 `Idle`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallState {
    #[default]
    Idle,
    Parsing,
    ReadyToInstall {
        metadata: PackageMetadata,
        is_update: bool,
        is_downgrade: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_version: Option<String>,
    },
    Installing {
        /// 进度 0.0 ~ 1.0
        progress: f32,
    },
    Success,
    Error {
        message: String,
    },
    UserConfirmationRequired {
        confirmation: ConfirmationIntent,
    },
}

impl InstallState {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. })
    }

    /// 状态名（日志用）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::ReadyToInstall { .. } => "ready_to_install",
            Self::Installing { .. } => "installing",
            Self::Success => "success",
            Self::Error { .. } => "error",
            Self::UserConfirmationRequired { .. } => "user_confirmation_required",
        }
    }

    /// 是否接受系统回调带来的状态
    ///
    /// 只有安装中或等待确认时才接受结果；终态之后一律忽略。
    pub fn accepts_os_update(&self, next: &InstallState) -> bool {
        match (self, next) {
            (
                Self::Installing { .. } | Self::UserConfirmationRequired { .. },
                Self::Success | Self::Error { .. },
            ) => true,
            (Self::Installing { .. }, Self::UserConfirmationRequired { .. }) => true,
            _ => false,
        }
    }
}

/// 系统回调归一化后的安装事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallEvent {
    /// 系统安装会话 ID
    pub transaction_id: i32,
    pub state: InstallState,
}
