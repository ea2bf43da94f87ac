//! 特权后端模块
//!
//! 三种互不兼容的提权机制（root Shell、Shizuku、Dhizuku）统一在 `PrivilegeBackend` 契约之后。
//!
//! ## 模块结构
//! - `commands` - Shell 命令构造与输出解析
//! - `root` - 基于持久 root Shell 的后端
//! - `shizuku` - 基于 Shizuku Binder 代理的后端
//! - `dhizuku` - 基于 Dhizuku Binder 代理的后端
//!
//! 所有公开操作都是三态结果：成功、`BackendError::Failed`（已尝试但失败）、
//! `BackendError::Unavailable`（该后端当前不能使用）。

pub mod commands;
mod dhizuku;
mod remote;
mod root;
mod shizuku;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use dhizuku::DhizukuBackend;
pub use remote::RemoteProcessOutput;
pub use root::RootBackend;
pub use shizuku::{ShizukuBackend, ShizukuState};

/// 后端能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendCapability {
    None,
    Root,
    Shizuku,
    Dhizuku,
}

impl BackendCapability {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Root => "root",
            Self::Shizuku => "shizuku",
            Self::Dhizuku => "dhizuku",
        }
    }
}

impl std::fmt::Display for BackendCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 默认后端选择顺序：Root > Shizuku > Dhizuku
pub const DEFAULT_BACKEND_ORDER: [BackendCapability; 3] = [
    BackendCapability::Root,
    BackendCapability::Shizuku,
    BackendCapability::Dhizuku,
];

/// 后端不可用原因
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    #[error("未获得 root 权限")]
    NoRoot,
    #[error("Shizuku 未安装")]
    ShizukuNotInstalled,
    #[error("Shizuku 未运行")]
    ShizukuNotRunning,
    #[error("Shizuku 未授权")]
    ShizukuPermissionNotGranted,
    #[error("Dhizuku 未安装")]
    DhizukuNotInstalled,
    #[error("Dhizuku 未运行")]
    DhizukuNotRunning,
    #[error("Dhizuku 未授权")]
    DhizukuPermissionNotGranted,
    /// 反射目标缺失，当前系统版本不受支持
    #[error("系统版本不兼容")]
    IncompatibleSystem,
    /// 后端无法完成该操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),
}

/// 后端错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// 操作已尝试但失败
    #[error("操作失败: {0}")]
    Failed(String),
    /// 后端不可用
    #[error("后端不可用: {0}")]
    Unavailable(UnavailableReason),
}

impl From<BackendError> for String {
    fn from(err: BackendError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for BackendError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// 命令执行输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// 合并后的输出文本
    pub output: String,
}

impl ExecOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 特权后端
#[async_trait]
pub trait PrivilegeBackend: Send + Sync {
    /// 后端能力标识
    fn capability(&self) -> BackendCapability;

    /// 检查后端当前是否可用（每次调用都重新检查）
    async fn availability(&self) -> Result<(), UnavailableReason>;

    /// 强行停止应用
    async fn force_stop(&self, package: &str) -> BackendResult<()>;

    /// 禁用或启用应用
    async fn set_disabled(&self, package: &str, disabled: bool) -> BackendResult<()>;

    /// 读取应用当前是否处于禁用状态
    async fn is_disabled(&self, package: &str) -> BackendResult<bool>;

    /// 清除应用缓存
    async fn clear_cache(&self, package: &str) -> BackendResult<()>;

    /// 卸载应用
    async fn uninstall(&self, package: &str) -> BackendResult<()>;

    /// 执行任意 Shell 命令
    async fn execute(&self, command: &str) -> BackendResult<ExecOutput>;
}
