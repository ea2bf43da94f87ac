//! Shell 模块错误类型
//!
//! 定义特权 Shell 会话相关的错误类型。
//!
//! ## 功能
//! - 进程启动失败（无 root 授权、二进制不存在）
//! - 任务执行中进程退出
//! - 序列化支持

use thiserror::Error;

/// Shell 错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    /// Shell 进程无法启动（未授权 root 或二进制缺失）
    #[error("Shell 不可用: {0}")]
    BackendUnavailable(String),

    /// 任务执行期间进程异常（进程退出、管道断开）
    #[error("Shell IO 错误: {0}")]
    Io(String),

    /// 提交的命令为空
    #[error("命令为空")]
    EmptyCommand,

    /// 会话已关闭
    #[error("会话已关闭")]
    SessionClosed,
}

impl From<ShellError> for String {
    fn from(err: ShellError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for ShellError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
