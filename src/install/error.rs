//! 安装流程错误类型

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    /// 当前状态不允许该操作
    #[error("当前状态 {actual} 不允许 {operation}")]
    InvalidState {
        operation: &'static str,
        actual: &'static str,
    },

    /// 安装包解析失败
    #[error("安装包解析失败: {0}")]
    Parse(String),

    /// 提交安装失败
    #[error("提交安装失败: {0}")]
    Commit(String),

    /// 操作期间会话被重置
    #[error("安装会话已重置")]
    Cancelled,
}

impl From<InstallError> for String {
    fn from(err: InstallError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for InstallError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
