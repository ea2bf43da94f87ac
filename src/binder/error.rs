//! Binder 调用错误类型

use thiserror::Error;

/// 远程调用错误
///
/// 反射解析或远程调用过程中的任何失败都会转换为该类型，不会以 panic 形式向上传播。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// 桥接组件不可用（未安装或未运行）
    #[error("Binder 桥接不可用")]
    BridgeUnavailable,

    /// 系统服务不存在
    #[error("系统服务不存在: {0}")]
    ServiceNotFound(String),

    /// 接口类不存在
    #[error("接口类不存在: {0}")]
    ClassNotFound(String),

    /// 方法不存在（或签名不匹配）
    #[error("方法不存在: {0}")]
    MethodNotFound(String),

    /// 安全异常（权限不足）
    #[error("安全异常: {0}")]
    Security(String),

    /// 远程调用失败
    #[error("远程调用失败: {0}")]
    Remote(String),

    /// 调用过程异常中止（桥接实现 panic）
    #[error("调用异常中止: {0}")]
    Aborted(String),
}

impl InvocationError {
    /// 是否属于系统版本不兼容导致的反射目标缺失
    pub fn is_contract_break(&self) -> bool {
        matches!(self, Self::ClassNotFound(_) | Self::MethodNotFound(_))
    }
}

impl From<InvocationError> for String {
    fn from(err: InvocationError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for InvocationError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
