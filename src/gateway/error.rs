//! 网关错误类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::{BackendCapability, UnavailableReason};

/// 单个后端的可用性报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReport {
    pub capability: BackendCapability,
    /// 不可用原因；`None` 表示可用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<UnavailableReason>,
}

impl BackendReport {
    pub fn is_available(&self) -> bool {
        self.reason.is_none()
    }
}

/// 网关错误
///
/// `NoElevationAvailable` 需要用户处理（授予 root / 启动 Shizuku 等），
/// `ActionFailed` 和 `VerificationFailed` 可以直接重试。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// 没有任何可用的提权方式
    #[error("没有可用的提权方式")]
    NoElevationAvailable(Vec<BackendReport>),

    /// 后端执行失败
    #[error("{backend} 执行失败: {reason}")]
    ActionFailed {
        backend: BackendCapability,
        reason: String,
    },

    /// 操作返回成功但状态未改变
    #[error("{backend} 操作后验证失败: {package}")]
    VerificationFailed {
        backend: BackendCapability,
        package: String,
    },

    /// 参数无效
    #[error("参数无效: {0}")]
    InvalidArgument(String),
}

impl GatewayError {
    /// 是否需要用户介入（而不是简单重试）
    pub fn needs_remediation(&self) -> bool {
        matches!(self, Self::NoElevationAvailable(_))
    }
}

impl From<GatewayError> for String {
    fn from(err: GatewayError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for GatewayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
