//! Binder 桥接接口定义
//!
//! 桥接组件（Shizuku / Dhizuku 客户端）由宿主提供，这里只定义调用契约：
//! 服务查找、接口代理解析、权限握手和生命周期事件。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::InvocationError;

/// 系统服务的 Binder 句柄（不透明，每次调用重新获取）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinderHandle {
    /// 服务名
    pub service: String,
    /// 桥接方分配的句柄标识
    pub token: u64,
}

/// 远程调用参数
///
/// 每个参数带有其 Java 类型名，用于按精确签名查找方法。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BinderArg {
    Str(String),
    Int(i32),
    Long(i64),
    Bool(bool),
    StrArray(Vec<String>),
    /// 空引用，携带声明类型
    Null(String),
}

impl BinderArg {
    /// 参数的 Java 类型名
    pub fn type_name(&self) -> &str {
        match self {
            Self::Str(_) => "java.lang.String",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Bool(_) => "boolean",
            Self::StrArray(_) => "java.lang.String[]",
            Self::Null(type_name) => type_name,
        }
    }

    /// 参数列表的签名
    pub fn signature(args: &[BinderArg]) -> Vec<&str> {
        args.iter().map(BinderArg::type_name).collect()
    }
}

/// 桥接生命周期事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// 收到桥接 Binder
    BinderReceived,
    /// 桥接 Binder 死亡
    BinderDead,
    /// 权限请求结果
    PermissionResult { request_code: i32, granted: bool },
}

/// 接口代理（反射得到的 `IXxx.Stub.asInterface(binder)` 对象）
pub trait ServiceProxy: Send + Sync {
    /// 按方法名与精确参数类型签名查找方法
    fn find_method(&self, method: &str, param_types: &[&str]) -> bool;

    /// 普通反射调用（调用前需已通过 `find_method` 查找）
    fn invoke(&self, method: &str, args: &[BinderArg]) -> Result<Value, InvocationError>;

    /// 绕过隐藏 API 限制的调用
    fn invoke_unrestricted(&self, method: &str, args: &[BinderArg])
        -> Result<Value, InvocationError>;
}

/// Binder 桥接组件
pub trait BinderBridge: Send + Sync {
    /// 桥接应用是否已安装
    fn is_installed(&self) -> bool;

    /// 桥接服务是否正在运行
    fn ping(&self) -> bool;

    /// 本应用是否已获得桥接授权
    fn check_permission(&self) -> bool;

    /// 发起授权请求，结果通过 `BridgeEvent::PermissionResult` 回传
    fn request_permission(&self, request_code: i32);

    /// 获取系统服务句柄
    fn get_service(&self, name: &str) -> Option<BinderHandle>;

    /// 将句柄解析为指定接口的代理
    fn as_interface(
        &self,
        interface_name: &str,
        handle: &BinderHandle,
    ) -> Result<Arc<dyn ServiceProxy>, InvocationError>;
}
