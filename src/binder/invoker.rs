//! Binder 远程调用器
//!
//! 通过桥接组件获取系统服务、解析接口代理并调用方法。
//!
//! ## 功能
//! - 每次调用重新获取服务句柄，避免使用已死亡的 Binder
//! - 按系统 API 级别选择调用策略（隐藏 API 绕过 / 精确签名反射）
//! - 所有失败（包括桥接实现 panic）转换为 `InvocationError`
//! - 调用在阻塞线程池中执行，不阻塞调用方；不做自动重试

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bridge::{BinderArg, BinderBridge, BinderHandle, ServiceProxy};
use super::dispatch::DispatchEntry;
use super::error::InvocationError;

/// 支持隐藏 API 绕过调用的最低 API 级别（Android 9）
pub const HIDDEN_API_BYPASS_MIN_SDK: u32 = 28;

/// 调用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeStrategy {
    /// 绕过隐藏 API 限制直接调用
    HiddenApiBypass,
    /// 按精确参数签名反射查找后调用
    Reflection,
}

impl InvokeStrategy {
    /// 根据系统 API 级别选择策略
    pub fn for_sdk(sdk_int: u32) -> Self {
        if sdk_int >= HIDDEN_API_BYPASS_MIN_SDK {
            Self::HiddenApiBypass
        } else {
            Self::Reflection
        }
    }

    fn dispatch(
        self,
        proxy: &dyn ServiceProxy,
        method: &str,
        args: &[BinderArg],
    ) -> Result<Value, InvocationError> {
        match self {
            Self::HiddenApiBypass => proxy.invoke_unrestricted(method, args),
            Self::Reflection => {
                let signature = BinderArg::signature(args);
                if !proxy.find_method(method, &signature) {
                    return Err(InvocationError::MethodNotFound(format!(
                        "{}({})",
                        method,
                        signature.join(", ")
                    )));
                }
                proxy.invoke(method, args)
            }
        }
    }
}

/// Binder 远程调用器
pub struct BinderInvoker {
    /// 调用方标签（日志用）
    label: &'static str,
    bridge: Arc<dyn BinderBridge>,
    strategy: InvokeStrategy,
}

impl BinderInvoker {
    pub fn new(label: &'static str, bridge: Arc<dyn BinderBridge>, sdk_int: u32) -> Self {
        let strategy = InvokeStrategy::for_sdk(sdk_int);
        tracing::debug!("[Binder] {} 调用策略: {:?} (SDK {})", label, strategy, sdk_int);
        Self {
            label,
            bridge,
            strategy,
        }
    }

    /// 当前调用策略
    pub fn strategy(&self) -> InvokeStrategy {
        self.strategy
    }

    /// 桥接组件
    pub fn bridge(&self) -> &Arc<dyn BinderBridge> {
        &self.bridge
    }

    /// 获取系统服务句柄；桥接不可用时返回 `None`
    pub fn get_service(&self, name: &str) -> Option<BinderHandle> {
        resolve_service(self.bridge.as_ref(), name).ok()
    }

    /// 在指定句柄上调用接口方法
    pub async fn invoke(
        &self,
        interface_name: &str,
        handle: &BinderHandle,
        method: &str,
        args: Vec<BinderArg>,
    ) -> Result<Value, InvocationError> {
        let bridge = self.bridge.clone();
        let strategy = self.strategy;
        let interface_name = interface_name.to_string();
        let handle = handle.clone();
        let owned_method = method.to_string();

        self.run_blocking(method, move || {
            let proxy = bridge.as_interface(&interface_name, &handle)?;
            strategy.dispatch(proxy.as_ref(), &owned_method, &args)
        })
        .await
    }

    /// 按分发表条目调用：重新获取服务句柄、解析代理并调用
    pub async fn call(
        &self,
        entry: &DispatchEntry,
        args: Vec<BinderArg>,
    ) -> Result<Value, InvocationError> {
        let route = entry.route;
        if BinderArg::signature(&args) != route.signature {
            return Err(InvocationError::MethodNotFound(format!(
                "{} 参数签名不匹配",
                route.method
            )));
        }

        let bridge = self.bridge.clone();
        let strategy = self.strategy;
        self.run_blocking(route.method, move || {
            let handle = resolve_service(bridge.as_ref(), route.service)?;
            let proxy = bridge.as_interface(route.interface, &handle)?;
            strategy.dispatch(proxy.as_ref(), route.method, &args)
        })
        .await
    }

    async fn run_blocking<F>(&self, method: &str, f: F) -> Result<Value, InvocationError>
    where
        F: FnOnce() -> Result<Value, InvocationError> + Send + 'static,
    {
        let result = match tokio::task::spawn_blocking(f).await {
            Ok(result) => result,
            Err(e) => Err(InvocationError::Aborted(e.to_string())),
        };
        match &result {
            Ok(_) => tracing::debug!("[Binder] {} 调用 {} 成功", self.label, method),
            Err(e) => tracing::warn!("[Binder] {} 调用 {} 失败: {}", self.label, method, e),
        }
        result
    }
}

fn resolve_service(bridge: &dyn BinderBridge, name: &str) -> Result<BinderHandle, InvocationError> {
    if !bridge.is_installed() || !bridge.ping() {
        return Err(InvocationError::BridgeUnavailable);
    }
    bridge
        .get_service(name)
        .ok_or_else(|| InvocationError::ServiceNotFound(name.to_string()))
}
