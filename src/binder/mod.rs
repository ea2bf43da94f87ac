//! Binder 远程调用模块
//!
//! 通过宿主提供的桥接组件（Shizuku / Dhizuku）访问系统服务。
//!
//! ## 模块结构
//! - `error` - 调用错误类型
//! - `bridge` - 桥接组件与接口代理契约
//! - `dispatch` - 操作到调用路由的分发表
//! - `invoker` - 远程调用器与调用策略

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod invoker;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

pub use bridge::{BinderArg, BinderBridge, BinderHandle, BridgeEvent, ServiceProxy};
pub use dispatch::{lookup, operations_for, BinderRoute, DispatchEntry, Operation};
pub use error::InvocationError;
pub use invoker::{BinderInvoker, InvokeStrategy, HIDDEN_API_BYPASS_MIN_SDK};
