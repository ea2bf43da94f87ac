//! PrivBroker - 设备管理特权代理
//!
//! 让应用在不关心具体提权方式的情况下执行特权操作（停止 / 禁用 / 卸载 / 重新安装应用、
//! 清除缓存、重启设备），并把系统安装回调转换为有序、可观察的状态流。

// 核心模块
pub mod backends;
pub mod binder;
pub mod broker;
pub mod config;
pub mod gateway;
pub mod install;
pub mod shell;

// 内部模块
mod logger;

// 重新导出常用类型
pub use backends::{BackendCapability, DEFAULT_BACKEND_ORDER};
pub use broker::{Broker, BrokerBridges, InstallCollaborators};
pub use config::BrokerConfig;
pub use gateway::{GatewayError, SystemGateway};
pub use install::{InstallSession, InstallState};
pub use logger::init as init_logging;
