//! 系统网关模块
//!
//! 应用请求特权操作的唯一入口，负责后端选择、降级和结果转换。

mod error;
mod gateway;


pub use error::{BackendReport, GatewayError};
pub use gateway::SystemGateway;
