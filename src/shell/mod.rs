//! 特权 Shell 模块
//!
//! 提供长期存活的特权 Shell 进程管理和命令串行执行能力。
//!
//! ## 模块结构
//! - `error` - 错误类型定义
//! - `events` - 会话状态定义
//! - `job` - 任务结果、输出过滤与转义
//! - `session` - Shell 会话（任务队列 + 工作任务）
//!
//! ## 使用示例
//! ```ignore
//! use std::sync::Arc;
//! use privbroker_lib::shell::{quote, ShellSession};
//!
//! let session = Arc::new(ShellSession::new(config.shell.clone()));
//! let result = session.run([format!("am force-stop {}", quote(pkg))]).await?;
//! assert!(result.is_success());
//! ```

pub mod error;
pub mod events;
pub mod job;
pub mod session;


// 重新导出常用类型
pub use error::ShellError;
pub use events::ShellStatus;
pub use job::{filter_output, is_valid_output, quote, JobResult};
pub use session::ShellSession;
