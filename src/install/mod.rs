//! 安装流程模块
//!
//! ## 模块结构
//! - `state` - 安装状态与事件
//! - `event_bus` - 回放深度为 1 的单写多读事件总线
//! - `receiver` - 系统安装回调的归一化与发布
//! - `session` - 安装会话状态机与外部协作者契约

mod error;
mod event_bus;
mod receiver;
mod session;
mod state;

#[cfg(test)]
mod tests;

pub use error::InstallError;
pub use event_bus::EventBus;
pub use receiver::{
    normalize, InstallStatusReceiver, PendingResult, RawInstallStatus, STATUS_MISSING,
    STATUS_PENDING_USER_ACTION, STATUS_SUCCESS,
};
pub use session::{
    ArtifactParser, InstallSession, InstallTransaction, InstalledPackages, USER_DECLINED_MESSAGE,
};
pub use state::{ConfirmationIntent, InstallEvent, InstallState, InstalledVersion, PackageMetadata};
