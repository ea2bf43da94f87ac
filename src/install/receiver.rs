//! 系统安装回调处理
//!
//! 将系统投递的原始状态归一化为 `InstallState` 并发布到事件总线。
//! 发布完成后才释放系统的挂起结果句柄，任何退出路径都会释放。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event_bus::EventBus;
use super::state::{ConfirmationIntent, InstallEvent, InstallState};

/// 需要用户确认
pub const STATUS_PENDING_USER_ACTION: i32 = -1;
/// 安装成功
pub const STATUS_SUCCESS: i32 = 0;
/// 回调中缺少状态码时使用的值
pub const STATUS_MISSING: i32 = -999;

/// 系统投递的原始安装状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstallStatus {
    pub session_id: i32,
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
    /// 需要确认时携带的确认请求负载
    #[serde(default)]
    pub confirmation: Option<Value>,
}

/// 系统的挂起结果句柄（异步广播接收器的 `PendingResult`）
pub trait PendingResult: Send {
    fn finish(self: Box<Self>);
}

/// 归一化原始状态；需要确认但负载无法解析时返回 `None`
pub fn normalize(raw: &RawInstallStatus) -> Option<InstallState> {
    let status = raw.status.unwrap_or(STATUS_MISSING);
    match status {
        STATUS_SUCCESS => Some(InstallState::Success),
        STATUS_PENDING_USER_ACTION => {
            let confirmation = raw
                .confirmation
                .as_ref()
                .and_then(ConfirmationIntent::from_payload)?;
            Some(InstallState::UserConfirmationRequired { confirmation })
        }
        code => {
            let message = raw
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("Unknown Error");
            Some(InstallState::error(format!(
                "Install Failed ({}): {}",
                code, message
            )))
        }
    }
}

/// 安装状态回调接收器
pub struct InstallStatusReceiver {
    bus: Arc<EventBus<InstallEvent>>,
}

impl InstallStatusReceiver {
    pub fn new(bus: Arc<EventBus<InstallEvent>>) -> Self {
        Self { bus }
    }

    /// 处理一次系统回调
    pub fn on_receive(&self, raw: RawInstallStatus, pending: Box<dyn PendingResult>) {
        let _pending = scopeguard::guard(pending, |pending| pending.finish());

        match normalize(&raw) {
            Some(state) => {
                tracing::info!(
                    "[安装] 会话 {} 状态: {} (status={:?})",
                    raw.session_id,
                    state.name(),
                    raw.status
                );
                self.bus.publish(InstallEvent {
                    transaction_id: raw.session_id,
                    state,
                });
            }
            None => {
                tracing::warn!(
                    "[安装] 会话 {} 的确认请求无法解析，忽略",
                    raw.session_id
                );
            }
        }
    }
}
