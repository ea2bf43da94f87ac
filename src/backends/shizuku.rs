//! Shizuku 后端
//!
//! 通过 Shizuku 桥接调用系统服务；卸载和任意命令通过 `newProcess` 以 shell 身份执行。
//! 权限请求在结果返回前只会发出一次。

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::commands;
use super::remote::RemoteOps;
use super::{
    BackendCapability, BackendError, BackendResult, ExecOutput, PrivilegeBackend,
    UnavailableReason,
};
use crate::binder::{BinderInvoker, BridgeEvent};
use crate::config::BinderConfig;

/// Shizuku 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShizukuState {
    NotInstalled,
    NotRunning,
    PermissionNotGranted,
    Ready,
}

pub struct ShizukuBackend {
    remote: RemoteOps,
    request_code: i32,
    /// 是否有权限请求正在等待结果
    request_in_flight: AtomicBool,
}

impl ShizukuBackend {
    pub fn new(invoker: BinderInvoker, config: &BinderConfig) -> Self {
        Self {
            remote: RemoteOps::new(
                BackendCapability::Shizuku,
                invoker,
                config.user_id,
                config.calling_package.clone(),
            ),
            request_code: config.permission_request_code,
            request_in_flight: AtomicBool::new(false),
        }
    }

    /// 当前状态
    pub fn state(&self) -> ShizukuState {
        let bridge = self.remote.invoker().bridge();
        if !bridge.is_installed() {
            ShizukuState::NotInstalled
        } else if !bridge.ping() {
            ShizukuState::NotRunning
        } else if !bridge.check_permission() {
            ShizukuState::PermissionNotGranted
        } else {
            ShizukuState::Ready
        }
    }

    /// 检查状态，未授权时发起权限请求（已有请求在等待结果时不重复发起）
    pub fn check_and_request_permission(&self) -> ShizukuState {
        let state = self.state();
        if state == ShizukuState::PermissionNotGranted {
            if self
                .request_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                tracing::info!("[Shizuku] 发起权限请求 (request_code={})", self.request_code);
                self.remote.invoker().bridge().request_permission(self.request_code);
            } else {
                tracing::debug!("[Shizuku] 权限请求进行中，跳过");
            }
        }
        state
    }

    /// 是否有权限请求在等待结果
    pub fn is_request_in_flight(&self) -> bool {
        self.request_in_flight.load(Ordering::SeqCst)
    }

    /// 处理桥接生命周期事件
    pub fn on_bridge_event(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::PermissionResult {
                request_code,
                granted,
            } => {
                if *request_code != self.request_code {
                    return;
                }
                self.request_in_flight.store(false, Ordering::SeqCst);
                tracing::info!("[Shizuku] 权限请求结果: granted={}", granted);
            }
            BridgeEvent::BinderDead => {
                self.request_in_flight.store(false, Ordering::SeqCst);
                tracing::warn!("[Shizuku] Binder 已死亡");
            }
            BridgeEvent::BinderReceived => {
                tracing::info!("[Shizuku] 已连接");
            }
        }
    }

    async fn run_pm(&self, command: String) -> BackendResult<()> {
        let output = self
            .remote
            .new_process(&command)
            .await
            .map_err(|e| self.remote.map_error(e))?;
        let text = output.output();
        if commands::is_pm_failure(output.exit_code, &text) {
            Err(BackendError::Failed(text))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PrivilegeBackend for ShizukuBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Shizuku
    }

    async fn availability(&self) -> Result<(), UnavailableReason> {
        match self.state() {
            ShizukuState::NotInstalled => Err(UnavailableReason::ShizukuNotInstalled),
            ShizukuState::NotRunning => Err(UnavailableReason::ShizukuNotRunning),
            ShizukuState::PermissionNotGranted => {
                Err(UnavailableReason::ShizukuPermissionNotGranted)
            }
            ShizukuState::Ready => Ok(()),
        }
    }

    async fn force_stop(&self, package: &str) -> BackendResult<()> {
        self.remote
            .force_stop(package)
            .await
            .map_err(|e| self.remote.map_error(e))
    }

    async fn set_disabled(&self, package: &str, disabled: bool) -> BackendResult<()> {
        self.remote
            .set_disabled(package, disabled)
            .await
            .map_err(|e| self.remote.map_error(e))
    }

    async fn is_disabled(&self, package: &str) -> BackendResult<bool> {
        self.remote
            .is_disabled(package)
            .await
            .map_err(|e| self.remote.map_error(e))
    }

    async fn clear_cache(&self, package: &str) -> BackendResult<()> {
        self.remote
            .clear_cache(package)
            .await
            .map_err(|e| self.remote.map_error(e))
    }

    async fn uninstall(&self, package: &str) -> BackendResult<()> {
        self.run_pm(commands::uninstall(package)).await
    }

    async fn execute(&self, command: &str) -> BackendResult<ExecOutput> {
        let output = self
            .remote
            .new_process(command)
            .await
            .map_err(|e| self.remote.map_error(e))?;
        Ok(ExecOutput {
            exit_code: output.exit_code,
            output: output.output(),
        })
    }
}
