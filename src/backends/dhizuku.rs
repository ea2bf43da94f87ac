//! Dhizuku 后端
//!
//! 启用状态、强行停止和清除缓存直接调用系统服务；卸载和任意命令通过 `newProcess` 执行。
//! `execute` 不返回错误：任何失败都以退出码 -1 和失败信息表示。

use async_trait::async_trait;

use super::commands;
use super::remote::RemoteOps;
use super::{
    BackendCapability, BackendError, BackendResult, ExecOutput, PrivilegeBackend,
    UnavailableReason,
};
use crate::binder::{BinderInvoker, BridgeEvent};
use crate::config::BinderConfig;

pub struct DhizukuBackend {
    remote: RemoteOps,
}

impl DhizukuBackend {
    pub fn new(invoker: BinderInvoker, config: &BinderConfig) -> Self {
        Self {
            remote: RemoteOps::new(
                BackendCapability::Dhizuku,
                invoker,
                config.user_id,
                config.calling_package.clone(),
            ),
        }
    }

    pub fn on_bridge_event(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::BinderDead => tracing::warn!("[Dhizuku] Binder 已死亡"),
            BridgeEvent::BinderReceived => tracing::info!("[Dhizuku] 已连接"),
            BridgeEvent::PermissionResult { granted, .. } => {
                tracing::info!("[Dhizuku] 权限请求结果: granted={}", granted)
            }
        }
    }
}

#[async_trait]
impl PrivilegeBackend for DhizukuBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Dhizuku
    }

    async fn availability(&self) -> Result<(), UnavailableReason> {
        let bridge = self.remote.invoker().bridge();
        if !bridge.is_installed() {
            Err(UnavailableReason::DhizukuNotInstalled)
        } else if !bridge.ping() {
            Err(UnavailableReason::DhizukuNotRunning)
        } else if !bridge.check_permission() {
            Err(UnavailableReason::DhizukuPermissionNotGranted)
        } else {
            Ok(())
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
        let output = self.execute(&commands::uninstall(package)).await?;
        if commands::is_pm_failure(output.exit_code, &output.output) {
            Err(BackendError::Failed(output.output))
        } else {
            Ok(())
        }
    }

    async fn execute(&self, command: &str) -> BackendResult<ExecOutput> {
        match self.remote.new_process(command).await {
            Ok(output) => Ok(ExecOutput {
                exit_code: output.exit_code,
                output: output.output(),
            }),
            Err(e) => {
                tracing::warn!("[Dhizuku] 执行命令失败: {}", e);
                Ok(ExecOutput {
                    exit_code: -1,
                    output: e.to_string(),
                })
            }
        }
    }
}
