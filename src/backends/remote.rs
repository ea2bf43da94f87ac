//! Binder 后端共用的远程操作
//!
//! Shizuku 与 Dhizuku 对系统服务的调用完全相同，只是分发表中的能力和子进程服务不同。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendCapability, BackendError, UnavailableReason};
use crate::binder::{lookup, BinderArg, BinderInvoker, InvocationError, Operation};

/// `newProcess` 的执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProcessOutput {
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl RemoteProcessOutput {
    /// stdout 为空时回退到 stderr
    pub fn output(&self) -> String {
        if self.stdout.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

/// `getApplicationEnabledSetting` 中表示禁用的状态
/// （DISABLED / DISABLED_USER / DISABLED_UNTIL_USED）
const DISABLED_STATES: [i64; 3] = [2, 3, 4];
const STATE_ENABLED: i32 = 1;
const STATE_DISABLED_USER: i32 = 3;
const PACKAGE_DATA_OBSERVER: &str = "android.content.pm.IPackageDataObserver";

pub(super) struct RemoteOps {
    capability: BackendCapability,
    invoker: BinderInvoker,
    user_id: i32,
    calling_package: String,
}

impl RemoteOps {
    pub(super) fn new(
        capability: BackendCapability,
        invoker: BinderInvoker,
        user_id: i32,
        calling_package: String,
    ) -> Self {
        Self {
            capability,
            invoker,
            user_id,
            calling_package,
        }
    }

    pub(super) fn invoker(&self) -> &BinderInvoker {
        &self.invoker
    }

    async fn call(&self, operation: Operation, args: Vec<BinderArg>) -> Result<Value, InvocationError> {
        let entry = lookup(self.capability, operation).ok_or_else(|| {
            InvocationError::MethodNotFound(format!("{:?} 无 {:?} 路由", self.capability, operation))
        })?;
        self.invoker.call(entry, args).await
    }

    pub(super) async fn force_stop(&self, package: &str) -> Result<(), InvocationError> {
        self.call(
            Operation::ForceStop,
            vec![BinderArg::Str(package.to_string()), BinderArg::Int(self.user_id)],
        )
        .await
        .map(|_| ())
    }

    pub(super) async fn set_disabled(&self, package: &str, disabled: bool) -> Result<(), InvocationError> {
        let state = if disabled { STATE_DISABLED_USER } else { STATE_ENABLED };
        self.call(
            Operation::SetEnabledState,
            vec![
                BinderArg::Str(package.to_string()),
                BinderArg::Int(state),
                BinderArg::Int(0),
                BinderArg::Int(self.user_id),
                BinderArg::Str(self.calling_package.clone()),
            ],
        )
        .await
        .map(|_| ())
    }

    pub(super) async fn is_disabled(&self, package: &str) -> Result<bool, InvocationError> {
        let value = self
            .call(
                Operation::QueryEnabledState,
                vec![BinderArg::Str(package.to_string()), BinderArg::Int(self.user_id)],
            )
            .await?;
        let state = value.as_i64().ok_or_else(|| {
            InvocationError::Remote(format!("getApplicationEnabledSetting 返回无效值: {}", value))
        })?;
        Ok(DISABLED_STATES.contains(&state))
    }

    pub(super) async fn clear_cache(&self, package: &str) -> Result<(), InvocationError> {
        self.call(
            Operation::ClearCache,
            vec![
                BinderArg::Str(package.to_string()),
                BinderArg::Int(self.user_id),
                BinderArg::Null(PACKAGE_DATA_OBSERVER.to_string()),
            ],
        )
        .await
        .map(|_| ())
    }

    /// 通过 `newProcess` 执行 `sh -c <command>`
    pub(super) async fn new_process(&self, command: &str) -> Result<RemoteProcessOutput, InvocationError> {
        let value = self
            .call(
                Operation::NewProcess,
                vec![
                    BinderArg::StrArray(vec![
                        "sh".to_string(),
                        "-c".to_string(),
                        command.to_string(),
                    ]),
                    BinderArg::Null("java.lang.String[]".to_string()),
                    BinderArg::Null("java.lang.String".to_string()),
                ],
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| InvocationError::Remote(format!("newProcess 返回无效结果: {}", e)))
    }

    /// 将调用错误转换为后端错误
    ///
    /// 反射目标缺失视为系统不兼容，记录错误日志后降级为不可用。
    pub(super) fn map_error(&self, err: InvocationError) -> BackendError {
        match err {
            InvocationError::BridgeUnavailable | InvocationError::ServiceNotFound(_) => {
                BackendError::Unavailable(self.bridge_down_reason())
            }
            InvocationError::ClassNotFound(_) | InvocationError::MethodNotFound(_) => {
                tracing::error!("[{}] 反射目标缺失，系统版本不兼容: {}", self.capability, err);
                BackendError::Unavailable(UnavailableReason::IncompatibleSystem)
            }
            other => BackendError::Failed(other.to_string()),
        }
    }

    fn bridge_down_reason(&self) -> UnavailableReason {
        let installed = self.invoker.bridge().is_installed();
        match (self.capability, installed) {
            (BackendCapability::Dhizuku, false) => UnavailableReason::DhizukuNotInstalled,
            (BackendCapability::Dhizuku, true) => UnavailableReason::DhizukuNotRunning,
            (_, false) => UnavailableReason::ShizukuNotInstalled,
            (_, true) => UnavailableReason::ShizukuNotRunning,
        }
    }
}
