//! 系统网关
//!
//! 按配置的顺序为每次调用选择一个后端：
//! - 后端不可用（检查失败或操作返回 `Unavailable`）时尝试下一个
//! - 后端执行失败时立即返回 `ActionFailed`，不再尝试其他后端
//! - 全部不可用时返回 `NoElevationAvailable`，附带每个后端的原因
//!
//! 可用性每次调用都重新检查，不做缓存。

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{BackendReport, GatewayError};
use crate::backends::{
    commands, BackendCapability, BackendError, BackendResult, ExecOutput, PrivilegeBackend,
    ShizukuBackend, ShizukuState,
};

/// 系统网关
pub struct SystemGateway {
    /// 后端选择顺序
    order: Vec<BackendCapability>,
    backends: Vec<Arc<dyn PrivilegeBackend>>,
    /// Shizuku 后端（权限请求入口）
    shizuku: Option<Arc<ShizukuBackend>>,
    /// 重新安装时的目标用户
    user_id: i32,
}

impl SystemGateway {
    /// 创建网关，`order` 为后端选择顺序
    pub fn new(order: Vec<BackendCapability>, user_id: i32) -> Self {
        Self {
            order,
            backends: Vec::new(),
            shizuku: None,
            user_id,
        }
    }

    /// 注册后端
    pub fn register(&mut self, backend: Arc<dyn PrivilegeBackend>) {
        debug!("[网关] 注册后端: {}", backend.capability());
        self.backends
            .retain(|b| b.capability() != backend.capability());
        self.backends.push(backend);
    }

    /// 注册 Shizuku 后端，同时作为权限请求入口
    pub fn register_shizuku(&mut self, backend: Arc<ShizukuBackend>) {
        self.register(backend.clone());
        self.shizuku = Some(backend);
    }

    /// 后端选择顺序
    pub fn order(&self) -> &[BackendCapability] {
        &self.order
    }

    /// 按选择顺序排列的已注册后端
    fn ordered(&self) -> Vec<Arc<dyn PrivilegeBackend>> {
        self.order
            .iter()
            .filter_map(|cap| {
                self.backends
                    .iter()
                    .find(|b| b.capability() == *cap)
                    .cloned()
            })
            .collect()
    }

    /// 在第一个可用的后端上执行操作
    async fn dispatch<T, F, Fut>(
        &self,
        action: &str,
        op: F,
    ) -> Result<(BackendCapability, T), GatewayError>
    where
        F: Fn(Arc<dyn PrivilegeBackend>) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut reports = Vec::new();
        for backend in self.ordered() {
            let capability = backend.capability();
            if let Err(reason) = backend.availability().await {
                debug!("[网关] {} 不可用: {}", capability, reason);
                reports.push(BackendReport {
                    capability,
                    reason: Some(reason),
                });
                continue;
            }

            match op(backend).await {
                Ok(value) => {
                    info!("[网关] {} 通过 {} 完成", action, capability);
                    return Ok((capability, value));
                }
                Err(BackendError::Unavailable(reason)) => {
                    warn!("[网关] {} 在 {} 上不可用: {}", action, capability, reason);
                    reports.push(BackendReport {
                        capability,
                        reason: Some(reason),
                    });
                }
                Err(BackendError::Failed(reason)) => {
                    warn!("[网关] {} 在 {} 上失败: {}", action, capability, reason);
                    return Err(GatewayError::ActionFailed {
                        backend: capability,
                        reason,
                    });
                }
            }
        }

        warn!("[网关] {} 没有可用的提权方式", action);
        Err(GatewayError::NoElevationAvailable(reports))
    }

    /// 当前会被选中的后端；都不可用时为 `None`
    pub async fn active_backend(&self) -> BackendCapability {
        for backend in self.ordered() {
            if backend.availability().await.is_ok() {
                return backend.capability();
            }
        }
        BackendCapability::None
    }

    /// 所有已注册后端的可用性报告（按选择顺序）
    pub async fn backend_report(&self) -> Vec<BackendReport> {
        let mut reports = Vec::new();
        for backend in self.ordered() {
            reports.push(BackendReport {
                capability: backend.capability(),
                reason: backend.availability().await.err(),
            });
        }
        reports
    }

    /// 请求 Shizuku 权限；未注册 Shizuku 后端时返回 `None`
    pub fn request_shizuku_permission(&self) -> Option<ShizukuState> {
        self.shizuku
            .as_ref()
            .map(|shizuku| shizuku.check_and_request_permission())
    }

    /// 强行停止应用
    pub async fn force_stop_app(&self, package: &str) -> Result<(), GatewayError> {
        validate_package(package)?;
        self.dispatch("force_stop", |b| async move { b.force_stop(package).await })
            .await
            .map(|_| ())
    }

    /// 清除应用缓存
    pub async fn clear_app_cache(&self, package: &str) -> Result<(), GatewayError> {
        validate_package(package)?;
        self.dispatch("clear_cache", |b| async move { b.clear_cache(package).await })
            .await
            .map(|_| ())
    }

    /// 禁用 / 启用应用
    ///
    /// 禁用前先强行停止；状态切换后在同一后端上读取验证。
    pub async fn set_app_disabled(&self, package: &str, disabled: bool) -> Result<(), GatewayError> {
        validate_package(package)?;
        let (backend, actual) = self
            .dispatch("set_disabled", |b| async move {
                if disabled {
                    match b.force_stop(package).await {
                        Err(BackendError::Failed(reason)) => {
                            warn!("[网关] 禁用前强行停止失败: {}", reason);
                        }
                        Err(e) => return Err(e),
                        Ok(()) => {}
                    }
                }
                b.set_disabled(package, disabled).await?;
                // 状态已经改变，读回失败不能再换后端重做
                match b.is_disabled(package).await {
                    Err(BackendError::Unavailable(reason)) => Err(BackendError::Failed(format!(
                        "已修改状态但无法读回: {}",
                        reason
                    ))),
                    other => other,
                }
            })
            .await?;

        if actual != disabled {
            warn!(
                "[网关] {} 状态验证失败: 期望 disabled={}，实际 {}",
                package, disabled, actual
            );
            return Err(GatewayError::VerificationFailed {
                backend,
                package: package.to_string(),
            });
        }
        Ok(())
    }

    /// 卸载应用
    pub async fn uninstall_app(&self, package: &str) -> Result<(), GatewayError> {
        validate_package(package)?;
        self.dispatch("uninstall", |b| async move { b.uninstall(package).await })
            .await
            .map(|_| ())
    }

    /// 为当前用户重新安装系统中已存在的应用
    pub async fn reinstall_app(&self, package: &str) -> Result<(), GatewayError> {
        validate_package(package)?;
        let command = commands::reinstall(package, self.user_id);
        self.run_pm("reinstall", &command).await
    }

    /// 安装安装包文件
    pub async fn install_package(&self, path: &str) -> Result<(), GatewayError> {
        if path.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("安装包路径为空".into()));
        }
        let command = commands::install(path);
        self.run_pm("install", &command).await
    }

    /// 重启设备
    pub async fn reboot(&self, reason: Option<&str>) -> Result<(), GatewayError> {
        let command = commands::reboot(reason);
        let command = command.as_str();
        self.dispatch("reboot", |b| async move {
            let output = b.execute(command).await?;
            if output.is_success() {
                Ok(())
            } else {
                Err(BackendError::Failed(output.output))
            }
        })
        .await
        .map(|_| ())
    }

    /// 执行任意命令
    pub async fn execute(&self, command: &str) -> Result<ExecOutput, GatewayError> {
        if command.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("命令为空".into()));
        }
        self.dispatch("execute", |b| async move { b.execute(command).await })
            .await
            .map(|(_, output)| output)
    }

    /// 查询应用缓存大小（字节）
    ///
    /// 仅供参考：任何失败都返回 0。
    pub async fn get_app_cache_size(&self, package: &str) -> u64 {
        if validate_package(package).is_err() {
            return 0;
        }
        let command = commands::cache_size(package);
        let command = command.as_str();
        match self
            .dispatch("cache_size", |b| async move { b.execute(command).await })
            .await
        {
            Ok((_, output)) => {
                let size = commands::parse_du_output(&output.output);
                if size < 0 {
                    debug!("[网关] 无法解析缓存大小: {}", output.output);
                }
                size.max(0) as u64
            }
            Err(e) => {
                debug!("[网关] 查询缓存大小失败: {}", e);
                0
            }
        }
    }

    async fn run_pm(&self, action: &str, command: &str) -> Result<(), GatewayError> {
        self.dispatch(action, |b| async move {
            let output = b.execute(command).await?;
            if commands::is_pm_failure(output.exit_code, &output.output) {
                Err(BackendError::Failed(output.output))
            } else {
                Ok(())
            }
        })
        .await
        .map(|_| ())
    }
}

fn validate_package(package: &str) -> Result<(), GatewayError> {
    if package.trim().is_empty() {
        return Err(GatewayError::InvalidArgument("包名为空".into()));
    }
    if !commands::is_valid_package_name(package) {
        return Err(GatewayError::InvalidArgument(format!("包名不合法: {}", package)));
    }
    Ok(())
}
