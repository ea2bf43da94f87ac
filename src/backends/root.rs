//! root 后端
//!
//! 每个操作都是一条通过共享持久 Shell 执行的命令。

use std::sync::Arc;

use async_trait::async_trait;

use super::commands;
use super::{
    BackendCapability, BackendError, BackendResult, ExecOutput, PrivilegeBackend,
    UnavailableReason,
};
use crate::shell::{JobResult, ShellError, ShellSession};

pub struct RootBackend {
    shell: Arc<ShellSession>,
    user_id: i32,
}

impl RootBackend {
    pub fn new(shell: Arc<ShellSession>, user_id: i32) -> Self {
        Self { shell, user_id }
    }

    async fn run(&self, command: String) -> BackendResult<JobResult> {
        self.shell.run([command]).await.map_err(map_shell_error)
    }

    /// 执行命令并要求退出码为 0
    async fn run_checked(&self, command: String) -> BackendResult<()> {
        let result = self.run(command).await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(BackendError::Failed(failure_text(&result)))
        }
    }

    /// 执行 `pm` 命令，输出包含 `Failure` 也视为失败
    async fn run_pm(&self, command: String) -> BackendResult<()> {
        let result = self.run(command).await?;
        let output = result.combined_output();
        if commands::is_pm_failure(result.exit_code, &output) {
            Err(BackendError::Failed(failure_text(&result)))
        } else {
            Ok(())
        }
    }
}

fn map_shell_error(err: ShellError) -> BackendError {
    match err {
        ShellError::BackendUnavailable(_) => BackendError::Unavailable(UnavailableReason::NoRoot),
        other => BackendError::Failed(other.to_string()),
    }
}

fn failure_text(result: &JobResult) -> String {
    let output = result.combined_output();
    if output.is_empty() {
        format!("退出码 {}", result.exit_code)
    } else {
        output
    }
}

#[async_trait]
impl PrivilegeBackend for RootBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Root
    }

    async fn availability(&self) -> Result<(), UnavailableReason> {
        if self.shell.is_root_available().await {
            Ok(())
        } else {
            Err(UnavailableReason::NoRoot)
        }
    }

    async fn force_stop(&self, package: &str) -> BackendResult<()> {
        self.run_checked(commands::force_stop(package)).await
    }

    async fn set_disabled(&self, package: &str, disabled: bool) -> BackendResult<()> {
        self.run_pm(commands::set_disabled(package, disabled, self.user_id))
            .await
    }

    async fn is_disabled(&self, package: &str) -> BackendResult<bool> {
        let result = self.run(commands::list_disabled(package)).await?;
        Ok(commands::contains_package(&result.stdout, package))
    }

    async fn clear_cache(&self, package: &str) -> BackendResult<()> {
        self.run_checked(commands::clear_cache(package)).await
    }

    async fn uninstall(&self, package: &str) -> BackendResult<()> {
        self.run_pm(commands::uninstall(package)).await
    }

    async fn execute(&self, command: &str) -> BackendResult<ExecOutput> {
        let result = self.run(command.to_string()).await?;
        Ok(ExecOutput {
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
