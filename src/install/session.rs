//! 安装会话状态机
//!
//! 状态流转：`Idle → Parsing → ReadyToInstall → Installing → Success | Error | UserConfirmationRequired`，
//! `UserConfirmationRequired → Installing | Error`（系统也可能直接给出 `Success` / `Error`）。
//! 当前状态通过回放深度为 1 的事件总线对外提供。

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::error::InstallError;
use super::event_bus::EventBus;
use super::state::{InstallEvent, InstallState, InstalledVersion, PackageMetadata};

/// 用户拒绝安装时的错误信息
pub const USER_DECLINED_MESSAGE: &str = "User declined installation";

/// 安装包解析器
#[async_trait]
pub trait ArtifactParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<PackageMetadata, InstallError>;
}

/// 已安装应用查询
pub trait InstalledPackages: Send + Sync {
    fn installed_version(&self, package_name: &str) -> Option<InstalledVersion>;
}

/// 系统安装事务
#[async_trait]
pub trait InstallTransaction: Send + Sync {
    /// 提交安装，返回系统安装会话 ID
    async fn commit(&self, path: &Path, metadata: &PackageMetadata) -> Result<i32, InstallError>;

    /// 放弃安装会话
    fn abandon(&self, transaction_id: i32);
}

#[derive(Default)]
struct SessionInner {
    artifact: Option<PathBuf>,
    metadata: Option<PackageMetadata>,
    transaction_id: Option<i32>,
    progress: f32,
    /// 提交进行中（尚未拿到会话 ID）
    committing: bool,
    /// 提交进行中收到的系统事件，拿到会话 ID 后补放
    early_events: Vec<InstallEvent>,
    /// 每次选择安装包或重置时递增，用于丢弃过期的异步结果
    generation: u64,
}

/// 安装会话
pub struct InstallSession {
    state: EventBus<InstallState>,
    inner: Mutex<SessionInner>,
    parser: Arc<dyn ArtifactParser>,
    installed: Arc<dyn InstalledPackages>,
    transaction: Arc<dyn InstallTransaction>,
}

impl InstallSession {
    pub fn new(
        parser: Arc<dyn ArtifactParser>,
        installed: Arc<dyn InstalledPackages>,
        transaction: Arc<dyn InstallTransaction>,
    ) -> Self {
        Self {
            state: EventBus::with_initial(InstallState::Idle),
            inner: Mutex::new(SessionInner::default()),
            parser,
            installed,
            transaction,
        }
    }

    /// 当前状态
    pub fn state(&self) -> InstallState {
        self.state.latest().unwrap_or_default()
    }

    /// 状态流：先给出当前状态，再给出后续变化
    pub fn states(&self) -> BoxStream<'static, InstallState> {
        self.state.subscribe()
    }

    /// 当前系统安装会话 ID
    pub fn transaction_id(&self) -> Option<i32> {
        self.inner.lock().transaction_id
    }

    fn set_state(&self, state: InstallState) {
        tracing::debug!("[安装] 状态 -> {}", state.name());
        self.state.publish(state);
    }

    /// 选择并解析安装包
    pub async fn select_artifact(&self, path: impl Into<PathBuf>) -> Result<PackageMetadata, InstallError> {
        let path = path.into();
        let generation = {
            let mut inner = self.inner.lock();
            let current = self.state();
            if matches!(
                current,
                InstallState::Installing { .. } | InstallState::UserConfirmationRequired { .. }
            ) {
                return Err(InstallError::InvalidState {
                    operation: "select_artifact",
                    actual: current.name(),
                });
            }
            inner.generation += 1;
            inner.artifact = Some(path.clone());
            inner.metadata = None;
            inner.transaction_id = None;
            inner.progress = 0.0;
            self.set_state(InstallState::Parsing);
            inner.generation
        };

        let parsed = self.parser.parse(&path).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return Err(InstallError::Cancelled);
        }
        match parsed {
            Ok(metadata) => {
                let installed = self.installed.installed_version(&metadata.package_name);
                let (is_update, is_downgrade, old_version) = match &installed {
                    Some(old) => (
                        true,
                        metadata.version_code < old.version_code,
                        Some(old.version_name.clone()),
                    ),
                    None => (false, false, None),
                };
                tracing::info!(
                    "[安装] 解析完成: {} {} (更新: {}, 降级: {})",
                    metadata.package_name,
                    metadata.version_name,
                    is_update,
                    is_downgrade
                );
                inner.metadata = Some(metadata.clone());
                self.set_state(InstallState::ReadyToInstall {
                    metadata: metadata.clone(),
                    is_update,
                    is_downgrade,
                    old_version,
                });
                Ok(metadata)
            }
            Err(e) => {
                tracing::warn!("[安装] 解析失败: {:?}: {}", path, e);
                self.set_state(InstallState::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// 提交安装
    pub async fn install(&self) -> Result<i32, InstallError> {
        let (path, metadata, generation) = {
            let mut inner = self.inner.lock();
            let current = self.state();
            let (Some(path), Some(metadata)) = (inner.artifact.clone(), inner.metadata.clone())
            else {
                return Err(InstallError::InvalidState {
                    operation: "install",
                    actual: current.name(),
                });
            };
            if !matches!(current, InstallState::ReadyToInstall { .. }) {
                return Err(InstallError::InvalidState {
                    operation: "install",
                    actual: current.name(),
                });
            }
            inner.progress = 0.0;
            inner.committing = true;
            inner.early_events.clear();
            self.set_state(InstallState::Installing { progress: 0.0 });
            (path, metadata, inner.generation)
        };

        let committed = self.transaction.commit(&path, &metadata).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            if let Ok(id) = committed {
                self.transaction.abandon(id);
            }
            return Err(InstallError::Cancelled);
        }
        inner.committing = false;
        let early_events = std::mem::take(&mut inner.early_events);
        match committed {
            Ok(id) => {
                tracing::info!("[安装] 已提交 {}，会话 {}", metadata.package_name, id);
                inner.transaction_id = Some(id);
                for event in early_events.iter().filter(|e| e.transaction_id == id) {
                    self.transition(event);
                }
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("[安装] 提交失败: {}", e);
                self.set_state(InstallState::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// 更新安装进度（仅在安装中有效，超出范围的值会被截断）
    pub fn report_progress(&self, progress: f32) {
        let mut inner = self.inner.lock();
        if !matches!(self.state(), InstallState::Installing { .. }) {
            return;
        }
        let progress = if progress.is_nan() {
            inner.progress
        } else {
            progress.clamp(0.0, 1.0)
        };
        inner.progress = progress;
        self.set_state(InstallState::Installing { progress });
    }

    /// 用户对确认请求的答复
    pub fn resolve_confirmation(&self, accepted: bool) -> Result<(), InstallError> {
        let inner = self.inner.lock();
        let current = self.state();
        if !matches!(current, InstallState::UserConfirmationRequired { .. }) {
            return Err(InstallError::InvalidState {
                operation: "resolve_confirmation",
                actual: current.name(),
            });
        }
        if accepted {
            self.set_state(InstallState::Installing {
                progress: inner.progress,
            });
        } else {
            tracing::info!("[安装] 用户拒绝安装");
            if let Some(id) = inner.transaction_id {
                self.transaction.abandon(id);
            }
            self.set_state(InstallState::error(USER_DECLINED_MESSAGE));
        }
        Ok(())
    }

    /// 回到初始状态
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let generation = inner.generation + 1;
        *inner = SessionInner {
            generation,
            ..SessionInner::default()
        };
        self.set_state(InstallState::Idle);
    }

    /// 应用一个系统安装事件，返回是否产生了状态变化
    ///
    /// 其他安装会话的事件、终态之后的事件和不符合流转规则的事件都会被忽略。
    /// 提交尚未返回时到达的事件先缓存，拿到会话 ID 后再应用。
    pub fn apply_event(&self, event: &InstallEvent) -> bool {
        let mut inner = self.inner.lock();
        if inner.transaction_id.is_none() && inner.committing {
            inner.early_events.push(event.clone());
            return false;
        }
        if inner.transaction_id != Some(event.transaction_id) {
            return false;
        }
        self.transition(event)
    }

    /// 调用方需持有 `inner` 锁
    fn transition(&self, event: &InstallEvent) -> bool {
        let current = self.state();
        if !current.accepts_os_update(&event.state) {
            tracing::debug!(
                "[安装] 忽略事件: {} -> {}",
                current.name(),
                event.state.name()
            );
            return false;
        }
        self.set_state(event.state.clone());
        true
    }

    /// 订阅回调事件总线，后台任务把属于本会话的事件应用到状态机
    ///
    /// 会话被释放或总线关闭后任务结束。
    pub fn attach(self: &Arc<Self>, bus: &EventBus<InstallEvent>) -> JoinHandle<()> {
        let mut events = bus.subscribe();
        let session: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.apply_event(&event);
            }
            tracing::debug!("[安装] 回调事件订阅结束");
        })
    }
}
