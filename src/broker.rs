//! 组件装配
//!
//! 根据配置创建共享 Shell、三个后端、系统网关以及安装流程的总线、回调接收器和会话。

use std::sync::Arc;

use anyhow::{ensure, Context};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::backends::{DhizukuBackend, RootBackend, ShizukuBackend};
use crate::binder::{BinderBridge, BinderInvoker, BridgeEvent, HIDDEN_API_BYPASS_MIN_SDK};
use crate::config::{load_config, BrokerConfig};
use crate::gateway::SystemGateway;
use crate::install::{
    ArtifactParser, EventBus, InstallEvent, InstallSession, InstallStatusReceiver,
    InstallTransaction, InstalledPackages,
};
use crate::logger;
use crate::shell::ShellSession;

/// 宿主提供的 Binder 桥接组件
pub struct BrokerBridges {
    pub shizuku: Arc<dyn BinderBridge>,
    pub dhizuku: Arc<dyn BinderBridge>,
}

/// 宿主提供的安装流程协作者
pub struct InstallCollaborators {
    pub parser: Arc<dyn ArtifactParser>,
    pub installed: Arc<dyn InstalledPackages>,
    pub transaction: Arc<dyn InstallTransaction>,
}

/// 装配完成的特权代理
pub struct Broker {
    config: BrokerConfig,
    shell: Arc<ShellSession>,
    shizuku: Arc<ShizukuBackend>,
    dhizuku: Arc<DhizukuBackend>,
    gateway: Arc<SystemGateway>,
    install_bus: Arc<EventBus<InstallEvent>>,
    install_receiver: Arc<InstallStatusReceiver>,
    install_session: Arc<InstallSession>,
    install_consumer: JoinHandle<()>,
}

impl Broker {
    /// 从默认配置文件加载配置、初始化日志并装配
    pub async fn load(bridges: BrokerBridges, collaborators: InstallCollaborators) -> anyhow::Result<Self> {
        let config = load_config().context("加载配置失败")?;
        logger::init(&config.logging);
        Self::from_config(config, bridges, collaborators).await
    }

    /// 按配置装配所有组件（需要在 tokio 运行时中调用）
    pub async fn from_config(
        config: BrokerConfig,
        bridges: BrokerBridges,
        collaborators: InstallCollaborators,
    ) -> anyhow::Result<Self> {
        ensure!(!config.backend_order.is_empty(), "backend_order 不能为空");

        let sdk_int = match config.binder.sdk_int {
            Some(sdk) => sdk,
            None => detect_sdk_int().await.unwrap_or_else(|| {
                tracing::warn!(
                    "[装配] 无法探测系统 API 级别，按 {} 处理",
                    HIDDEN_API_BYPASS_MIN_SDK
                );
                HIDDEN_API_BYPASS_MIN_SDK
            }),
        };

        let shell = Arc::new(ShellSession::new(config.shell.clone()));
        let root = Arc::new(RootBackend::new(shell.clone(), config.binder.user_id));
        let shizuku = Arc::new(ShizukuBackend::new(
            BinderInvoker::new("Shizuku", bridges.shizuku, sdk_int),
            &config.binder,
        ));
        let dhizuku = Arc::new(DhizukuBackend::new(
            BinderInvoker::new("Dhizuku", bridges.dhizuku, sdk_int),
            &config.binder,
        ));

        let mut gateway = SystemGateway::new(config.backend_order.clone(), config.binder.user_id);
        gateway.register(root);
        gateway.register_shizuku(shizuku.clone());
        gateway.register(dhizuku.clone());

        let install_bus = Arc::new(EventBus::new());
        let install_receiver = Arc::new(InstallStatusReceiver::new(install_bus.clone()));
        let install_session = Arc::new(InstallSession::new(
            collaborators.parser,
            collaborators.installed,
            collaborators.transaction,
        ));
        let install_consumer = install_session.attach(&install_bus);

        tracing::info!(
            "[装配] 完成 (SDK {}, 后端顺序: {:?})",
            sdk_int,
            config.backend_order
        );

        Ok(Self {
            config,
            shell,
            shizuku,
            dhizuku,
            gateway: Arc::new(gateway),
            install_bus,
            install_receiver,
            install_session,
            install_consumer,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn shell(&self) -> &Arc<ShellSession> {
        &self.shell
    }

    pub fn gateway(&self) -> &Arc<SystemGateway> {
        &self.gateway
    }

    pub fn install_bus(&self) -> &Arc<EventBus<InstallEvent>> {
        &self.install_bus
    }

    pub fn install_receiver(&self) -> &Arc<InstallStatusReceiver> {
        &self.install_receiver
    }

    pub fn install_session(&self) -> &Arc<InstallSession> {
        &self.install_session
    }

    /// 转发 Shizuku 桥接事件
    pub fn on_shizuku_event(&self, event: &BridgeEvent) {
        self.shizuku.on_bridge_event(event);
    }

    /// 转发 Dhizuku 桥接事件
    pub fn on_dhizuku_event(&self, event: &BridgeEvent) {
        self.dhizuku.on_bridge_event(event);
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.install_consumer.abort();
        self.shell.close();
    }
}

/// 解析 `getprop ro.build.version.sdk` 的输出
pub fn parse_sdk_int(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

async fn detect_sdk_int() -> Option<u32> {
    let output = Command::new("getprop")
        .arg("ro.build.version.sdk")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_sdk_int(&String::from_utf8_lossy(&output.stdout))
}
