//! 安装流程单元测试
//!
//! ## 测试覆盖
//! - 事件总线回放与广播
//! - 系统回调归一化（成功、待确认、未知状态码、缺失状态码）
//! - 挂起结果在发布之后释放
//! - 会话状态机流转与终态幂等
//! - 提交返回前到达的系统回调

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;

use super::*;

// ============================================================================
// 测试替身
// ============================================================================

/// 记录 finish 时总线上是否已有事件
struct RecordingPending {
    bus: Arc<EventBus<InstallEvent>>,
    finished: Arc<AtomicBool>,
    published_before_finish: Arc<Mutex<Option<bool>>>,
}

impl PendingResult for RecordingPending {
    fn finish(self: Box<Self>) {
        *self.published_before_finish.lock() = Some(self.bus.latest().is_some());
        self.finished.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    bus: Arc<EventBus<InstallEvent>>,
    receiver: InstallStatusReceiver,
    finished: Arc<AtomicBool>,
    published_before_finish: Arc<Mutex<Option<bool>>>,
}

impl Harness {
    fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        Self {
            receiver: InstallStatusReceiver::new(bus.clone()),
            bus,
            finished: Arc::new(AtomicBool::new(false)),
            published_before_finish: Arc::new(Mutex::new(None)),
        }
    }

    fn deliver(&self, status: Option<i32>, message: Option<&str>, confirmation: Option<serde_json::Value>) {
        self.receiver.on_receive(
            RawInstallStatus {
                session_id: 42,
                status,
                message: message.map(str::to_string),
                confirmation,
            },
            Box::new(RecordingPending {
                bus: self.bus.clone(),
                finished: self.finished.clone(),
                published_before_finish: self.published_before_finish.clone(),
            }),
        );
    }

    fn latest_state(&self) -> Option<InstallState> {
        self.bus.latest().map(|event| event.state)
    }
}

struct FakeParser {
    result: Mutex<Result<PackageMetadata, InstallError>>,
}

#[async_trait]
impl ArtifactParser for FakeParser {
    async fn parse(&self, _path: &Path) -> Result<PackageMetadata, InstallError> {
        self.result.lock().clone()
    }
}

struct FakeInstalled(Option<InstalledVersion>);

impl InstalledPackages for FakeInstalled {
    fn installed_version(&self, _package_name: &str) -> Option<InstalledVersion> {
        self.0.clone()
    }
}

#[derive(Default)]
struct FakeTransaction {
    commits: Mutex<Vec<String>>,
    abandoned: Mutex<Vec<i32>>,
    fail: AtomicBool,
}

#[async_trait]
impl InstallTransaction for FakeTransaction {
    async fn commit(&self, _path: &Path, metadata: &PackageMetadata) -> Result<i32, InstallError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InstallError::Commit("session write failed".into()));
        }
        self.commits.lock().push(metadata.package_name.clone());
        Ok(42)
    }

    fn abandon(&self, transaction_id: i32) {
        self.abandoned.lock().push(transaction_id);
    }
}

fn metadata(version_code: i64) -> PackageMetadata {
    PackageMetadata {
        package_name: "com.example".into(),
        label: "Example".into(),
        version_name: format!("{}.0", version_code),
        version_code,
    }
}

fn session_with(
    installed: Option<InstalledVersion>,
    transaction: Arc<FakeTransaction>,
) -> Arc<InstallSession> {
    Arc::new(InstallSession::new(
        Arc::new(FakeParser {
            result: Mutex::new(Ok(metadata(5))),
        }),
        Arc::new(FakeInstalled(installed)),
        transaction,
    ))
}

async fn installing_session() -> (Arc<InstallSession>, Arc<FakeTransaction>) {
    let transaction = Arc::new(FakeTransaction::default());
    let session = session_with(None, transaction.clone());
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    session.install().await.unwrap();
    (session, transaction)
}

fn event(state: InstallState) -> InstallEvent {
    InstallEvent {
        transaction_id: 42,
        state,
    }
}

fn confirmation() -> ConfirmationIntent {
    ConfirmationIntent::from_payload(&json!({"action": "android.content.pm.action.CONFIRM_INSTALL"}))
        .unwrap()
}

// ============================================================================
// 事件总线
// ============================================================================

#[tokio::test]
async fn test_bus_late_subscriber_sees_latest_only() {
    let bus = EventBus::new();
    bus.publish(1);
    bus.publish(2);

    let mut stream = bus.subscribe();
    bus.publish(3);

    assert_eq!(stream.next().await, Some(2));
    assert_eq!(stream.next().await, Some(3));
}

#[tokio::test]
async fn test_bus_fans_out_to_all_subscribers() {
    let bus = EventBus::new();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    bus.publish("x".to_string());
    assert_eq!(a.next().await.as_deref(), Some("x"));
    assert_eq!(b.next().await.as_deref(), Some("x"));
}

#[tokio::test]
async fn test_bus_without_value_replays_nothing() {
    let bus: EventBus<i32> = EventBus::new();
    assert_eq!(bus.latest(), None);
    let mut stream = bus.subscribe();
    bus.publish(7);
    assert_eq!(stream.next().await, Some(7));
}

#[tokio::test]
async fn test_bus_stream_ends_when_bus_dropped() {
    let bus = EventBus::with_initial(1);
    let mut stream = bus.subscribe();
    drop(bus);
    assert_eq!(stream.next().await, Some(1));
    assert_eq!(stream.next().await, None);
}

// ============================================================================
// 系统回调
// ============================================================================

#[test]
fn test_status_success() {
    let harness = Harness::new();
    harness.deliver(Some(STATUS_SUCCESS), None, None);
    assert_eq!(harness.latest_state(), Some(InstallState::Success));
    assert_eq!(harness.bus.latest().unwrap().transaction_id, 42);
    assert!(harness.finished.load(Ordering::SeqCst));
    assert_eq!(*harness.published_before_finish.lock(), Some(true));
}

#[test]
fn test_pending_user_action_with_valid_payload() {
    let harness = Harness::new();
    harness.deliver(
        Some(STATUS_PENDING_USER_ACTION),
        None,
        Some(json!({"action": "android.content.pm.action.CONFIRM_INSTALL", "package": "com.google.android.packageinstaller"})),
    );
    match harness.latest_state() {
        Some(InstallState::UserConfirmationRequired { confirmation }) => {
            assert_eq!(confirmation.action, "android.content.pm.action.CONFIRM_INSTALL");
            assert_eq!(
                confirmation.package.as_deref(),
                Some("com.google.android.packageinstaller")
            );
        }
        other => panic!("期望 UserConfirmationRequired，实际: {:?}", other),
    }
    assert!(harness.finished.load(Ordering::SeqCst));
}

#[test]
fn test_pending_user_action_with_invalid_payload_publishes_nothing() {
    for payload in [None, Some(json!(null)), Some(json!({"action": ""})), Some(json!({"extras": {}}))] {
        let harness = Harness::new();
        harness.deliver(Some(STATUS_PENDING_USER_ACTION), None, payload);
        assert_eq!(harness.latest_state(), None);
        assert!(harness.finished.load(Ordering::SeqCst));
        assert_eq!(*harness.published_before_finish.lock(), Some(false));
    }
}

#[test]
fn test_unknown_code_with_message() {
    let harness = Harness::new();
    harness.deliver(Some(17), Some("Conflict"), None);
    assert_eq!(
        harness.latest_state(),
        Some(InstallState::error("Install Failed (17): Conflict"))
    );
}

#[test]
fn test_unknown_code_without_message() {
    for message in [None, Some(""), Some("   ")] {
        let harness = Harness::new();
        harness.deliver(Some(17), message, None);
        assert_eq!(
            harness.latest_state(),
            Some(InstallState::error("Install Failed (17): Unknown Error"))
        );
    }
}

#[test]
fn test_missing_status_code() {
    let raw = RawInstallStatus {
        session_id: 1,
        status: None,
        message: None,
        confirmation: None,
    };
    assert_eq!(
        normalize(&raw),
        Some(InstallState::error(format!(
            "Install Failed ({}): Unknown Error",
            STATUS_MISSING
        )))
    );
}

#[test]
fn test_raw_status_deserialize_defaults() {
    let raw: RawInstallStatus = serde_json::from_str(r#"{"session_id": 3}"#).unwrap();
    assert_eq!(raw.status, None);
    assert_eq!(raw.confirmation, None);
}

#[test]
fn test_state_serialize_tagged() {
    let value = serde_json::to_value(InstallState::Installing { progress: 0.5 }).unwrap();
    assert_eq!(value, json!({"state": "installing", "progress": 0.5}));
    assert_eq!(
        serde_json::to_value(InstallState::Idle).unwrap(),
        json!({"state": "idle"})
    );
}

// ============================================================================
// 会话状态机
// ============================================================================

#[tokio::test]
async fn test_session_starts_idle() {
    let session = session_with(None, Arc::new(FakeTransaction::default()));
    assert_eq!(session.state(), InstallState::Idle);
    let mut states = session.states();
    assert_eq!(states.next().await, Some(InstallState::Idle));
}

#[tokio::test]
async fn test_select_artifact_fresh_install() {
    let session = session_with(None, Arc::new(FakeTransaction::default()));
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    assert_eq!(
        session.state(),
        InstallState::ReadyToInstall {
            metadata: metadata(5),
            is_update: false,
            is_downgrade: false,
            old_version: None,
        }
    );
}

#[tokio::test]
async fn test_select_artifact_update_and_downgrade() {
    let session = session_with(
        Some(InstalledVersion {
            version_name: "3.0".into(),
            version_code: 3,
        }),
        Arc::new(FakeTransaction::default()),
    );
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    assert!(matches!(
        session.state(),
        InstallState::ReadyToInstall { is_update: true, is_downgrade: false, old_version: Some(ref v), .. } if v == "3.0"
    ));

    let session = session_with(
        Some(InstalledVersion {
            version_name: "9.0".into(),
            version_code: 9,
        }),
        Arc::new(FakeTransaction::default()),
    );
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    assert!(matches!(
        session.state(),
        InstallState::ReadyToInstall { is_update: true, is_downgrade: true, .. }
    ));
}

#[tokio::test]
async fn test_parse_failure_is_error_state() {
    let session = Arc::new(InstallSession::new(
        Arc::new(FakeParser {
            result: Mutex::new(Err(InstallError::Parse("not an apk".into()))),
        }),
        Arc::new(FakeInstalled(None)),
        Arc::new(FakeTransaction::default()),
    ));
    assert!(session.select_artifact("/tmp/x").await.is_err());
    assert_eq!(
        session.state(),
        InstallState::error("安装包解析失败: not an apk")
    );
}

#[tokio::test]
async fn test_install_requires_ready_state() {
    let session = session_with(None, Arc::new(FakeTransaction::default()));
    assert_eq!(
        session.install().await,
        Err(InstallError::InvalidState {
            operation: "install",
            actual: "idle"
        })
    );
}

#[tokio::test]
async fn test_install_commits_and_tracks_transaction() {
    let (session, transaction) = installing_session().await;
    assert_eq!(session.state(), InstallState::Installing { progress: 0.0 });
    assert_eq!(session.transaction_id(), Some(42));
    assert_eq!(*transaction.commits.lock(), vec!["com.example".to_string()]);
}

#[tokio::test]
async fn test_commit_failure_is_error_state() {
    let transaction = Arc::new(FakeTransaction::default());
    transaction.fail.store(true, Ordering::SeqCst);
    let session = session_with(None, transaction);
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    assert!(session.install().await.is_err());
    assert!(matches!(session.state(), InstallState::Error { .. }));
}

#[tokio::test]
async fn test_report_progress_clamped() {
    let (session, _) = installing_session().await;
    session.report_progress(0.4);
    assert_eq!(session.state(), InstallState::Installing { progress: 0.4 });
    session.report_progress(3.0);
    assert_eq!(session.state(), InstallState::Installing { progress: 1.0 });
    session.report_progress(f32::NAN);
    assert_eq!(session.state(), InstallState::Installing { progress: 1.0 });
}

#[tokio::test]
async fn test_report_progress_ignored_outside_installing() {
    let session = session_with(None, Arc::new(FakeTransaction::default()));
    session.report_progress(0.5);
    assert_eq!(session.state(), InstallState::Idle);
}

#[tokio::test]
async fn test_terminal_state_is_idempotent() {
    let (session, _) = installing_session().await;
    assert!(session.apply_event(&event(InstallState::Success)));
    assert!(!session.apply_event(&event(InstallState::error("late failure"))));
    assert!(!session.apply_event(&event(InstallState::UserConfirmationRequired {
        confirmation: confirmation()
    })));
    assert_eq!(session.state(), InstallState::Success);
}

#[tokio::test]
async fn test_foreign_transaction_ignored() {
    let (session, _) = installing_session().await;
    assert!(!session.apply_event(&InstallEvent {
        transaction_id: 7,
        state: InstallState::Success,
    }));
    assert_eq!(session.state(), InstallState::Installing { progress: 0.0 });
}

#[tokio::test]
async fn test_confirmation_accepted_resumes_installing() {
    let (session, _) = installing_session().await;
    session.report_progress(0.3);
    assert!(session.apply_event(&event(InstallState::UserConfirmationRequired {
        confirmation: confirmation()
    })));
    session.resolve_confirmation(true).unwrap();
    assert_eq!(session.state(), InstallState::Installing { progress: 0.3 });
}

#[tokio::test]
async fn test_confirmation_declined_is_error() {
    let (session, transaction) = installing_session().await;
    session.apply_event(&event(InstallState::UserConfirmationRequired {
        confirmation: confirmation(),
    }));
    session.resolve_confirmation(false).unwrap();
    assert_eq!(session.state(), InstallState::error(USER_DECLINED_MESSAGE));
    assert_eq!(*transaction.abandoned.lock(), vec![42]);
    assert!(session.resolve_confirmation(true).is_err());
}

#[tokio::test]
async fn test_os_may_finish_directly_from_confirmation() {
    let (session, _) = installing_session().await;
    session.apply_event(&event(InstallState::UserConfirmationRequired {
        confirmation: confirmation(),
    }));
    assert!(session.apply_event(&event(InstallState::Success)));
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let (session, _) = installing_session().await;
    session.reset();
    assert_eq!(session.state(), InstallState::Idle);
    assert_eq!(session.transaction_id(), None);
    assert!(!session.apply_event(&event(InstallState::Success)));
}

#[tokio::test]
async fn test_attach_applies_receiver_events() {
    let (session, _) = installing_session().await;
    let harness = Harness::new();
    let handle = session.attach(&harness.bus);

    let mut states = session.states();
    harness.deliver(Some(STATUS_SUCCESS), None, None);

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(state) = states.next().await {
            if state == InstallState::Success {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(reached);

    drop(session);
    harness.deliver(Some(17), None, None);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

/// 空挂起结果
struct NoopPending;

impl PendingResult for NoopPending {
    fn finish(self: Box<Self>) {}
}

/// 在 commit 返回之前就投递系统回调的事务
struct EagerTransaction {
    receiver: InstallStatusReceiver,
    delivered_id: i32,
    committed_id: i32,
}

#[async_trait]
impl InstallTransaction for EagerTransaction {
    async fn commit(&self, _path: &Path, _metadata: &PackageMetadata) -> Result<i32, InstallError> {
        self.receiver.on_receive(
            RawInstallStatus {
                session_id: self.delivered_id,
                status: Some(STATUS_SUCCESS),
                message: None,
                confirmation: None,
            },
            Box::new(NoopPending),
        );
        // 让订阅任务在 commit 返回前读到事件
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(self.committed_id)
    }

    fn abandon(&self, _transaction_id: i32) {}
}

async fn eager_session(delivered_id: i32, committed_id: i32) -> Arc<InstallSession> {
    let bus = Arc::new(EventBus::new());
    let session = Arc::new(InstallSession::new(
        Arc::new(FakeParser {
            result: Mutex::new(Ok(metadata(5))),
        }),
        Arc::new(FakeInstalled(None)),
        Arc::new(EagerTransaction {
            receiver: InstallStatusReceiver::new(bus.clone()),
            delivered_id,
            committed_id,
        }),
    ));
    session.attach(&bus);
    session.select_artifact("/sdcard/app.apk").await.unwrap();
    session
}

#[tokio::test]
async fn test_result_delivered_during_commit_is_applied() {
    let session = eager_session(77, 77).await;
    let mut states = session.states();

    assert_eq!(session.install().await.unwrap(), 77);

    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(state) = states.next().await {
            if state == InstallState::Success {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(reached);
    assert_eq!(session.state(), InstallState::Success);
}

#[tokio::test]
async fn test_foreign_result_during_commit_is_ignored() {
    let session = eager_session(5, 77).await;

    assert_eq!(session.install().await.unwrap(), 77);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.state(), InstallState::Installing { progress: 0.0 });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// 未知状态码总是生成带状态码的错误信息
    #[test]
    fn prop_unknown_code_message(code in any::<i32>().prop_filter("known", |c| *c != 0 && *c != -1)) {
        let raw = RawInstallStatus {
            session_id: 1,
            status: Some(code),
            message: None,
            confirmation: None,
        };
        let expected = format!("Install Failed ({}): Unknown Error", code);
        prop_assert_eq!(normalize(&raw), Some(InstallState::error(expected)));
    }
}
