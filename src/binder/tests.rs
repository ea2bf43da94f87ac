//! Binder 模块单元测试
//!
//! ## 测试覆盖
//! - 调用策略选择
//! - 精确签名反射 / 隐藏 API 绕过两条调用路径
//! - 失败转换（类缺失、方法缺失、桥接 panic、桥接不可用）
//! - 句柄不缓存

use std::sync::Arc;

use serde_json::json;

use super::testing::FakeBridge;
use super::*;
use crate::backends::BackendCapability;

fn invoker(bridge: &FakeBridge, sdk_int: u32) -> BinderInvoker {
    BinderInvoker::new("test", Arc::new(bridge.clone()), sdk_int)
}

fn force_stop_args() -> Vec<BinderArg> {
    vec![BinderArg::Str("com.example".into()), BinderArg::Int(0)]
}

#[test]
fn test_strategy_for_sdk() {
    assert_eq!(InvokeStrategy::for_sdk(27), InvokeStrategy::Reflection);
    assert_eq!(InvokeStrategy::for_sdk(28), InvokeStrategy::HiddenApiBypass);
    assert_eq!(InvokeStrategy::for_sdk(34), InvokeStrategy::HiddenApiBypass);
}

#[test]
fn test_arg_signature() {
    let args = vec![
        BinderArg::Str("a".into()),
        BinderArg::Int(1),
        BinderArg::Null("android.content.pm.IPackageDataObserver".into()),
        BinderArg::StrArray(vec![]),
    ];
    assert_eq!(
        BinderArg::signature(&args),
        vec![
            "java.lang.String",
            "int",
            "android.content.pm.IPackageDataObserver",
            "java.lang.String[]"
        ]
    );
}

#[test]
fn test_dispatch_table_lookup() {
    let entry = lookup(BackendCapability::Dhizuku, Operation::ForceStop).unwrap();
    assert_eq!(entry.route.service, "activity");
    assert_eq!(entry.route.method, "forceStopPackage");

    assert!(lookup(BackendCapability::Root, Operation::ForceStop).is_none());
    assert_eq!(operations_for(BackendCapability::Shizuku).len(), 5);
    assert_eq!(
        lookup(BackendCapability::Shizuku, Operation::NewProcess)
            .unwrap()
            .route
            .service,
        "shizuku"
    );
}

#[test]
fn test_get_service_returns_none_when_bridge_missing() {
    let bridge = FakeBridge::default();
    assert!(invoker(&bridge, 34).get_service("package").is_none());

    bridge.set_installed(true);
    bridge.set_running(true);
    let handle = invoker(&bridge, 34).get_service("package").unwrap();
    assert_eq!(handle.service, "package");
}

#[tokio::test]
async fn test_call_uses_hidden_api_bypass_on_new_sdk() {
    let bridge = FakeBridge::ready();
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    invoker(&bridge, 33).call(entry, force_stop_args()).await.unwrap();

    let calls = bridge.calls_to("forceStopPackage");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].unrestricted);
    assert_eq!(calls[0].interface, "android.app.IActivityManager");
}

#[tokio::test]
async fn test_call_uses_reflection_on_old_sdk() {
    let bridge = FakeBridge::ready();
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    invoker(&bridge, 26).call(entry, force_stop_args()).await.unwrap();

    let calls = bridge.calls_to("forceStopPackage");
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].unrestricted);
}

#[tokio::test]
async fn test_reflection_missing_method_is_invocation_error() {
    let bridge = FakeBridge::ready();
    bridge.remove_method("forceStopPackage");
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 26)
        .call(entry, force_stop_args())
        .await
        .unwrap_err();
    assert!(matches!(err, InvocationError::MethodNotFound(_)));
    assert!(err.is_contract_break());
    assert!(bridge.calls().is_empty());
}

#[tokio::test]
async fn test_missing_interface_is_class_not_found() {
    let bridge = FakeBridge::ready();
    bridge.remove_interface("android.app.IActivityManager");
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 34)
        .call(entry, force_stop_args())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        InvocationError::ClassNotFound("android.app.IActivityManager".into())
    );
}

#[tokio::test]
async fn test_signature_mismatch_rejected_before_dispatch() {
    let bridge = FakeBridge::ready();
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 34)
        .call(entry, vec![BinderArg::Str("com.example".into())])
        .await
        .unwrap_err();
    assert!(matches!(err, InvocationError::MethodNotFound(_)));
    assert_eq!(bridge.service_lookups(), 0);
}

#[tokio::test]
async fn test_bridge_panic_is_caught() {
    let bridge = FakeBridge::ready();
    bridge.panic_on("forceStopPackage");
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 34)
        .call(entry, force_stop_args())
        .await
        .unwrap_err();
    assert!(matches!(err, InvocationError::Aborted(_)));
}

#[tokio::test]
async fn test_bridge_not_running_is_bridge_unavailable() {
    let bridge = FakeBridge::ready();
    bridge.set_running(false);
    let entry = lookup(BackendCapability::Dhizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 34)
        .call(entry, force_stop_args())
        .await
        .unwrap_err();
    assert_eq!(err, InvocationError::BridgeUnavailable);
}

#[tokio::test]
async fn test_service_handle_resolved_per_call() {
    let bridge = FakeBridge::ready();
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let invoker = invoker(&bridge, 34);
    invoker.call(entry, force_stop_args()).await.unwrap();
    invoker.call(entry, force_stop_args()).await.unwrap();
    assert_eq!(bridge.service_lookups(), 2);
}

#[tokio::test]
async fn test_invoke_returns_remote_value() {
    let bridge = FakeBridge::ready();
    bridge.respond("getApplicationEnabledSetting", Ok(json!(3)));
    let invoker = invoker(&bridge, 34);
    let handle = invoker.get_service("package").unwrap();
    let value = invoker
        .invoke(
            "android.content.pm.IPackageManager",
            &handle,
            "getApplicationEnabledSetting",
            force_stop_args(),
        )
        .await
        .unwrap();
    assert_eq!(value, json!(3));
}

#[tokio::test]
async fn test_remote_security_error_propagates_as_value() {
    let bridge = FakeBridge::ready();
    bridge.respond(
        "forceStopPackage",
        Err(InvocationError::Security("Permission Denial".into())),
    );
    let entry = lookup(BackendCapability::Shizuku, Operation::ForceStop).unwrap();
    let err = invoker(&bridge, 34)
        .call(entry, force_stop_args())
        .await
        .unwrap_err();
    assert_eq!(err, InvocationError::Security("Permission Denial".into()));
    assert!(!err.is_contract_break());
}
