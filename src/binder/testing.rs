//! 测试用的 Binder 桥接替身

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::bridge::{BinderArg, BinderBridge, BinderHandle, ServiceProxy};
use super::error::InvocationError;

/// 记录的一次调用
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub interface: String,
    pub method: String,
    pub args: Vec<BinderArg>,
    pub unrestricted: bool,
}

#[derive(Default)]
pub(crate) struct FakeState {
    installed: AtomicBool,
    running: AtomicBool,
    granted: AtomicBool,
    service_lookups: AtomicUsize,
    permission_requests: Mutex<Vec<i32>>,
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, Result<Value, InvocationError>>>,
    missing_methods: Mutex<HashSet<String>>,
    missing_interfaces: Mutex<HashSet<String>>,
    panic_methods: Mutex<HashSet<String>>,
}

/// 可编程的桥接替身，克隆后共享状态
#[derive(Clone, Default)]
pub(crate) struct FakeBridge(Arc<FakeState>);

impl FakeBridge {
    /// 已安装、运行中、已授权
    pub fn ready() -> Self {
        let bridge = Self::default();
        bridge.set_installed(true);
        bridge.set_running(true);
        bridge.set_granted(true);
        bridge
    }

    pub fn set_installed(&self, value: bool) {
        self.0.installed.store(value, Ordering::SeqCst);
    }

    pub fn set_running(&self, value: bool) {
        self.0.running.store(value, Ordering::SeqCst);
    }

    pub fn set_granted(&self, value: bool) {
        self.0.granted.store(value, Ordering::SeqCst);
    }

    pub fn respond(&self, method: &str, result: Result<Value, InvocationError>) {
        self.0.responses.lock().insert(method.to_string(), result);
    }

    pub fn remove_method(&self, method: &str) {
        self.0.missing_methods.lock().insert(method.to_string());
    }

    pub fn remove_interface(&self, interface: &str) {
        self.0.missing_interfaces.lock().insert(interface.to_string());
    }

    pub fn panic_on(&self, method: &str) {
        self.0.panic_methods.lock().insert(method.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    pub fn permission_requests(&self) -> Vec<i32> {
        self.0.permission_requests.lock().clone()
    }

    pub fn service_lookups(&self) -> usize {
        self.0.service_lookups.load(Ordering::SeqCst)
    }
}

impl BinderBridge for FakeBridge {
    fn is_installed(&self) -> bool {
        self.0.installed.load(Ordering::SeqCst)
    }

    fn ping(&self) -> bool {
        self.0.running.load(Ordering::SeqCst)
    }

    fn check_permission(&self) -> bool {
        self.0.granted.load(Ordering::SeqCst)
    }

    fn request_permission(&self, request_code: i32) {
        self.0.permission_requests.lock().push(request_code);
    }

    fn get_service(&self, name: &str) -> Option<BinderHandle> {
        let token = self.0.service_lookups.fetch_add(1, Ordering::SeqCst) as u64;
        Some(BinderHandle {
            service: name.to_string(),
            token,
        })
    }

    fn as_interface(
        &self,
        interface_name: &str,
        _handle: &BinderHandle,
    ) -> Result<Arc<dyn ServiceProxy>, InvocationError> {
        if self.0.missing_interfaces.lock().contains(interface_name) {
            return Err(InvocationError::ClassNotFound(interface_name.to_string()));
        }
        Ok(Arc::new(FakeProxy {
            interface: interface_name.to_string(),
            state: self.0.clone(),
        }))
    }
}

struct FakeProxy {
    interface: String,
    state: Arc<FakeState>,
}

impl FakeProxy {
    fn record(
        &self,
        method: &str,
        args: &[BinderArg],
        unrestricted: bool,
    ) -> Result<Value, InvocationError> {
        if self.state.panic_methods.lock().contains(method) {
            panic!("桥接实现内部错误: {}", method);
        }
        self.state.calls.lock().push(RecordedCall {
            interface: self.interface.clone(),
            method: method.to_string(),
            args: args.to_vec(),
            unrestricted,
        });
        self.state
            .responses
            .lock()
            .get(method)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }
}

impl ServiceProxy for FakeProxy {
    fn find_method(&self, method: &str, _param_types: &[&str]) -> bool {
        !self.state.missing_methods.lock().contains(method)
    }

    fn invoke(&self, method: &str, args: &[BinderArg]) -> Result<Value, InvocationError> {
        self.record(method, args, false)
    }

    fn invoke_unrestricted(
        &self,
        method: &str,
        args: &[BinderArg],
    ) -> Result<Value, InvocationError> {
        if self.state.missing_methods.lock().contains(method) {
            return Err(InvocationError::MethodNotFound(method.to_string()));
        }
        self.record(method, args, true)
    }
}
