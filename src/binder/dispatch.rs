//! 远程调用分发表
//!
//! 每个条目描述一个特权操作在某个后端上的调用路由：服务名、接口类、方法名和参数签名。
//! 调用策略（隐藏 API 绕过 / 普通反射）由 `InvokeStrategy` 按系统版本在调用时决定。

use serde::Serialize;

use crate::backends::BackendCapability;

/// 通过 Binder 完成的特权操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// 强行停止应用
    ForceStop,
    /// 设置应用启用状态
    SetEnabledState,
    /// 查询应用启用状态
    QueryEnabledState,
    /// 清除应用缓存
    ClearCache,
    /// 创建远程子进程
    NewProcess,
}

/// Binder 调用路由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinderRoute {
    /// 系统服务名
    pub service: &'static str,
    /// 接口类名
    pub interface: &'static str,
    /// 方法名
    pub method: &'static str,
    /// 参数类型签名
    pub signature: &'static [&'static str],
}

/// 分发表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchEntry {
    pub operation: Operation,
    /// 需要的后端能力
    pub capability: BackendCapability,
    pub route: BinderRoute,
}

const ACTIVITY_MANAGER: &str = "android.app.IActivityManager";
const PACKAGE_MANAGER: &str = "android.content.pm.IPackageManager";
const STRING: &str = "java.lang.String";
const STRING_ARRAY: &str = "java.lang.String[]";
const PACKAGE_DATA_OBSERVER: &str = "android.content.pm.IPackageDataObserver";

const FORCE_STOP: BinderRoute = BinderRoute {
    service: "activity",
    interface: ACTIVITY_MANAGER,
    method: "forceStopPackage",
    signature: &[STRING, "int"],
};

const SET_ENABLED_STATE: BinderRoute = BinderRoute {
    service: "package",
    interface: PACKAGE_MANAGER,
    method: "setApplicationEnabledSetting",
    signature: &[STRING, "int", "int", "int", STRING],
};

const QUERY_ENABLED_STATE: BinderRoute = BinderRoute {
    service: "package",
    interface: PACKAGE_MANAGER,
    method: "getApplicationEnabledSetting",
    signature: &[STRING, "int"],
};

const CLEAR_CACHE: BinderRoute = BinderRoute {
    service: "package",
    interface: PACKAGE_MANAGER,
    method: "deleteApplicationCacheFilesAsUser",
    signature: &[STRING, "int", PACKAGE_DATA_OBSERVER],
};

static DISPATCH_TABLE: &[DispatchEntry] = &[
    // Shizuku
    DispatchEntry {
        operation: Operation::ForceStop,
        capability: BackendCapability::Shizuku,
        route: FORCE_STOP,
    },
    DispatchEntry {
        operation: Operation::SetEnabledState,
        capability: BackendCapability::Shizuku,
        route: SET_ENABLED_STATE,
    },
    DispatchEntry {
        operation: Operation::QueryEnabledState,
        capability: BackendCapability::Shizuku,
        route: QUERY_ENABLED_STATE,
    },
    DispatchEntry {
        operation: Operation::ClearCache,
        capability: BackendCapability::Shizuku,
        route: CLEAR_CACHE,
    },
    DispatchEntry {
        operation: Operation::NewProcess,
        capability: BackendCapability::Shizuku,
        route: BinderRoute {
            service: "shizuku",
            interface: "moe.shizuku.server.IShizukuService",
            method: "newProcess",
            signature: &[STRING_ARRAY, STRING_ARRAY, STRING],
        },
    },
    // Dhizuku
    DispatchEntry {
        operation: Operation::ForceStop,
        capability: BackendCapability::Dhizuku,
        route: FORCE_STOP,
    },
    DispatchEntry {
        operation: Operation::SetEnabledState,
        capability: BackendCapability::Dhizuku,
        route: SET_ENABLED_STATE,
    },
    DispatchEntry {
        operation: Operation::QueryEnabledState,
        capability: BackendCapability::Dhizuku,
        route: QUERY_ENABLED_STATE,
    },
    DispatchEntry {
        operation: Operation::ClearCache,
        capability: BackendCapability::Dhizuku,
        route: CLEAR_CACHE,
    },
    DispatchEntry {
        operation: Operation::NewProcess,
        capability: BackendCapability::Dhizuku,
        route: BinderRoute {
            service: "dhizuku",
            interface: "com.rosan.dhizuku.aidl.IDhizuku",
            method: "newProcess",
            signature: &[STRING_ARRAY, STRING_ARRAY, STRING],
        },
    },
];

/// 查找某后端上某操作的路由
pub fn lookup(capability: BackendCapability, operation: Operation) -> Option<&'static DispatchEntry> {
    DISPATCH_TABLE
        .iter()
        .find(|entry| entry.capability == capability && entry.operation == operation)
}

/// 某后端支持的全部操作
pub fn operations_for(capability: BackendCapability) -> Vec<Operation> {
    DISPATCH_TABLE
        .iter()
        .filter(|entry| entry.capability == capability)
        .map(|entry| entry.operation)
        .collect()
}
