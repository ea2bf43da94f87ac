//! Shell 会话状态定义

use serde::{Deserialize, Serialize};

/// Shell 会话生命周期状态
///
/// `Uninitialized → Starting → Ready → Dead`，`Dead` 之后下一次提交任务会重新进入 `Starting`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ShellStatus {
    /// 尚未启动过进程
    Uninitialized,
    /// 正在启动进程
    Starting,
    /// 进程可用
    Ready {
        /// 探测到的 root 能力（每次进程启动探测一次）
        root: bool,
    },
    /// 进程已退出，等待下一次使用时重启
    Dead,
}

impl Default for ShellStatus {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl ShellStatus {
    /// 是否处于可用状态
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}
