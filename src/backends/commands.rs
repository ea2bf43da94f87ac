//! 特权 Shell 命令构造与输出解析
//!
//! 所有包名、路径等外部输入都经过 `quote()` 转义后再拼接。
//! 包名还会拼进文件路径，调用方需先用 `is_valid_package_name` 校验。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::shell::quote;

static PACKAGE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").ok());

/// 包名是否符合 Android 包名语法（至少两段，段首为字母）
pub fn is_valid_package_name(package: &str) -> bool {
    PACKAGE_NAME
        .as_ref()
        .map(|re| re.is_match(package))
        .unwrap_or(false)
}

/// 强行停止应用
pub fn force_stop(package: &str) -> String {
    format!("am force-stop {}", quote(package))
}

/// 禁用 / 启用应用
pub fn set_disabled(package: &str, disabled: bool, user_id: i32) -> String {
    if disabled {
        format!("pm disable-user --user {} {}", user_id, quote(package))
    } else {
        format!("pm enable --user {} {}", user_id, quote(package))
    }
}

/// 列出处于禁用状态的指定包
pub fn list_disabled(package: &str) -> String {
    format!("pm list packages -d {}", quote(package))
}

/// 应用缓存目录
pub fn cache_dirs(package: &str) -> Vec<String> {
    vec![
        format!("/data/data/{}/cache", package),
        format!("/data/data/{}/code_cache", package),
        format!("/sdcard/Android/data/{}/cache", package),
    ]
}

fn quoted_cache_dirs(package: &str) -> String {
    cache_dirs(package)
        .iter()
        .map(|dir| quote(dir))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 清除应用缓存
pub fn clear_cache(package: &str) -> String {
    format!("rm -rf {}", quoted_cache_dirs(package))
}

/// 统计应用缓存大小（KB）
pub fn cache_size(package: &str) -> String {
    format!("du -sk {} 2>/dev/null", quoted_cache_dirs(package))
}

/// 卸载应用
pub fn uninstall(package: &str) -> String {
    format!("pm uninstall {}", quote(package))
}

/// 为用户重新安装已存在于系统中的应用
pub fn reinstall(package: &str, user_id: i32) -> String {
    format!("pm install-existing --user {} {}", user_id, quote(package))
}

/// 安装安装包（允许覆盖与降级）
pub fn install(path: &str) -> String {
    format!("pm install -r -d {}", quote(path))
}

/// 重启设备
pub fn reboot(reason: Option<&str>) -> String {
    match reason.filter(|r| !r.trim().is_empty()) {
        Some(reason) => {
            let reason = quote(reason);
            format!("svc power reboot {reason} || reboot {reason}")
        }
        None => "svc power reboot || reboot".to_string(),
    }
}

/// 判断 `pm` 输出是否表示失败
///
/// `pm` 在部分系统上失败时仍返回 0，需要同时检查输出中的 `Failure`。
pub fn is_pm_failure(exit_code: i32, output: &str) -> bool {
    exit_code != 0 || output.contains("Failure")
}

/// `pm list packages -d` 的输出中是否包含该包
pub fn contains_package(lines: &[String], package: &str) -> bool {
    let expected = format!("package:{}", package);
    lines.iter().any(|line| line.trim() == expected)
}

/// 解析 `du -sk` 输出并求和，返回字节数；无可解析行时返回 -1
pub fn parse_du_output(output: &str) -> i64 {
    let sizes: Vec<i64> = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|size| size.parse::<i64>().ok())
        .collect();
    if sizes.is_empty() {
        return -1;
    }
    sizes.iter().sum::<i64>() * 1024
}
