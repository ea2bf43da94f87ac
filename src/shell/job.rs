//! Shell 任务定义
//!
//! 一个任务由若干条命令组成，整体写入 Shell，输出按提交顺序整体收集。
//!
//! ## 结束标记协议
//! 每个任务末尾追加一段结束标记：stdout 上输出 `<marker>:<exit_code>`，stderr 上输出 `<marker>`。
//! 读取端看到两个标记后即认为任务结束，标记之前不带换行的残余输出仍作为一行保留。
//! 每条命令在当前 Shell 的命令组中执行，stdin 重定向到 `/dev/null`。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// 最后一条命令的退出码
    pub exit_code: i32,
    /// 标准输出（已过滤空行）
    pub stdout: Vec<String>,
    /// 标准错误（已过滤空行）
    pub stderr: Vec<String>,
}

impl JobResult {
    /// 创建结果，输出中的空行会被过滤
    pub fn new(exit_code: i32, stdout: Vec<String>, stderr: Vec<String>) -> Self {
        Self {
            exit_code,
            stdout: filter_output(stdout.into_iter().map(Some)),
            stderr: filter_output(stderr.into_iter().map(Some)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// 合并输出：优先 stdout，stdout 为空时使用 stderr
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.join("\n")
        } else {
            self.stdout.join("\n")
        }
    }
}

/// 判断一行输出是否有效（非空且不全是空白）
pub fn is_valid_output(line: Option<&str>) -> bool {
    line.map(|l| !l.trim().is_empty()).unwrap_or(false)
}

/// 过滤空行，保持原有顺序
pub fn filter_output<I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    lines
        .into_iter()
        .flatten()
        .filter(|line| is_valid_output(Some(line)))
        .collect()
}

/// 单引号转义：整体包在 `'...'` 中，内部的 `'` 替换为 `'\''`
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// 写入 Shell 的任务脚本
pub(crate) struct JobScript {
    marker: String,
    text: String,
}

impl JobScript {
    pub(crate) fn new(commands: &[String]) -> Self {
        let marker = format!("__PRIVBROKER_{}__", Uuid::new_v4().simple());
        let mut text = String::new();
        // 命令的 stdin 指向 /dev/null，否则读 stdin 的命令会吃掉后续脚本
        for command in commands {
            text.push_str("{ :; ");
            text.push_str(command);
            text.push_str("\n} </dev/null\n");
        }
        text.push_str(&format!(
            "__pb_rc=$?; echo \"{marker}:$__pb_rc\"; echo \"{marker}\" >&2\n"
        ));
        Self { marker, text }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// 在一行中查找结束标记，返回 (标记前的残余输出, 标记后的内容)
    pub(crate) fn split_marker<'a>(&self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let index = line.find(&self.marker)?;
        Some((&line[..index], &line[index + self.marker.len()..]))
    }

    /// 解析 stdout 标记后的退出码（`:<code>`）
    pub(crate) fn parse_exit_code(rest: &str) -> i32 {
        rest.trim()
            .trim_start_matches(':')
            .trim()
            .parse()
            .unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("com.example.app"), "'com.example.app'");
    }

    #[test]
    fn test_quote_embedded_single_quote() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_job_result_filters_blank_lines() {
        let result = JobResult::new(
            0,
            vec!["".into(), "a".into(), "   ".into(), "b".into()],
            vec!["\t".into()],
        );
        assert_eq!(result.stdout, vec!["a", "b"]);
        assert!(result.stderr.is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_combined_output_falls_back_to_stderr() {
        let result = JobResult::new(1, vec![], vec!["Failure".into()]);
        assert_eq!(result.combined_output(), "Failure");
        assert!(!result.is_success());
    }

    #[test]
    fn test_script_marker_split() {
        let script = JobScript::new(&["printf abc".to_string()]);
        let line = format!("abc{}:0", script.marker);
        let (prefix, rest) = script.split_marker(&line).unwrap();
        assert_eq!(prefix, "abc");
        assert_eq!(JobScript::parse_exit_code(rest), 0);
        assert!(script.split_marker("plain line").is_none());
    }

    #[test]
    fn test_script_contains_commands_in_order() {
        let script = JobScript::new(&["echo 1".to_string(), "echo 2".to_string()]);
        let first = script.text().find("echo 1").unwrap();
        let second = script.text().find("echo 2").unwrap();
        assert!(first < second);
        assert!(script.text().ends_with(">&2\n"));
    }

    #[test]
    fn test_script_detaches_command_stdin() {
        let script = JobScript::new(&["cat".to_string()]);
        assert!(script.text().starts_with("{ :; cat\n} </dev/null\n"));
    }

    #[test]
    fn test_parse_exit_code_garbage() {
        assert_eq!(JobScript::parse_exit_code(":abc"), -1);
        assert_eq!(JobScript::parse_exit_code(":127"), 127);
    }
}
