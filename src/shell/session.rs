//! 特权 Shell 会话
//!
//! 封装一个长期存活的特权 Shell 进程，所有命令通过任务队列串行执行。
//!
//! ## 功能
//! - 首次使用时懒启动进程，进程退出后下次使用时自动重启
//! - 任务按提交顺序执行并返回结果，输出不会交错
//! - 支持等待式 (`run`) 与流式 (`stream`) 两种执行方式
//! - 每次启动进程时探测一次 root 能力并缓存
//!
//! ## 架构说明
//! 会话内部只有一个工作任务持有子进程，`run`/`stream` 只是把任务投递到无界队列。
//! 流式消费者提前放弃时只会丢弃自己的输出通道，工作任务仍会把该任务读完，
//! 保证 Shell 的输入输出不会错位。

use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::BoxStream;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::error::ShellError;
use super::events::ShellStatus;
use super::job::{is_valid_output, JobResult, JobScript};
use crate::config::ShellConfig;

/// 任务输出去向
enum JobSink {
    /// 收集完整结果后一次性返回
    Collect(oneshot::Sender<Result<JobResult, ShellError>>),
    /// 逐行推送
    Stream(mpsc::UnboundedSender<Result<String, ShellError>>),
}

/// 队列中的任务
struct Job {
    commands: Vec<String>,
    sink: JobSink,
}

/// 特权 Shell 会话
///
/// 通过 `Arc<ShellSession>` 在所有需要 root 的后端之间共享。
pub struct ShellSession {
    /// Shell 配置
    config: ShellConfig,
    /// 任务队列发送端
    jobs: mpsc::UnboundedSender<Job>,
    /// 任务队列接收端（首次使用时交给工作任务）
    pending_worker: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    /// 会话状态
    status: Arc<RwLock<ShellStatus>>,
    /// 关闭信号
    shutdown: CancellationToken,
}

impl ShellSession {
    /// 创建新的会话（不会立即启动进程）
    pub fn new(config: ShellConfig) -> Self {
        let (jobs, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            jobs,
            pending_worker: Mutex::new(Some(receiver)),
            status: Arc::new(RwLock::new(ShellStatus::Uninitialized)),
            shutdown: CancellationToken::new(),
        }
    }

    /// 获取当前状态
    pub fn status(&self) -> ShellStatus {
        *self.status.read()
    }

    /// 检查 root 是否可用
    ///
    /// 进程就绪后直接返回缓存的探测结果；否则先启动进程。
    pub async fn is_root_available(&self) -> bool {
        if let ShellStatus::Ready { root } = self.status() {
            return root;
        }
        if let Err(e) = self.run(["true"]).await {
            tracing::debug!("[Shell] root 探测失败: {}", e);
            return false;
        }
        matches!(self.status(), ShellStatus::Ready { root: true })
    }

    /// 执行一组命令并等待结果
    ///
    /// 所有命令作为一个任务提交，退出码为最后一条命令的退出码。
    pub async fn run<I, S>(&self, commands: I) -> Result<JobResult, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands = Self::collect_commands(commands)?;
        let (tx, rx) = oneshot::channel();
        self.submit(Job {
            commands,
            sink: JobSink::Collect(tx),
        })?;
        rx.await.map_err(|_| ShellError::SessionClosed)?
    }

    /// 以流的方式执行一组命令
    ///
    /// 每个元素是一行输出（stdout 与 stderr 按读取顺序混合），任务结束时流结束。
    /// 任务失败时最后一个元素为 `Err`。丢弃流不会终止 Shell 进程。
    pub fn stream<I, S>(
        self: &Arc<Self>,
        commands: I,
    ) -> BoxStream<'static, Result<String, ShellError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let session = Arc::clone(self);
        let commands = Self::collect_commands(commands);

        Box::pin(async_stream::stream! {
            let commands = match commands {
                Ok(commands) => commands,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let (tx, mut rx) = mpsc::unbounded_channel();
            if let Err(e) = session.submit(Job { commands, sink: JobSink::Stream(tx) }) {
                yield Err(e);
                return;
            }
            while let Some(item) = rx.recv().await {
                yield item;
            }
        })
    }

    /// 关闭会话并结束 Shell 进程
    pub fn close(&self) {
        tracing::info!("[Shell] 关闭会话");
        self.shutdown.cancel();
    }

    fn collect_commands<I, S>(commands: I) -> Result<Vec<String>, ShellError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands: Vec<String> = commands.into_iter().map(Into::into).collect();
        if commands.is_empty() {
            return Err(ShellError::EmptyCommand);
        }
        Ok(commands)
    }

    fn submit(&self, job: Job) -> Result<(), ShellError> {
        if self.shutdown.is_cancelled() {
            return Err(ShellError::SessionClosed);
        }
        self.ensure_worker();
        self.jobs.send(job).map_err(|_| ShellError::SessionClosed)
    }

    /// 首次使用时启动工作任务
    fn ensure_worker(&self) {
        let mut pending = self.pending_worker.lock();
        if let Some(receiver) = pending.take() {
            let worker = ShellWorker {
                config: self.config.clone(),
                status: self.status.clone(),
                process: None,
            };
            tokio::spawn(worker.run(receiver, self.shutdown.clone()));
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// 输出来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputSource {
    Stdout,
    Stderr,
}

/// 持有子进程的工作任务
struct ShellWorker {
    config: ShellConfig,
    status: Arc<RwLock<ShellStatus>>,
    process: Option<ShellProcess>,
}

impl ShellWorker {
    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>, shutdown: CancellationToken) {
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.handle(job).await;
        }

        if let Some(mut process) = self.process.take() {
            process.kill().await;
        }
        *self.status.write() = ShellStatus::Dead;
        tracing::info!("[Shell] 工作任务已退出");
    }

    async fn handle(&mut self, job: Job) {
        let Job { commands, sink } = job;

        let process = match self.ensure_process().await {
            Ok(process) => process,
            Err(e) => {
                sink.fail(e);
                return;
            }
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = process
            .execute(&commands, |line, source| match &sink {
                JobSink::Stream(tx) => {
                    // 消费者已放弃时忽略发送失败，继续把任务读完
                    let _ = tx.send(Ok(line));
                }
                JobSink::Collect(_) => match source {
                    OutputSource::Stdout => stdout.push(line),
                    OutputSource::Stderr => stderr.push(line),
                },
            })
            .await;

        match result {
            Ok(exit_code) => {
                tracing::debug!("[Shell] 任务完成 ({} 条命令)，退出码: {}", commands.len(), exit_code);
                sink.complete(JobResult::new(exit_code, stdout, stderr));
            }
            Err(e) => {
                tracing::warn!("[Shell] 任务执行期间进程异常: {}", e);
                self.mark_dead().await;
                sink.fail(e);
            }
        }
    }

    /// 确保进程可用，必要时（首次使用或进程已退出）启动新进程
    async fn ensure_process(&mut self) -> Result<&mut ShellProcess, ShellError> {
        let alive = match self.process.as_mut() {
            Some(process) => process.is_alive(),
            None => false,
        };
        if !alive {
            if self.process.is_some() {
                tracing::info!("[Shell] 检测到进程已退出，准备重启");
                self.mark_dead().await;
            }
            let process = self.start().await?;
            self.process = Some(process);
        }
        self.process
            .as_mut()
            .ok_or_else(|| ShellError::BackendUnavailable("Shell 进程不存在".into()))
    }

    async fn start(&mut self) -> Result<ShellProcess, ShellError> {
        *self.status.write() = ShellStatus::Starting;
        tracing::info!("[Shell] 启动 Shell 进程: {}", self.config.binary);

        let mut process = match ShellProcess::spawn(&self.config) {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!("[Shell] 启动失败: {}", e);
                *self.status.write() = ShellStatus::Dead;
                return Err(e);
            }
        };

        // 探测 root；探测阶段进程退出（例如 su 被拒绝）视为不可用
        let mut probe_output = Vec::new();
        let probe = process
            .execute(&[self.config.root_probe.clone()], |line, source| {
                if source == OutputSource::Stdout {
                    probe_output.push(line);
                }
            })
            .await;

        match probe {
            Ok(_) => {
                let root = probe_output.iter().any(|line| line.trim() == "0");
                *self.status.write() = ShellStatus::Ready { root };
                tracing::info!(
                    "[Shell] 进程就绪 (pid: {:?}, root: {}, 启动时间: {})",
                    process.child.id(),
                    root,
                    Utc::now().timestamp_millis()
                );
                Ok(process)
            }
            Err(e) => {
                process.kill().await;
                *self.status.write() = ShellStatus::Dead;
                tracing::warn!("[Shell] 进程启动后立即退出: {}", e);
                Err(ShellError::BackendUnavailable(e.to_string()))
            }
        }
    }

    async fn mark_dead(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill().await;
        }
        *self.status.write() = ShellStatus::Dead;
    }
}

impl JobSink {
    fn complete(self, result: JobResult) {
        match self {
            JobSink::Collect(tx) => {
                let _ = tx.send(Ok(result));
            }
            // 流式任务的行已经推送完毕，非零退出码以一条错误结束
            JobSink::Stream(tx) => {
                if !result.is_success() {
                    let _ = tx.send(Err(ShellError::Io(format!(
                        "命令退出码: {}",
                        result.exit_code
                    ))));
                }
            }
        }
    }

    fn fail(self, error: ShellError) {
        match self {
            JobSink::Collect(tx) => {
                let _ = tx.send(Err(error));
            }
            JobSink::Stream(tx) => {
                let _ = tx.send(Err(error));
            }
        }
    }
}

/// Shell 子进程及其管道
struct ShellProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Lines<BufReader<ChildStderr>>,
}

impl ShellProcess {
    fn spawn(config: &ShellConfig) -> Result<Self, ShellError> {
        let mut child = Command::new(&config.binary)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShellError::BackendUnavailable(format!("{}: {}", config.binary, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellError::BackendUnavailable("无法获取进程 stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::BackendUnavailable("无法获取进程 stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShellError::BackendUnavailable("无法获取进程 stderr".into()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: BufReader::new(stderr).lines(),
        })
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("[Shell] 结束进程失败: {}", e);
        }
    }

    /// 写入任务并读取输出直到两个结束标记都出现
    async fn execute<F>(&mut self, commands: &[String], mut on_line: F) -> Result<i32, ShellError>
    where
        F: FnMut(String, OutputSource),
    {
        let script = JobScript::new(commands);
        self.stdin
            .write_all(script.text().as_bytes())
            .await
            .map_err(|e| ShellError::Io(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ShellError::Io(e.to_string()))?;

        let mut exit_code: Option<i32> = None;
        let mut stderr_done = false;

        while exit_code.is_none() || !stderr_done {
            tokio::select! {
                line = self.stdout.next_line(), if exit_code.is_none() => {
                    let line = line
                        .map_err(|e| ShellError::Io(e.to_string()))?
                        .ok_or_else(|| ShellError::Io("Shell 进程已退出 (stdout EOF)".into()))?;
                    match script.split_marker(&line) {
                        Some((rest_of_output, tail)) => {
                            if is_valid_output(Some(rest_of_output)) {
                                on_line(rest_of_output.to_string(), OutputSource::Stdout);
                            }
                            exit_code = Some(JobScript::parse_exit_code(tail));
                        }
                        None => {
                            if is_valid_output(Some(&line)) {
                                on_line(line, OutputSource::Stdout);
                            }
                        }
                    }
                }
                line = self.stderr.next_line(), if !stderr_done => {
                    let line = line
                        .map_err(|e| ShellError::Io(e.to_string()))?
                        .ok_or_else(|| ShellError::Io("Shell 进程已退出 (stderr EOF)".into()))?;
                    match script.split_marker(&line) {
                        Some((rest_of_output, _)) => {
                            if is_valid_output(Some(rest_of_output)) {
                                on_line(rest_of_output.to_string(), OutputSource::Stderr);
                            }
                            stderr_done = true;
                        }
                        None => {
                            if is_valid_output(Some(&line)) {
                                on_line(line, OutputSource::Stderr);
                            }
                        }
                    }
                }
            }
        }

        Ok(exit_code.unwrap_or(-1))
    }
}
