use super::media_error::MediaError;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// 只有 `run_cancellable_capture` 會收集，其餘為空字串
    pub stdout: String,
    pub stderr: String,
}

fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buffer = String::new();
        if let Err(e) = pipe.read_to_string(&mut buffer) {
            debug!("讀取子程序輸出失敗: {e}");
        }
        buffer
    }))
}

/// 在背景執行緒讀完 stderr，避免管線塞滿導致子程序卡住
pub fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<String>> {
    spawn_pipe_reader(child.stderr.take())
}

pub fn join_pipe_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// 終止子程序並刪除未完成的輸出
pub fn kill_and_discard(child: &mut Child, partial_outputs: &[&Path]) {
    let _ = child.kill();
    let _ = child.wait();

    for path in partial_outputs {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!("無法刪除中斷的輸出檔案 {}: {}", path.display(), e);
            } else {
                debug!("已刪除中斷的輸出檔案: {}", path.display());
            }
        }
    }
}

/// 執行外部程序直到結束；收到中斷信號時終止程序並刪除 `partial_outputs`
pub fn run_cancellable(
    command: Command,
    shutdown_signal: &AtomicBool,
    partial_outputs: &[&Path],
) -> Result<ProcessOutput> {
    run_polling(command, shutdown_signal, partial_outputs, false)
}

/// 同 `run_cancellable`，另外收集 stdout（ffprobe 的 JSON）
pub fn run_cancellable_capture(
    command: Command,
    shutdown_signal: &AtomicBool,
) -> Result<ProcessOutput> {
    run_polling(command, shutdown_signal, &[], true)
}

fn run_polling(
    mut command: Command,
    shutdown_signal: &AtomicBool,
    partial_outputs: &[&Path],
    capture_stdout: bool,
) -> Result<ProcessOutput> {
    let stdout = if capture_stdout {
        Stdio::piped()
    } else {
        Stdio::null()
    };
    command.stdin(Stdio::null()).stdout(stdout).stderr(Stdio::piped());

    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .spawn()
        .with_context(|| format!("無法啟動 {program}"))?;
    let stdout_reader = spawn_pipe_reader(child.stdout.take());
    let stderr_reader = spawn_stderr_reader(&mut child);

    loop {
        if shutdown_signal.load(Ordering::SeqCst) {
            warn!("收到中斷信號，終止程序 [{}] {program}", child.id());
            kill_and_discard(&mut child, partial_outputs);
            join_pipe_reader(stdout_reader);
            join_pipe_reader(stderr_reader);
            return Err(MediaError::Cancelled.into());
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(ProcessOutput {
                    status,
                    stdout: join_pipe_reader(stdout_reader),
                    stderr: join_pipe_reader(stderr_reader),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_and_discard(&mut child, partial_outputs);
                join_pipe_reader(stdout_reader);
                join_pipe_reader(stderr_reader);
                return Err(e).with_context(|| format!("無法檢查程序狀態: {program}"));
            }
        }
    }
}
