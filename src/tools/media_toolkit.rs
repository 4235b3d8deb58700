use super::ffmpeg_command::FfmpegCommand;
use super::ffprobe_info::{Chapter, VideoInfo, get_chapters, get_video_info};
use super::media_error::MediaError;
use super::process_runner::{
    join_pipe_reader, kill_and_discard, run_cancellable, spawn_stderr_reader,
};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 一個被取樣的幀
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaSample {
    pub frame_index: u64,
    /// 片段內的時間（秒）
    pub time: f64,
    /// 平均亮度（0-255）
    pub mean_luma: f64,
}

/// 外部探測 / 轉碼工具的介面
///
/// 正式環境使用 [`FfmpegToolkit`]；測試可以注入假的實作。
pub trait MediaToolkit: Send + Sync {
    fn probe_chapters(&self, path: &Path) -> Result<Vec<Chapter>>;

    fn probe_video(&self, path: &Path) -> Result<VideoInfo>;

    /// 回傳 silencedetect 的診斷輸出（含 `silence_start` / `silence_end` 行）
    fn silence_report(&self, path: &Path, noise_db: f64, min_duration: f64) -> Result<String>;

    fn encode_proxy(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        height: u32,
        destination: &Path,
    ) -> Result<()>;

    /// 依序解碼，每 `stride` 幀呼叫一次 `visit`；回傳解碼的總幀數
    fn decode_luma(
        &self,
        clip: &Path,
        stride: u32,
        visit: &mut dyn FnMut(LumaSample),
    ) -> Result<u64>;

    /// 在 `cut_points` 分割，輸出依 `output_pattern`（`%03d`，從 0 開始）編號
    fn split_segments(&self, source: &Path, cut_points: &[f64], output_pattern: &Path)
    -> Result<()>;
}

pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    shutdown_signal: Arc<AtomicBool>,
}

impl FfmpegToolkit {
    #[must_use]
    pub fn new(shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            shutdown_signal,
        }
    }

    fn tail(stderr: &str) -> String {
        let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        lines[lines.len().saturating_sub(5)..].join("\n")
    }
}

#[must_use]
pub fn mean_luma(frame: &[u8]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: u64 = frame.iter().map(|&b| u64::from(b)).sum();
    sum as f64 / frame.len() as f64
}

impl MediaToolkit for FfmpegToolkit {
    fn probe_chapters(&self, path: &Path) -> Result<Vec<Chapter>> {
        get_chapters(&self.ffprobe, path, &self.shutdown_signal)
    }

    fn probe_video(&self, path: &Path) -> Result<VideoInfo> {
        get_video_info(&self.ffprobe, path, &self.shutdown_signal)
    }

    fn silence_report(&self, path: &Path, noise_db: f64, min_duration: f64) -> Result<String> {
        if !path.exists() {
            return Err(MediaError::InputNotFound(path.to_path_buf()).into());
        }

        let cmd = FfmpegCommand::new(&self.ffmpeg, path).silence_detect(noise_db, min_duration);
        let output = run_cancellable(cmd, &self.shutdown_signal, &[])
            .with_context(|| format!("靜音偵測失敗: {}", path.display()))?;

        if !output.status.success() {
            return Err(MediaError::tool_failure("ffmpeg", Self::tail(&output.stderr)).into());
        }

        Ok(output.stderr)
    }

    fn encode_proxy(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        height: u32,
        destination: &Path,
    ) -> Result<()> {
        let cmd = FfmpegCommand::new(&self.ffmpeg, source).proxy_clip(start, end, height, destination);
        let output = run_cancellable(cmd, &self.shutdown_signal, &[destination])?;

        if !output.status.success() {
            let _ = fs::remove_file(destination);
            return Err(MediaError::tool_failure("ffmpeg", Self::tail(&output.stderr)).into());
        }

        let size = fs::metadata(destination).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let _ = fs::remove_file(destination);
            return Err(MediaError::tool_failure(
                "ffmpeg",
                format!("代理片段未建立或為空: {}", destination.display()),
            )
            .into());
        }

        Ok(())
    }

    fn decode_luma(
        &self,
        clip: &Path,
        stride: u32,
        visit: &mut dyn FnMut(LumaSample),
    ) -> Result<u64> {
        let decode_failure = |message: String| MediaError::DecodeFailure {
            path: clip.to_path_buf(),
            message,
        };

        let info = get_video_info(&self.ffprobe, clip, &self.shutdown_signal).map_err(|e| {
            if matches!(e.downcast_ref::<MediaError>(), Some(MediaError::Cancelled)) {
                e
            } else {
                decode_failure(format!("{e:#}")).into()
            }
        })?;
        let frame_size = info.width as usize * info.height as usize;
        if frame_size == 0 {
            return Err(decode_failure("影像尺寸為 0".to_string()).into());
        }

        let mut child = FfmpegCommand::new(&self.ffmpeg, clip)
            .luma_frames()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| decode_failure(format!("無法啟動 ffmpeg: {e}")))?;
        let stderr_reader = spawn_stderr_reader(&mut child);

        let Some(stdout) = child.stdout.take() else {
            kill_and_discard(&mut child, &[]);
            join_pipe_reader(stderr_reader);
            return Err(decode_failure("無法讀取 ffmpeg 輸出".to_string()).into());
        };

        let stride = u64::from(stride.max(1));
        let mut reader = BufReader::with_capacity(frame_size * 4, stdout);
        let mut frame = vec![0u8; frame_size];
        let mut decoded: u64 = 0;

        loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                kill_and_discard(&mut child, &[]);
                join_pipe_reader(stderr_reader);
                return Err(MediaError::Cancelled.into());
            }

            match reader.read_exact(&mut frame) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    kill_and_discard(&mut child, &[]);
                    join_pipe_reader(stderr_reader);
                    return Err(decode_failure(format!("讀取幀資料失敗: {e}")).into());
                }
            }

            if decoded % stride == 0 {
                visit(LumaSample {
                    frame_index: decoded,
                    time: decoded as f64 / info.frame_rate,
                    mean_luma: mean_luma(&frame),
                });
            }
            decoded += 1;
        }

        drop(reader);
        let status = child
            .wait()
            .with_context(|| format!("無法等待 ffmpeg 結束: {}", clip.display()))?;
        let stderr = join_pipe_reader(stderr_reader);

        if !status.success() {
            if decoded == 0 {
                return Err(decode_failure(Self::tail(&stderr)).into());
            }
            warn!(
                "解碼結束但有錯誤 ({} 幀): {}: {}",
                decoded,
                clip.display(),
                Self::tail(&stderr)
            );
        }

        debug!("解碼 {} 幀: {}", decoded, clip.display());
        Ok(decoded)
    }

    fn split_segments(
        &self,
        source: &Path,
        cut_points: &[f64],
        output_pattern: &Path,
    ) -> Result<()> {
        if !source.exists() {
            return Err(MediaError::InputNotFound(source.to_path_buf()).into());
        }

        let cmd = FfmpegCommand::new(&self.ffmpeg, source).segment_split(cut_points, output_pattern);
        let output = run_cancellable(cmd, &self.shutdown_signal, &[])?;

        if !output.status.success() {
            return Err(MediaError::tool_failure("ffmpeg", Self::tail(&output.stderr)).into());
        }

        Ok(())
    }
}
