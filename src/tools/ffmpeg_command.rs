use std::path::{Path, PathBuf};
use std::process::Command;

/// 以單一來源檔為中心的 ffmpeg 命令產生器
pub struct FfmpegCommand {
    program: PathBuf,
    source_path: PathBuf,
}

impl FfmpegCommand {
    #[must_use]
    pub fn new(program: &Path, source_path: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            source_path: source_path.to_path_buf(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-nostdin", "-nostats"]);
        cmd
    }

    /// silencedetect：結果輸出在 stderr（silence_start / silence_end）
    #[must_use]
    pub fn silence_detect(&self, noise_db: f64, min_duration: f64) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["-loglevel", "info", "-i"])
            .arg(&self.source_path)
            .args([
                "-vn",
                "-sn",
                "-dn",
                "-af",
                &format!("silencedetect=noise={noise_db}dB:d={min_duration}"),
                "-f",
                "null",
                "-",
            ]);
        cmd
    }

    /// 產生 `[start, end)` 的縮小代理片段，低畫質、快速解碼
    #[must_use]
    pub fn proxy_clip(&self, start: f64, end: f64, height: u32, destination: &Path) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["-loglevel", "error", "-y", "-ss", &format!("{start:.3}"), "-i"])
            .arg(&self.source_path)
            .args([
                "-t",
                &format!("{:.3}", end - start),
                "-map",
                "0:v:0",
                "-an",
                "-sn",
                "-dn",
                "-vf",
                &format!("scale=-2:{height}"),
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-tune",
                "fastdecode",
                "-crf",
                "32",
                "-f",
                "mp4",
            ])
            .arg(destination);
        cmd
    }

    /// 將影片解碼成灰階 rawvideo 輸出到 stdout，每幀 width*height 位元組
    #[must_use]
    pub fn luma_frames(&self) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["-loglevel", "error", "-i"])
            .arg(&self.source_path)
            .args([
                "-map",
                "0:v:0",
                "-an",
                "-sn",
                "-dn",
                "-vsync",
                "passthrough",
                "-vf",
                "scale=out_range=full,format=gray",
                "-pix_fmt",
                "gray",
                "-f",
                "rawvideo",
                "-",
            ]);
        cmd
    }

    /// 依切點分割（不重新編碼），輸出檔名由 `output_pattern` 的 `%03d` 編號
    #[must_use]
    pub fn segment_split(&self, cut_points: &[f64], output_pattern: &Path) -> Command {
        let mut cmd = self.base_command();
        cmd.args(["-loglevel", "error", "-y", "-i"])
            .arg(&self.source_path)
            .args(["-map", "0", "-c", "copy", "-f", "segment"]);

        if !cut_points.is_empty() {
            let times: Vec<String> = cut_points.iter().map(|t| format!("{t:.3}")).collect();
            cmd.args(["-segment_times", &times.join(",")]);
        }

        cmd.args(["-segment_start_number", "0", "-reset_timestamps", "1"])
            .arg(output_pattern);
        cmd
    }
}
