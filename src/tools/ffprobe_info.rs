use super::media_error::MediaError;
use super::process_runner::run_cancellable_capture;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// 容器內嵌的章節（秒）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
    chapters: Option<Vec<ChapterInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ChapterInfo {
    start_time: Option<String>,
    end_time: Option<String>,
}

/// 執行 ffprobe 並回傳 JSON 輸出；收到中斷信號時終止 ffprobe
fn run_ffprobe(
    ffprobe: &Path,
    path: &Path,
    sections: &[&str],
    shutdown_signal: &AtomicBool,
) -> Result<String> {
    if !path.exists() {
        return Err(MediaError::InputNotFound(path.to_path_buf()).into());
    }

    let mut command = Command::new(ffprobe);
    command
        .args(["-v", "error", "-print_format", "json"])
        .args(sections)
        .arg(path);
    let output = run_cancellable_capture(command, shutdown_signal)
        .with_context(|| format!("無法執行 ffprobe: {}", path.display()))?;

    if !output.status.success() {
        return Err(MediaError::tool_failure("ffprobe", output.stderr.trim().to_string()).into());
    }

    Ok(output.stdout)
}

/// 使用 ffprobe 取得影片資訊
pub fn get_video_info(
    ffprobe: &Path,
    path: &Path,
    shutdown_signal: &AtomicBool,
) -> Result<VideoInfo> {
    let json = run_ffprobe(ffprobe, path, &["-show_format", "-show_streams"], shutdown_signal)?;
    parse_video_info(&json).with_context(|| format!("無法解析影片資訊: {}", path.display()))
}

/// 使用 ffprobe 列出章節
pub fn get_chapters(
    ffprobe: &Path,
    path: &Path,
    shutdown_signal: &AtomicBool,
) -> Result<Vec<Chapter>> {
    let json = run_ffprobe(ffprobe, path, &["-show_chapters"], shutdown_signal)?;
    parse_chapters(&json).with_context(|| format!("無法解析章節資訊: {}", path.display()))
}

fn parse_video_info(json: &str) -> Result<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json).context("無法解析 ffprobe 輸出")?;

    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| anyhow!("找不到視訊串流"))?;

    let width = video_stream.width.ok_or_else(|| anyhow!("無法取得影片寬度"))?;
    let height = video_stream
        .height
        .ok_or_else(|| anyhow!("無法取得影片高度"))?;

    // 優先從 format 取長度，其次從 stream
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("無法取得影片長度"))?;

    // 平均幀率較接近實際解碼幀數；VFR 來源的 r_frame_rate 常常偏高
    let frame_rate = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration_seconds,
        width,
        height,
        frame_rate,
    })
}

fn parse_chapters(json: &str) -> Result<Vec<Chapter>> {
    let probe: FfprobeOutput = serde_json::from_str(json).context("無法解析 ffprobe 輸出")?;

    let mut chapters: Vec<Chapter> = probe
        .chapters
        .unwrap_or_default()
        .iter()
        .filter_map(|c| {
            let start = c.start_time.as_deref()?.parse::<f64>().ok()?;
            let end = c.end_time.as_deref()?.parse::<f64>().ok()?;
            Some(Chapter { start, end })
        })
        .collect();

    chapters.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(chapters)
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse::<f64>().ok().filter(|r| *r > 0.0)
}
