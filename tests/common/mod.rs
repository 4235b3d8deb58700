//! 測試用的假媒體工具：依檔名回傳預先設定的章節、靜音與黑畫面

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use break_cutter::component::break_detector::{ProgressObserver, ProgressUpdate};
use break_cutter::config::{Config, FileTypeTable, UserSettings};
use break_cutter::tools::{Chapter, LumaSample, MediaError, MediaToolkit, VideoInfo};

pub const FPS: f64 = 10.0;

#[derive(Debug, Clone, Default)]
pub struct FakeMedia {
    pub duration: f64,
    pub chapters: Vec<f64>,
    pub silences: Vec<(f64, f64)>,
    /// 原始檔時間軸上的黑畫面範圍（含端點）
    pub dark: Vec<(f64, f64)>,
    pub fail_probe: bool,
}

impl FakeMedia {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct FakeToolkit {
    media: HashMap<String, FakeMedia>,
    proxies: Mutex<HashMap<PathBuf, (String, f64, f64)>>,
    pub silence_calls: Mutex<Vec<String>>,
    pub encode_calls: Mutex<Vec<String>>,
    pub split_calls: Mutex<Vec<(String, Vec<f64>)>>,
}

impl FakeToolkit {
    pub fn new(media: Vec<(&str, FakeMedia)>) -> Self {
        Self {
            media: media
                .into_iter()
                .map(|(name, m)| (name.to_string(), m))
                .collect(),
            ..Self::default()
        }
    }

    fn lookup(&self, path: &Path) -> Result<FakeMedia> {
        if !path.exists() {
            return Err(MediaError::InputNotFound(path.to_path_buf()).into());
        }
        let name = file_name(path);
        self.media
            .get(&name)
            .cloned()
            .ok_or_else(|| MediaError::tool_failure("ffprobe", format!("unknown {name}")).into())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl MediaToolkit for FakeToolkit {
    fn probe_chapters(&self, path: &Path) -> Result<Vec<Chapter>> {
        let media = self.lookup(path)?;
        let mut chapters = Vec::new();
        for (i, start) in media.chapters.iter().enumerate() {
            let end = media.chapters.get(i + 1).copied().unwrap_or(media.duration);
            chapters.push(Chapter { start: *start, end });
        }
        Ok(chapters)
    }

    fn probe_video(&self, path: &Path) -> Result<VideoInfo> {
        let media = self.lookup(path)?;
        if media.fail_probe {
            return Err(MediaError::tool_failure("ffprobe", "Invalid data found when processing input").into());
        }
        Ok(VideoInfo {
            duration_seconds: media.duration,
            width: 1920,
            height: 1080,
            frame_rate: FPS,
        })
    }

    fn silence_report(&self, path: &Path, _noise_db: f64, _min_duration: f64) -> Result<String> {
        let media = self.lookup(path)?;
        self.silence_calls.lock().unwrap().push(file_name(path));

        let mut report = String::from("Input #0, matroska,webm, from 'fake':\n");
        for (start, end) in &media.silences {
            report.push_str(&format!("[silencedetect @ 0x1] silence_start: {start}\n"));
            report.push_str(&format!(
                "[silencedetect @ 0x1] silence_end: {end} | silence_duration: {}\n",
                end - start
            ));
        }
        Ok(report)
    }

    fn encode_proxy(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        _height: u32,
        destination: &Path,
    ) -> Result<()> {
        let name = file_name(source);
        self.encode_calls.lock().unwrap().push(name.clone());
        fs::write(destination, b"proxy")?;
        self.proxies
            .lock()
            .unwrap()
            .insert(destination.to_path_buf(), (name, start, end));
        Ok(())
    }

    fn decode_luma(
        &self,
        clip: &Path,
        stride: u32,
        visit: &mut dyn FnMut(LumaSample),
    ) -> Result<u64> {
        let Some((name, start, end)) = self.proxies.lock().unwrap().get(clip).cloned() else {
            return Err(MediaError::DecodeFailure {
                path: clip.to_path_buf(),
                message: "unknown proxy".to_string(),
            }
            .into());
        };
        let media = self.media.get(&name).cloned().unwrap_or_default();

        let frames = ((end - start) * FPS).round() as u64;
        for index in (0..frames).step_by(stride.max(1) as usize) {
            let time = index as f64 / FPS;
            let source_time = start + time;
            let dark = media
                .dark
                .iter()
                .any(|(a, b)| source_time >= *a - 1e-9 && source_time <= *b + 1e-9);
            visit(LumaSample {
                frame_index: index,
                time,
                mean_luma: if dark { 3.0 } else { 96.0 },
            });
        }
        Ok(frames)
    }

    fn split_segments(&self, source: &Path, cut_points: &[f64], output_pattern: &Path) -> Result<()> {
        self.lookup(source)?;
        self.split_calls
            .lock()
            .unwrap()
            .push((file_name(source), cut_points.to_vec()));

        let pattern = output_pattern.to_string_lossy().to_string();
        for index in 0..=cut_points.len() {
            fs::write(pattern.replace("%03d", &format!("{index:03}")), b"part")?;
        }
        Ok(())
    }
}

/// 記錄所有進度與狀態
#[derive(Default)]
pub struct Recorder {
    pub updates: Mutex<Vec<ProgressUpdate>>,
    pub statuses: Mutex<Vec<String>>,
}

impl ProgressObserver for Recorder {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(*update);
    }

    fn on_status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }
}

impl Recorder {
    pub fn last(&self) -> ProgressUpdate {
        *self.updates.lock().unwrap().last().unwrap()
    }

    pub fn is_monotonic(&self) -> bool {
        self.updates
            .lock()
            .unwrap()
            .windows(2)
            .all(|w| w[1].percent >= w[0].percent)
    }
}

pub fn test_config() -> Config {
    let mut settings = UserSettings::default();
    settings.detection.frame_stride = 1;
    settings.detection.max_workers = 2;
    Config {
        file_type_table: FileTypeTable {
            video_file: vec![".mkv".to_string(), ".mp4".to_string()],
        },
        settings,
    }
}

/// 在 `dir` 建立假影片檔
pub fn create_videos(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"not really a video").unwrap();
    }
}
