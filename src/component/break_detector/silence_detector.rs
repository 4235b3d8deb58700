use crate::tools::{FailureKind, MediaToolkit};
use log::{debug, warn};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};

static REGEX_SILENCE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"silence_start:\s*(-?[0-9]+(?:\.[0-9]+)?)").expect("Invalid regex")
});

static REGEX_SILENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"silence_end:\s*(-?[0-9]+(?:\.[0-9]+)?)").expect("Invalid regex")
});

/// 靜音區間 `[start, end)`，保證 `start < end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilentInterval {
    pub start: f64,
    pub end: f64,
}

impl SilentInterval {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

pub struct SilenceDetector {
    toolkit: Arc<dyn MediaToolkit>,
    noise_db: f64,
    min_duration: f64,
}

impl SilenceDetector {
    #[must_use]
    pub fn new(toolkit: Arc<dyn MediaToolkit>, noise_db: f64, min_duration: f64) -> Self {
        Self {
            toolkit,
            noise_db,
            min_duration,
        }
    }

    /// 偵測並合併靜音區間；找不到檔案或工具失敗時回傳空列表
    pub fn detect(&self, path: &Path) -> Vec<SilentInterval> {
        let report = match self
            .toolkit
            .silence_report(path, self.noise_db, self.min_duration)
        {
            Ok(report) => report,
            Err(e) => {
                if FailureKind::classify(&e) != FailureKind::Cancelled {
                    warn!("靜音偵測失敗，視為沒有靜音 {}: {e:#}", path.display());
                }
                return Vec::new();
            }
        };

        let merged = merge_intervals(parse_silence_report(&report));
        debug!("{} 找到 {} 段靜音", path.display(), merged.len());
        merged
    }
}

/// 解析 silencedetect 輸出
///
/// 格式:
/// `[silencedetect @ 0x...] silence_start: 12.5`
/// `[silencedetect @ 0x...] silence_end: 14.25 | silence_duration: 1.75`
#[must_use]
pub fn parse_silence_report(output: &str) -> Vec<SilentInterval> {
    let mut intervals = Vec::new();
    let mut pending_start: Option<f64> = None;

    for line in output.lines() {
        if let Some(start) = capture_seconds(&REGEX_SILENCE_START, line) {
            if let Some(previous) = pending_start {
                debug!("silence_start {previous} 沒有對應的結束，改用 {start}");
            }
            // 音訊開頭前的負值時間
            pending_start = Some(start.max(0.0));
        } else if let Some(end) = capture_seconds(&REGEX_SILENCE_END, line) {
            match pending_start.take() {
                Some(start) => {
                    if let Some(interval) = SilentInterval::new(start, end) {
                        intervals.push(interval);
                    }
                }
                None => debug!("略過沒有開始時間的 silence_end: {end}"),
            }
        }
    }

    if let Some(start) = pending_start {
        warn!("靜音區間從 {start} 開始但沒有結束，已略過");
    }

    intervals
}

fn capture_seconds(regex: &Regex, line: &str) -> Option<f64> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 依開始時間排序後合併重疊或相接的區間
#[must_use]
pub fn merge_intervals(mut intervals: Vec<SilentInterval>) -> Vec<SilentInterval> {
    intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<SilentInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                current.end = current.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// 將合併後的區間攤平成 `[s0, e0, s1, e1, ...]`
#[must_use]
pub fn flatten_boundaries(intervals: &[SilentInterval]) -> Vec<f64> {
    intervals.iter().flat_map(|i| [i.start, i.end]).collect()
}
