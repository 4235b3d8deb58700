use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// 最近使用路徑的保留數量
pub const MAX_RECENT_PATHS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "VIDEO_FILE")]
    pub video_file: Vec<String>,
}

impl FileTypeTable {
    #[must_use]
    pub fn video_extensions_set(&self) -> HashSet<String> {
        self.video_file
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        let video_extensions = self.video_extensions_set();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| video_extensions.contains(&format!(".{}", ext.to_lowercase())))
    }
}

/// 偵測順序
///
/// - `Normal`：先跑靜音 + 黑畫面偵測，剩下的再查外部標記
/// - `Fast`：先查外部標記，剩下的才跑黑畫面偵測
/// - `LowPower`：只查外部標記，完全略過黑畫面偵測
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionOrder {
    #[default]
    Normal,
    Fast,
    LowPower,
}

impl DetectionOrder {
    pub const ALL: [Self; 3] = [Self::Normal, Self::Fast, Self::LowPower];
}

impl fmt::Display for DetectionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "一般（偵測優先，外部標記備援）"),
            Self::Fast => write!(f, "快速（外部標記優先）"),
            Self::LowPower => write!(f, "省電（只用外部標記）"),
        }
    }
}

/// 代理片段模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// 每個靜音區間各產生一段代理片段
    #[default]
    Segments,
    /// 舊式：整部影片縮小成一段代理，搭配靜音邊界奇偶規則
    WholeFile,
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segments => write!(f, "靜音區間片段"),
            Self::WholeFile => write!(f, "整部影片（舊式）"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// 每 N 幀才分析一幀
    pub frame_stride: u32,
    /// 平均亮度低於此值視為黑畫面（0-255）
    pub black_threshold: f64,
    /// 代理片段縮放後的高度
    pub proxy_height: u32,
    /// 最短靜音長度（秒）
    pub silence_min_duration: f64,
    /// 靜音音量門檻（dB）
    pub silence_noise_db: f64,
    /// 片頭忽略秒數
    pub start_buffer: f64,
    /// 保留時間點之間的最小間距（秒）
    pub min_gap: f64,
    pub detection_order: DetectionOrder,
    pub proxy_mode: ProxyMode,
    /// 0 代表依 CPU 核心數
    pub max_workers: usize,
    /// 外部標記檔名稱
    pub marker_source_name: String,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            frame_stride: 5,
            black_threshold: 10.0,
            proxy_height: 144,
            silence_min_duration: 0.3,
            silence_noise_db: -50.0,
            start_buffer: 60.0,
            min_gap: 120.0,
            detection_order: DetectionOrder::Normal,
            proxy_mode: ProxyMode::Segments,
            max_workers: 0,
            marker_source_name: "plex_timestamps.txt".to_string(),
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.frame_stride == 0 {
            bail!("frame_stride 必須至少為 1");
        }
        if self.proxy_height < 2 {
            bail!("proxy_height 太小: {}", self.proxy_height);
        }
        if self.silence_min_duration.is_nan() || self.silence_min_duration <= 0.0 {
            bail!("silence_min_duration 必須大於 0");
        }
        let invalid = |value: f64| !value.is_finite() || value < 0.0;
        if invalid(self.min_gap) || invalid(self.start_buffer) {
            bail!("min_gap 與 start_buffer 必須是非負的有限數值");
        }
        // NaN 門檻會讓每個取樣幀都被當成黑畫面
        if invalid(self.black_threshold) {
            bail!("black_threshold 必須是非負的有限數值: {}", self.black_threshold);
        }
        if !self.silence_noise_db.is_finite() || !self.silence_min_duration.is_finite() {
            bail!("silence_noise_db 與 silence_min_duration 必須是有限數值");
        }
        if self.marker_source_name.trim().is_empty() {
            bail!("marker_source_name 不可為空");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutterSettings {
    /// 切割成功後刪除原始檔
    pub destructive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub detection: DetectionSettings,
    pub cutter: CutterSettings,
    pub recent_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file_type_table: FileTypeTable,
    pub settings: UserSettings,
}
