//! 廣告切點偵測元件
//!
//! 流程：
//! 1. 章節資訊（有章節的檔案直接完成）
//! 2. 依偵測順序：靜音偵測 → 代理片段 → 黑畫面分析，或外部標記檔
//! 3. 整理時間點並寫入切點檔

mod chapter_extractor;
mod frame_analyzer;
mod input_set;
mod main;
mod marker_fallback;
mod marker_file;
mod media_file;
mod progress;
mod proxy_encoder;
mod silence_detector;
mod timestamp_reducer;

pub use chapter_extractor::ChapterExtractor;
pub use frame_analyzer::{FrameAnalysis, FrameAnalyzer, is_inside_silence, to_source_time};
pub use input_set::InputSet;
pub use main::{
    BreakDetector, DETECTION_LEDGER, DetectionReport, FileFailure, Stage, stage_plan,
};
pub use marker_fallback::{ExternalMarkerFallback, parse_marker_source};
pub use marker_file::{format_timestamp, marker_path, read_markers, write_markers};
pub use media_file::{FileStatus, MediaFile, UnresolvedFiles};
pub use progress::{
    NullObserver, Phase, ProgressAggregator, ProgressObserver, ProgressUpdate,
};
pub use proxy_encoder::{ProxyEncoder, ProxySegment};
pub use silence_detector::{
    SilenceDetector, SilentInterval, flatten_boundaries, merge_intervals, parse_silence_report,
};
pub use timestamp_reducer::TimestampReducer;
