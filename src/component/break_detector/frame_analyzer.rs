use super::progress::ProgressAggregator;
use super::proxy_encoder::ProxySegment;
use crate::tools::{FailureKind, LumaSample, MediaToolkit};
use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FrameAnalysis {
    /// 原始檔時間軸上的候選切點（未整理）
    pub candidates: Vec<f64>,
    pub frames_processed: u64,
    /// 實際取樣（分析亮度）的幀數
    pub samples: u64,
    /// 無法解碼的片段數
    pub errors: usize,
}

/// 片段內時間換算回原始檔時間，數值漂移時夾在片段範圍內
#[must_use]
pub fn to_source_time(segment: &ProxySegment, time_in_segment: f64) -> f64 {
    (segment.start + time_in_segment).clamp(segment.start, segment.end)
}

/// 以右側二分搜尋插入位置的奇偶判斷是否落在靜音區間內
///
/// `boundaries` 是攤平後的 `[s0, e0, s1, e1, ...]`，奇數位置代表落在某段 `(s, e)` 之間。
#[must_use]
pub fn is_inside_silence(boundaries: &[f64], time: f64) -> bool {
    boundaries.partition_point(|&b| b <= time) % 2 == 1
}

pub struct FrameAnalyzer {
    toolkit: Arc<dyn MediaToolkit>,
    stride: u32,
    black_threshold: f64,
}

impl FrameAnalyzer {
    #[must_use]
    pub fn new(toolkit: Arc<dyn MediaToolkit>, stride: u32, black_threshold: f64) -> Self {
        Self {
            toolkit,
            stride: stride.max(1),
            black_threshold,
        }
    }

    /// 逐段解碼並收集黑畫面時間點
    ///
    /// `silence_boundaries` 只在整部影片代理（舊版模式）時傳入，額外套用靜音奇偶規則。
    /// 每個片段分析完立即釋放（刪除暫存檔）。
    pub fn analyze(
        &self,
        segments: Vec<ProxySegment>,
        silence_boundaries: Option<&[f64]>,
        progress: &ProgressAggregator<'_>,
    ) -> Result<FrameAnalysis> {
        let mut analysis = FrameAnalysis::default();

        for segment in segments {
            let mut visit = |sample: LumaSample| {
                progress.step_frame();
                analysis.samples += 1;

                let actual_time = to_source_time(&segment, sample.time);
                if sample.mean_luma >= self.black_threshold {
                    return;
                }
                if let Some(boundaries) = silence_boundaries
                    && !is_inside_silence(boundaries, actual_time)
                {
                    return;
                }
                analysis.candidates.push(actual_time);
            };

            match self.toolkit.decode_luma(&segment.path, self.stride, &mut visit) {
                Ok(decoded) => {
                    analysis.frames_processed += decoded;
                }
                Err(e) if FailureKind::classify(&e) == FailureKind::Cancelled => return Err(e),
                Err(e) => {
                    warn!(
                        "代理片段 {:.3}-{:.3} 解碼失敗 {}: {e:#}",
                        segment.start,
                        segment.end,
                        segment.source.display()
                    );
                    analysis.errors += 1;
                }
            }
            // segment 在此釋放
        }

        debug!(
            "分析 {} 幀，找到 {} 個黑畫面",
            analysis.frames_processed,
            analysis.candidates.len()
        );
        Ok(analysis)
    }
}
