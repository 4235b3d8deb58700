use super::chapter_extractor::ChapterExtractor;
use super::frame_analyzer::{FrameAnalysis, FrameAnalyzer};
use super::input_set::InputSet;
use super::marker_fallback::ExternalMarkerFallback;
use super::marker_file::write_markers;
use super::media_file::{FileStatus, MediaFile, UnresolvedFiles};
use super::progress::{Phase, ProgressAggregator, ProgressObserver};
use super::proxy_encoder::ProxyEncoder;
use super::silence_detector::{SilenceDetector, SilentInterval, flatten_boundaries};
use super::timestamp_reducer::TimestampReducer;
use crate::config::{DetectionOrder, DetectionSettings, ProxyMode};
use crate::tools::{
    FailureKind, MediaError, MediaToolkit, VideoInfo, build_worker_pool, ensure_directory_exists,
    ensure_writable_directory, write_failure_ledger,
};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 偵測失敗清單
pub const DETECTION_LEDGER: &str = "failedtodetect.txt";

const PROXY_WORK_DIR: &str = ".break_proxies";

/// 章節之後的偵測階段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 靜音 → 代理片段 → 黑畫面
    BlackFrame,
    /// 外部標記檔
    ExternalMarkers,
}

/// 每種偵測順序對應的階段表，每次執行只查一次
#[must_use]
pub const fn stage_plan(order: DetectionOrder) -> &'static [Stage] {
    match order {
        DetectionOrder::Normal => &[Stage::BlackFrame, Stage::ExternalMarkers],
        DetectionOrder::Fast => &[Stage::ExternalMarkers, Stage::BlackFrame],
        DetectionOrder::LowPower => &[Stage::ExternalMarkers],
    }
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// 偵測結果摘要
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub total_videos: usize,
    /// 已有切點檔而略過
    pub skipped: usize,
    pub by_chapters: usize,
    pub by_detection: usize,
    pub by_fallback: usize,
    /// 沒有找到任何切點（產生空的切點檔）
    pub no_markers: usize,
    /// 整理前的黑畫面候選數
    pub black_frames: usize,
    pub frames_processed: u64,
    pub failures: Vec<FileFailure>,
    pub failure_ledger: Option<PathBuf>,
    pub cancelled: bool,
}

impl DetectionReport {
    #[must_use]
    pub fn markers_written(&self) -> usize {
        self.by_chapters + self.by_detection + self.by_fallback + self.no_markers
    }
}

/// 靜音預掃的結果
struct Prescan {
    info: VideoInfo,
    intervals: Vec<SilentInterval>,
    downscale_units: u64,
    frame_units: u64,
}

enum PrescanOutcome {
    Ready(Prescan),
    Failed(FileFailure),
    Cancelled,
}

#[derive(Default)]
struct FileOutcome {
    resolved: bool,
    black_frames: usize,
    frames_processed: u64,
    failure: Option<FileFailure>,
}

/// 廣告切點偵測
///
/// 流程：章節 → 依偵測順序執行 {靜音 + 代理片段 + 黑畫面} 與 {外部標記} → 整理 → 寫入切點檔
pub struct BreakDetector {
    settings: DetectionSettings,
    toolkit: Arc<dyn MediaToolkit>,
    observer: Arc<dyn ProgressObserver>,
    shutdown_signal: Arc<AtomicBool>,
}

impl BreakDetector {
    pub fn new(
        settings: DetectionSettings,
        toolkit: Arc<dyn MediaToolkit>,
        observer: Arc<dyn ProgressObserver>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            toolkit,
            observer,
            shutdown_signal,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    /// 對輸入集合執行偵測
    ///
    /// 設定無效、輸出資料夾無法建立或寫入時回傳錯誤；單一檔案失敗記錄在報告中。
    pub fn detect(&self, inputs: &InputSet, output_base: &Path) -> Result<DetectionReport> {
        self.settings.validate().context("偵測設定無效")?;
        ensure_directory_exists(output_base)?;
        ensure_writable_directory(output_base)?;

        let mut report = DetectionReport::default();
        let mut files = Vec::new();

        for path in inputs.consolidated_paths() {
            report.total_videos += 1;
            let output_dir = inputs.output_path_for(&path, output_base);
            ensure_directory_exists(&output_dir)?;

            let file = MediaFile::new(path, output_dir);
            if file.marker_path().exists() {
                debug!("已有切點檔，略過: {}", file.path.display());
                report.skipped += 1;
                continue;
            }
            files.push(file);
        }

        let work_dir = output_base.join(PROXY_WORK_DIR);
        ensure_directory_exists(&work_dir)?;

        let progress = ProgressAggregator::new(self.observer.as_ref());
        let result = self.run_stages(&mut files, &work_dir, &progress, &mut report);
        progress.force_complete();

        if work_dir.exists()
            && let Err(e) = fs::remove_dir_all(&work_dir)
        {
            warn!("無法清理代理片段資料夾 {}: {}", work_dir.display(), e);
        }

        result?;

        let failed: Vec<PathBuf> = report.failures.iter().map(|f| f.path.clone()).collect();
        report.failure_ledger = write_failure_ledger(output_base, DETECTION_LEDGER, &failed)?;
        report.cancelled = self.is_cancelled();

        info!(
            "偵測完成: {} 個影片，章節 {}，黑畫面 {}，外部標記 {}，無切點 {}，略過 {}，失敗 {}",
            report.total_videos,
            report.by_chapters,
            report.by_detection,
            report.by_fallback,
            report.no_markers,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    fn run_stages(
        &self,
        files: &mut [MediaFile],
        work_dir: &Path,
        progress: &ProgressAggregator<'_>,
        report: &mut DetectionReport,
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let pool = build_worker_pool(self.settings.max_workers)?;
        let unresolved = UnresolvedFiles::new();

        progress.status(&format!("讀取章節資訊（{} 個檔案）", files.len()));
        let extractor = ChapterExtractor::new(Arc::clone(&self.toolkit));
        report.by_chapters =
            pool.install(|| extractor.extract(files, &unresolved, &self.shutdown_signal))?;

        for stage in stage_plan(self.settings.detection_order) {
            if self.is_cancelled() {
                warn!("收到中斷訊號，停止偵測");
                return Ok(());
            }
            if unresolved.is_empty() {
                break;
            }

            match stage {
                Stage::BlackFrame => {
                    self.black_frame_stage(files, &unresolved, work_dir, &pool, progress, report)?;
                }
                Stage::ExternalMarkers => {
                    progress.status("查詢外部標記");
                    let fallback = ExternalMarkerFallback::new(&self.settings.marker_source_name);
                    report.by_fallback += fallback.apply(files, &unresolved)?;
                }
            }
        }

        if self.is_cancelled() {
            return Ok(());
        }

        // 所有階段都沒有找到切點：寫入空檔，代表「沒有切點」
        for file in files.iter_mut() {
            if file.status == FileStatus::Unresolved && unresolved.remove(&file.path) {
                write_markers(&file.marker_path(), &[])?;
                file.status = FileStatus::ResolvedByDetection;
                report.no_markers += 1;
                debug!("{} 沒有找到切點", file.display_name());
            }
        }

        Ok(())
    }

    fn black_frame_stage(
        &self,
        files: &mut [MediaFile],
        unresolved: &UnresolvedFiles,
        work_dir: &Path,
        pool: &ThreadPool,
        progress: &ProgressAggregator<'_>,
        report: &mut DetectionReport,
    ) -> Result<()> {
        let mut pending: Vec<&mut MediaFile> = files
            .iter_mut()
            .filter(|f| f.status == FileStatus::Unresolved && unresolved.contains(&f.path))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        // 階段一：靜音預掃，同時估計後續工作量
        progress.add_totals(0, pending.len() as u64, 0);
        let prescans: Vec<PrescanOutcome> = pool.install(|| {
            pending
                .par_iter()
                .map(|file| {
                    let outcome = self.prescan(file, progress);
                    progress.step_silence();
                    outcome
                })
                .collect()
        });

        let (downscale_total, frame_total) = prescans
            .iter()
            .filter_map(|p| match p {
                PrescanOutcome::Ready(prescan) => {
                    Some((prescan.downscale_units, prescan.frame_units))
                }
                _ => None,
            })
            .fold((0, 0), |(d, f), (du, fu)| (d + du, f + fu));
        progress.add_totals(downscale_total, 0, frame_total);

        if self.is_cancelled() {
            return Ok(());
        }

        // 階段二：代理片段 + 黑畫面分析
        let outcomes: Vec<Result<FileOutcome>> = pool.install(|| {
            pending
                .par_iter_mut()
                .zip(prescans)
                .map(|(file, prescan)| match prescan {
                    PrescanOutcome::Ready(prescan) => {
                        self.analyze_file(file, &prescan, unresolved, work_dir, progress)
                    }
                    PrescanOutcome::Failed(failure) => {
                        unresolved.remove(&file.path);
                        file.status = FileStatus::Failed;
                        Ok(FileOutcome {
                            failure: Some(failure),
                            ..FileOutcome::default()
                        })
                    }
                    PrescanOutcome::Cancelled => Ok(FileOutcome::default()),
                })
                .collect()
        });

        for outcome in outcomes {
            let outcome = outcome?;
            if outcome.resolved {
                report.by_detection += 1;
            }
            report.black_frames += outcome.black_frames;
            report.frames_processed += outcome.frames_processed;
            if let Some(failure) = outcome.failure {
                report.failures.push(failure);
            }
        }
        Ok(())
    }

    fn prescan(&self, file: &MediaFile, progress: &ProgressAggregator<'_>) -> PrescanOutcome {
        if self.is_cancelled() {
            return PrescanOutcome::Cancelled;
        }
        progress.status(&format!("{}: {}", Phase::Silence, file.display_name()));

        let info = match self.toolkit.probe_video(&file.path) {
            Ok(info) => info,
            Err(e) => {
                return match FailureKind::classify(&e) {
                    FailureKind::Cancelled => PrescanOutcome::Cancelled,
                    kind => PrescanOutcome::Failed(self.report_failure(file, kind, &e, progress)),
                };
            }
        };

        let detector = SilenceDetector::new(
            Arc::clone(&self.toolkit),
            self.settings.silence_noise_db,
            self.settings.silence_min_duration,
        );
        let intervals = detector.detect(&file.path);
        if self.is_cancelled() {
            return PrescanOutcome::Cancelled;
        }

        let (downscale_units, frame_units) = self.estimate_units(&info, &intervals);
        PrescanOutcome::Ready(Prescan {
            info,
            intervals,
            downscale_units,
            frame_units,
        })
    }

    /// 預估縮小與幀分析的工作量：平均幀率 × 區間長度 ÷ 取樣間隔
    fn estimate_units(&self, info: &VideoInfo, intervals: &[SilentInterval]) -> (u64, u64) {
        if intervals.is_empty() {
            return (0, 0);
        }
        let stride = f64::from(self.settings.frame_stride.max(1));
        let frames_for = |seconds: f64| (seconds.max(0.0) * info.frame_rate / stride).ceil() as u64;

        match self.settings.proxy_mode {
            ProxyMode::Segments => (
                intervals.len() as u64,
                intervals.iter().map(|i| frames_for(i.duration())).sum(),
            ),
            ProxyMode::WholeFile => (1, frames_for(info.duration_seconds)),
        }
    }

    fn analyze_file(
        &self,
        file: &mut MediaFile,
        prescan: &Prescan,
        unresolved: &UnresolvedFiles,
        work_dir: &Path,
        progress: &ProgressAggregator<'_>,
    ) -> Result<FileOutcome> {
        if prescan.intervals.is_empty() || self.is_cancelled() {
            return Ok(FileOutcome::default());
        }

        progress.status(&format!("{}: {}", Phase::Downscale, file.display_name()));
        let analysis = match self.find_black_frames(file, prescan, work_dir, progress) {
            Ok(analysis) => analysis,
            Err(e) => {
                let kind = FailureKind::classify(&e);
                if kind == FailureKind::Cancelled {
                    return Ok(FileOutcome::default());
                }
                // 失敗的檔案仍以預估量推進，整體進度才能走完
                progress.step_many(Phase::Frame, prescan.frame_units);
                unresolved.remove(&file.path);
                file.status = FileStatus::Failed;
                return Ok(FileOutcome {
                    failure: Some(self.report_failure(file, kind, &e, progress)),
                    ..FileOutcome::default()
                });
            }
        };

        progress.step_many(
            Phase::Frame,
            prescan.frame_units.saturating_sub(analysis.samples),
        );

        let reducer = TimestampReducer::new(self.settings.start_buffer, self.settings.min_gap);
        let markers = reducer.reduce(&analysis.candidates);
        let mut outcome = FileOutcome {
            resolved: false,
            black_frames: analysis.candidates.len(),
            frames_processed: analysis.frames_processed,
            failure: None,
        };

        if markers.is_empty() {
            debug!("{} 沒有黑畫面切點", file.display_name());
            return Ok(outcome);
        }

        write_markers(&file.marker_path(), &markers)
            .with_context(|| format!("無法寫入切點: {}", file.path.display()))?;
        unresolved.remove(&file.path);
        file.status = FileStatus::ResolvedByDetection;
        outcome.resolved = true;
        info!("{}: {} 個切點", file.display_name(), markers.len());
        Ok(outcome)
    }

    fn find_black_frames(
        &self,
        file: &MediaFile,
        prescan: &Prescan,
        work_dir: &Path,
        progress: &ProgressAggregator<'_>,
    ) -> Result<FrameAnalysis> {
        let encoder = ProxyEncoder::new(Arc::clone(&self.toolkit), self.settings.proxy_height, work_dir);
        let analyzer = FrameAnalyzer::new(
            Arc::clone(&self.toolkit),
            self.settings.frame_stride,
            self.settings.black_threshold,
        );

        let (segments, boundaries) = match self.settings.proxy_mode {
            ProxyMode::Segments => (
                encoder.proxy_for(&file.path, &prescan.intervals, progress)?,
                None,
            ),
            ProxyMode::WholeFile => (
                vec![encoder.proxy_whole(&file.path, prescan.info.duration_seconds, progress)?],
                Some(flatten_boundaries(&prescan.intervals)),
            ),
        };

        if segments.is_empty() {
            if !file.path.exists() {
                return Err(MediaError::InputNotFound(file.path.clone()).into());
            }
            return Err(MediaError::tool_failure("ffmpeg", "所有代理片段都建立失敗").into());
        }

        let segment_count = segments.len();
        progress.status(&format!("{}: {}", Phase::Frame, file.display_name()));
        let analysis = analyzer.analyze(segments, boundaries.as_deref(), progress)?;

        if analysis.errors == segment_count {
            return Err(MediaError::DecodeFailure {
                path: file.path.clone(),
                message: format!("{segment_count} 個代理片段都無法解碼"),
            }
            .into());
        }
        Ok(analysis)
    }

    fn report_failure(
        &self,
        file: &MediaFile,
        kind: FailureKind,
        error: &anyhow::Error,
        progress: &ProgressAggregator<'_>,
    ) -> FileFailure {
        error!("偵測失敗 {}: {error:#}", file.path.display());
        progress.status(&format!("略過 {}: {error}", file.display_name()));
        FileFailure {
            path: file.path.clone(),
            kind,
            message: format!("{error:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_plan() {
        assert_eq!(
            stage_plan(DetectionOrder::Normal),
            &[Stage::BlackFrame, Stage::ExternalMarkers]
        );
        assert_eq!(
            stage_plan(DetectionOrder::Fast),
            &[Stage::ExternalMarkers, Stage::BlackFrame]
        );
        assert_eq!(stage_plan(DetectionOrder::LowPower), &[Stage::ExternalMarkers]);
    }

    #[test]
    fn test_markers_written() {
        let report = DetectionReport {
            by_chapters: 1,
            by_detection: 2,
            by_fallback: 3,
            no_markers: 4,
            ..DetectionReport::default()
        };
        assert_eq!(report.markers_written(), 10);
    }
}
