use super::cutter::Cutter;
use crate::component::break_detector::{
    InputSet, Phase, ProgressObserver, ProgressUpdate, marker_path, read_markers,
};
use crate::config::Config;
use crate::tools::{
    FailureKind, MediaToolkit, build_worker_pool, ensure_directory_exists,
    ensure_writable_directory, write_failure_ledger,
};
use anyhow::Result;
use log::{debug, error, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 切割失敗清單
pub const CUT_LEDGER: &str = "failedtocut.txt";

#[derive(Debug, Default)]
pub struct CutReport {
    pub total_videos: usize,
    pub cut: usize,
    pub parts: usize,
    /// 沒有切點檔
    pub skipped: usize,
    pub failures: Vec<PathBuf>,
    pub failure_ledger: Option<PathBuf>,
    pub cancelled: bool,
}

enum CutOutcome {
    Parts(usize),
    Skipped,
    Failed,
    Cancelled,
}

/// 依切點檔批次分割影片
pub struct VideoCutter {
    config: Config,
    toolkit: Arc<dyn MediaToolkit>,
    observer: Arc<dyn ProgressObserver>,
    shutdown_signal: Arc<AtomicBool>,
}

impl VideoCutter {
    pub fn new(
        config: Config,
        toolkit: Arc<dyn MediaToolkit>,
        observer: Arc<dyn ProgressObserver>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            toolkit,
            observer,
            shutdown_signal,
        }
    }

    /// 分割所有有切點檔的輸入；單一檔案失敗只記錄到 `failedtocut.txt`
    pub fn cut_all(&self, inputs: &InputSet, output_base: &Path) -> Result<CutReport> {
        ensure_directory_exists(output_base)?;
        ensure_writable_directory(output_base)?;

        let paths = inputs.consolidated_paths();
        let total = paths.len() as u64;
        let done = Mutex::new(0u64);
        let cutter = Cutter::new(Arc::clone(&self.toolkit));
        let destructive = self.config.settings.cutter.destructive;

        self.observer.on_progress(&ProgressUpdate {
            phase: Phase::Cut,
            done: 0,
            total,
            percent: 0.0,
        });

        let pool = build_worker_pool(self.config.settings.detection.max_workers)?;
        let outcomes: Vec<(PathBuf, CutOutcome)> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let outcome = self.cut_one(&cutter, inputs, path, output_base, destructive);
                    self.step(&done, total);
                    (path.clone(), outcome)
                })
                .collect()
        });

        let mut report = CutReport {
            total_videos: paths.len(),
            ..CutReport::default()
        };
        for (path, outcome) in outcomes {
            match outcome {
                CutOutcome::Parts(count) => {
                    report.cut += 1;
                    report.parts += count;
                }
                CutOutcome::Skipped => report.skipped += 1,
                CutOutcome::Failed => report.failures.push(path),
                CutOutcome::Cancelled => {}
            }
        }

        report.failure_ledger = write_failure_ledger(output_base, CUT_LEDGER, &report.failures)?;
        report.cancelled = self.shutdown_signal.load(Ordering::SeqCst);

        self.observer.on_progress(&ProgressUpdate {
            phase: Phase::Complete,
            done: total,
            total,
            percent: 100.0,
        });

        info!(
            "切割完成: {} 個影片，成功 {}（{} 段），略過 {}，失敗 {}",
            report.total_videos,
            report.cut,
            report.parts,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    fn cut_one(
        &self,
        cutter: &Cutter,
        inputs: &InputSet,
        path: &Path,
        output_base: &Path,
        destructive: bool,
    ) -> CutOutcome {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return CutOutcome::Cancelled;
        }

        let output_dir = inputs.output_path_for(path, output_base);
        let markers = marker_path(&output_dir, path);
        if !markers.exists() {
            debug!("沒有切點檔，略過: {}", path.display());
            return CutOutcome::Skipped;
        }

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string());
        self.observer.on_status(&format!("{}: {name}", Phase::Cut));

        let result = read_markers(&markers)
            .and_then(|timestamps| cutter.cut(path, &timestamps, &output_dir, destructive));

        match result {
            Ok(parts) => {
                info!("{name}: 分割成 {} 段", parts.len());
                CutOutcome::Parts(parts.len())
            }
            Err(e) if FailureKind::classify(&e) == FailureKind::Cancelled => CutOutcome::Cancelled,
            Err(e) => {
                error!("切割失敗 {}: {e:#}", path.display());
                self.observer.on_status(&format!("切割失敗 {name}: {e}"));
                CutOutcome::Failed
            }
        }
    }

    fn step(&self, done: &Mutex<u64>, total: u64) {
        let mut done = done.lock().unwrap_or_else(PoisonError::into_inner);
        *done += 1;
        // 與偵測相同：結束前不顯示 100%
        let shown = (*done).min(total.saturating_sub(1));
        self.observer.on_progress(&ProgressUpdate {
            phase: Phase::Cut,
            done: shown,
            total,
            percent: shown as f64 / total.max(1) as f64 * 100.0,
        });
    }
}
