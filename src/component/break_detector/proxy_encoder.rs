use super::progress::ProgressAggregator;
use super::silence_detector::SilentInterval;
use crate::tools::{FailureKind, MediaError, MediaToolkit};
use anyhow::Result;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// 縮小後的代理片段，涵蓋原始檔 `[start, end)`
///
/// 擁有暫存檔：離開作用域時一定會刪除，不論分析成功或失敗。
#[derive(Debug)]
pub struct ProxySegment {
    pub source: PathBuf,
    pub start: f64,
    pub end: f64,
    pub path: PathBuf,
}

impl Drop for ProxySegment {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("已刪除代理片段: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("無法刪除代理片段 {}: {}", self.path.display(), e),
        }
    }
}

pub struct ProxyEncoder {
    toolkit: Arc<dyn MediaToolkit>,
    height: u32,
    work_dir: PathBuf,
}

impl ProxyEncoder {
    #[must_use]
    pub fn new(toolkit: Arc<dyn MediaToolkit>, height: u32, work_dir: &Path) -> Self {
        Self {
            toolkit,
            height,
            work_dir: work_dir.to_path_buf(),
        }
    }

    fn proxy_path(&self) -> PathBuf {
        self.work_dir.join(format!("proxy_{}.mp4", Uuid::new_v4()))
    }

    /// 為每段靜音區間產生代理片段
    ///
    /// 編碼失敗的區間直接略過；每個嘗試過的區間都會推進一次縮小進度。
    /// 只有取消會回傳錯誤，此時已產生的片段會隨回傳值一起被刪除。
    pub fn proxy_for(
        &self,
        source: &Path,
        intervals: &[SilentInterval],
        progress: &ProgressAggregator<'_>,
    ) -> Result<Vec<ProxySegment>> {
        let mut segments = Vec::with_capacity(intervals.len());

        for interval in intervals.iter().filter(|i| i.end > i.start) {
            let attempt = self.encode(source, interval.start, interval.end);
            progress.step_downscale();

            match attempt {
                Ok(segment) => segments.push(segment),
                Err(e) if FailureKind::classify(&e) == FailureKind::Cancelled => return Err(e),
                Err(e) => warn!(
                    "代理片段 {:.3}-{:.3} 建立失敗，已略過 {}: {e:#}",
                    interval.start,
                    interval.end,
                    source.display()
                ),
            }
        }

        debug!(
            "{} 建立 {}/{} 個代理片段",
            source.display(),
            segments.len(),
            intervals.len()
        );
        Ok(segments)
    }

    /// 整部影片縮小成單一代理片段（舊版模式）
    pub fn proxy_whole(
        &self,
        source: &Path,
        duration: f64,
        progress: &ProgressAggregator<'_>,
    ) -> Result<ProxySegment> {
        let attempt = self.encode(source, 0.0, duration);
        progress.step_downscale();
        attempt
    }

    fn encode(&self, source: &Path, start: f64, end: f64) -> Result<ProxySegment> {
        if !source.exists() {
            return Err(MediaError::InputNotFound(source.to_path_buf()).into());
        }

        let path = self.proxy_path();
        // 先建立擁有者，編碼中途失敗時殘檔也會被清掉
        let segment = ProxySegment {
            source: source.to_path_buf(),
            start,
            end,
            path,
        };
        self.toolkit
            .encode_proxy(source, start, end, self.height, &segment.path)?;

        let size = fs::metadata(&segment.path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::tool_failure(
                "ffmpeg",
                format!("代理片段未建立或為空: {}", segment.path.display()),
            )
            .into());
        }

        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::break_detector::progress::NullObserver;
    use crate::tools::{Chapter, LumaSample, VideoInfo};
    use tempfile::TempDir;

    /// 在指定的開始時間失敗，其餘寫入假內容
    struct StubToolkit {
        fail_at: Vec<f64>,
        cancel_at: Option<f64>,
    }

    impl MediaToolkit for StubToolkit {
        fn probe_chapters(&self, _path: &Path) -> Result<Vec<Chapter>> {
            Ok(Vec::new())
        }

        fn probe_video(&self, _path: &Path) -> Result<VideoInfo> {
            anyhow::bail!("unused")
        }

        fn silence_report(&self, _path: &Path, _db: f64, _d: f64) -> Result<String> {
            Ok(String::new())
        }

        fn encode_proxy(
            &self,
            _source: &Path,
            start: f64,
            _end: f64,
            _height: u32,
            destination: &Path,
        ) -> Result<()> {
            if self.cancel_at == Some(start) {
                return Err(MediaError::Cancelled.into());
            }
            if self.fail_at.contains(&start) {
                fs::write(destination, b"")?;
                return Ok(());
            }
            fs::write(destination, b"proxy")?;
            Ok(())
        }

        fn decode_luma(
            &self,
            _clip: &Path,
            _stride: u32,
            _visit: &mut dyn FnMut(LumaSample),
        ) -> Result<u64> {
            Ok(0)
        }

        fn split_segments(&self, _s: &Path, _c: &[f64], _o: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn intervals(starts: &[f64]) -> Vec<SilentInterval> {
        starts
            .iter()
            .map(|s| SilentInterval::new(*s, s + 2.0).unwrap())
            .collect()
    }

    fn setup(toolkit: StubToolkit) -> (TempDir, PathBuf, ProxyEncoder) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("show.mkv");
        fs::write(&source, b"video").unwrap();
        let work_dir = temp_dir.path().join("work");
        fs::create_dir_all(&work_dir).unwrap();
        let encoder = ProxyEncoder::new(Arc::new(toolkit), 144, &work_dir);
        (temp_dir, source, encoder)
    }

    fn work_files(temp_dir: &TempDir) -> usize {
        fs::read_dir(temp_dir.path().join("work")).unwrap().count()
    }

    #[test]
    fn test_failed_intervals_are_skipped_but_counted() {
        let (temp_dir, source, encoder) = setup(StubToolkit {
            fail_at: vec![20.0],
            cancel_at: None,
        });
        let observer = NullObserver;
        let progress = ProgressAggregator::new(&observer);
        progress.add_totals(3, 0, 0);

        let segments = encoder
            .proxy_for(&source, &intervals(&[10.0, 20.0, 30.0]), &progress)
            .unwrap();

        assert_eq!(segments.len(), 2);
        assert!((segments[1].start - 30.0).abs() < f64::EPSILON);
        // 三次嘗試全部計入（done 停在 total - 1）
        assert_eq!(progress.snapshot().done, 2);
        assert_eq!(work_files(&temp_dir), 2);
    }

    #[test]
    fn test_segments_are_deleted_on_drop() {
        let (temp_dir, source, encoder) = setup(StubToolkit {
            fail_at: Vec::new(),
            cancel_at: None,
        });
        let observer = NullObserver;
        let progress = ProgressAggregator::new(&observer);

        let segments = encoder
            .proxy_for(&source, &intervals(&[10.0, 20.0]), &progress)
            .unwrap();
        assert_eq!(work_files(&temp_dir), 2);

        drop(segments);
        assert_eq!(work_files(&temp_dir), 0);
    }

    #[test]
    fn test_cancel_discards_produced_segments() {
        let (temp_dir, source, encoder) = setup(StubToolkit {
            fail_at: Vec::new(),
            cancel_at: Some(20.0),
        });
        let observer = NullObserver;
        let progress = ProgressAggregator::new(&observer);

        let result = encoder.proxy_for(&source, &intervals(&[10.0, 20.0, 30.0]), &progress);
        assert!(result.is_err());
        assert_eq!(work_files(&temp_dir), 0);
    }

    #[test]
    fn test_missing_source() {
        let (temp_dir, _source, encoder) = setup(StubToolkit {
            fail_at: Vec::new(),
            cancel_at: None,
        });
        let observer = NullObserver;
        let progress = ProgressAggregator::new(&observer);

        let missing = temp_dir.path().join("gone.mkv");
        let err = encoder.proxy_whole(&missing, 100.0, &progress).unwrap_err();
        assert_eq!(FailureKind::classify(&err), FailureKind::InputNotFound);
    }
}
