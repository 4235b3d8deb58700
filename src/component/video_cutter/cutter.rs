use crate::tools::{MediaError, MediaToolkit};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 依切點與影片長度算出每段的 `(start, end)`
///
/// 影片長度是隱含的最後一個邊界：N 個切點產生 N+1 段。不在 `(0, duration)` 內的切點會被忽略。
#[must_use]
pub fn plan_segments(timestamps: &[f64], duration: f64) -> Vec<(f64, f64)> {
    let mut boundaries = vec![0.0];
    boundaries.extend(
        timestamps
            .iter()
            .copied()
            .filter(|t| *t > 0.0 && *t < duration),
    );
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup();
    boundaries.push(duration);

    boundaries.windows(2).map(|w| (w[0], w[1])).collect()
}

/// 分割中的暫存檔名，編號由 0 開始
fn staging_name(stem: &str, index: usize, extension: &str) -> String {
    format!(".{stem}.cutting_{index:03}{extension}")
}

/// 完成後的檔名，編號由 1 開始
fn part_name(stem: &str, number: usize, extension: &str) -> String {
    format!("{stem}_part{number}{extension}")
}

pub struct Cutter {
    toolkit: Arc<dyn MediaToolkit>,
}

impl Cutter {
    #[must_use]
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// 在切點分割影片，輸出 `<stem>_part1.<ext>`、`<stem>_part2.<ext>`...
    ///
    /// `destructive` 時只在分割成功後刪除原始檔。
    pub fn cut(
        &self,
        source: &Path,
        timestamps: &[f64],
        output_dir: &Path,
        destructive: bool,
    ) -> Result<Vec<PathBuf>> {
        if !source.exists() {
            return Err(MediaError::InputNotFound(source.to_path_buf()).into());
        }

        let info = self.toolkit.probe_video(source)?;
        let segments = plan_segments(timestamps, info.duration_seconds);
        let cut_points: Vec<f64> = segments.iter().skip(1).map(|(start, _)| *start).collect();

        let stem = source
            .file_stem()
            .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
        let extension = source
            .extension()
            .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));

        let pattern = output_dir.join(format!(".{stem}.cutting_%03d{extension}"));
        debug!(
            "分割 {}，切點 {:?}，預計 {} 段",
            source.display(),
            cut_points,
            segments.len()
        );

        if let Err(e) = self.toolkit.split_segments(source, &cut_points, &pattern) {
            remove_staged_parts(output_dir, &stem, &extension);
            return Err(e);
        }

        let parts = match rename_staged_parts(output_dir, &stem, &extension) {
            Ok(parts) if parts.is_empty() => {
                bail!("分割後沒有產生任何檔案: {}", source.display());
            }
            Ok(parts) => parts,
            Err(e) => {
                remove_staged_parts(output_dir, &stem, &extension);
                return Err(e);
            }
        };

        if parts.len() != segments.len() {
            warn!(
                "{} 預計 {} 段，實際產生 {} 段（切點可能不在關鍵幀上）",
                source.display(),
                segments.len(),
                parts.len()
            );
        }

        if destructive {
            fs::remove_file(source)
                .with_context(|| format!("無法刪除原始檔: {}", source.display()))?;
            info!("已刪除原始檔: {}", source.display());
        }

        Ok(parts)
    }
}

/// 將 `%03d` 暫存檔依序改名成 1 開始的正式檔名
fn rename_staged_parts(output_dir: &Path, stem: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let mut parts = Vec::new();

    for index in 0.. {
        let staged = output_dir.join(staging_name(stem, index, extension));
        if !staged.exists() {
            break;
        }
        let final_path = output_dir.join(part_name(stem, index + 1, extension));
        fs::rename(&staged, &final_path).with_context(|| {
            format!(
                "無法重新命名 {} -> {}",
                staged.display(),
                final_path.display()
            )
        })?;
        parts.push(final_path);
    }

    Ok(parts)
}

fn remove_staged_parts(output_dir: &Path, stem: &str, extension: &str) {
    let prefix = format!(".{stem}.cutting_");
    let Ok(entries) = fs::read_dir(output_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.ends_with(extension) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("無法刪除分割暫存檔 {}: {}", entry.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Chapter, LumaSample, VideoInfo};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 依切點數量寫出 N+1 個暫存檔；`fail` 時只寫一個檔案後回報失敗
    struct SplitStub {
        duration: f64,
        fail: bool,
        calls: Mutex<Vec<Vec<f64>>>,
    }

    impl SplitStub {
        fn new(duration: f64, fail: bool) -> Self {
            Self {
                duration,
                fail,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MediaToolkit for SplitStub {
        fn probe_chapters(&self, _path: &Path) -> Result<Vec<Chapter>> {
            Ok(Vec::new())
        }

        fn probe_video(&self, _path: &Path) -> Result<VideoInfo> {
            Ok(VideoInfo {
                duration_seconds: self.duration,
                width: 1920,
                height: 1080,
                frame_rate: 29.97,
            })
        }

        fn silence_report(&self, _path: &Path, _db: f64, _d: f64) -> Result<String> {
            Ok(String::new())
        }

        fn encode_proxy(&self, _s: &Path, _a: f64, _b: f64, _h: u32, _d: &Path) -> Result<()> {
            Ok(())
        }

        fn decode_luma(&self, _c: &Path, _s: u32, _v: &mut dyn FnMut(LumaSample)) -> Result<u64> {
            Ok(0)
        }

        fn split_segments(&self, _source: &Path, cut_points: &[f64], pattern: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(cut_points.to_vec());
            let pattern = pattern.to_string_lossy().to_string();
            let count = if self.fail { 1 } else { cut_points.len() + 1 };
            for index in 0..count {
                let path = pattern.replace("%03d", &format!("{index:03}"));
                fs::write(path, format!("part {index}"))?;
            }
            if self.fail {
                return Err(MediaError::tool_failure("ffmpeg", "Invalid data found").into());
            }
            Ok(())
        }
    }

    fn source(temp_dir: &TempDir) -> PathBuf {
        let path = temp_dir.path().join("show.mkv");
        fs::write(&path, b"video").unwrap();
        path
    }

    #[test]
    fn test_plan_segments() {
        assert_eq!(
            plan_segments(&[148.0, 655.0], 1347.0),
            vec![(0.0, 148.0), (148.0, 655.0), (655.0, 1347.0)]
        );
        assert_eq!(plan_segments(&[], 100.0), vec![(0.0, 100.0)]);
        assert_eq!(
            plan_segments(&[0.0, 50.0, 100.0, 150.0], 100.0),
            vec![(0.0, 50.0), (50.0, 100.0)]
        );
    }

    #[test]
    fn test_cut_produces_numbered_parts() {
        let temp_dir = TempDir::new().unwrap();
        let source = source(&temp_dir);
        let output_dir = temp_dir.path().join("out");
        fs::create_dir_all(&output_dir).unwrap();

        let toolkit = Arc::new(SplitStub::new(1347.0, false));
        let parts = Cutter::new(toolkit.clone())
            .cut(&source, &[148.0, 655.0], &output_dir, false)
            .unwrap();

        assert_eq!(
            parts,
            vec![
                output_dir.join("show_part1.mkv"),
                output_dir.join("show_part2.mkv"),
                output_dir.join("show_part3.mkv"),
            ]
        );
        assert_eq!(fs::read_to_string(&parts[0]).unwrap(), "part 0");
        assert_eq!(*toolkit.calls.lock().unwrap(), vec![vec![148.0, 655.0]]);
        assert!(source.exists());
        assert_eq!(fs::read_dir(&output_dir).unwrap().count(), 3);
    }

    #[test]
    fn test_destructive_cut_removes_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = source(&temp_dir);
        let output_dir = temp_dir.path().join("out");
        fs::create_dir_all(&output_dir).unwrap();

        Cutter::new(Arc::new(SplitStub::new(600.0, false)))
            .cut(&source, &[300.0], &output_dir, true)
            .unwrap();
        assert!(!source.exists());
    }

    #[test]
    fn test_failed_cut_keeps_source_and_cleans_staging() {
        let temp_dir = TempDir::new().unwrap();
        let source = source(&temp_dir);
        let output_dir = temp_dir.path().join("out");
        fs::create_dir_all(&output_dir).unwrap();

        let result = Cutter::new(Arc::new(SplitStub::new(600.0, true)))
            .cut(&source, &[300.0], &output_dir, true);

        assert!(result.is_err());
        assert!(source.exists());
        assert_eq!(fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let err = Cutter::new(Arc::new(SplitStub::new(600.0, false)))
            .cut(&temp_dir.path().join("gone.mkv"), &[300.0], temp_dir.path(), false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MediaError>(),
            Some(MediaError::InputNotFound(_))
        ));
    }
}
