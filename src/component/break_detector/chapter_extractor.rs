use super::marker_file::write_markers;
use super::media_file::{FileStatus, MediaFile, UnresolvedFiles};
use crate::tools::MediaToolkit;
use anyhow::Result;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 從容器的章節資訊取得切點
pub struct ChapterExtractor {
    toolkit: Arc<dyn MediaToolkit>,
}

impl ChapterExtractor {
    #[must_use]
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// 有章節的檔案直接寫入章節開始時間並移出 `unresolved`；沒有章節的加入 `unresolved`
    ///
    /// 探測失敗視為沒有章節。回傳以章節解決的檔案數。
    pub fn extract(
        &self,
        files: &mut [MediaFile],
        unresolved: &UnresolvedFiles,
        shutdown_signal: &AtomicBool,
    ) -> Result<usize> {
        let results: Vec<Result<bool>> = files
            .par_iter_mut()
            .map(|file| {
                if shutdown_signal.load(Ordering::SeqCst) {
                    return Ok(false);
                }
                self.extract_one(file, unresolved)
            })
            .collect();

        let mut resolved = 0;
        for result in results {
            if result? {
                resolved += 1;
            }
        }

        if resolved > 0 {
            info!("{resolved} 個檔案使用章節資訊");
        }
        Ok(resolved)
    }

    fn extract_one(&self, file: &mut MediaFile, unresolved: &UnresolvedFiles) -> Result<bool> {
        let chapters = match self.toolkit.probe_chapters(&file.path) {
            Ok(chapters) => chapters,
            Err(e) => {
                warn!("無法讀取章節，視為沒有章節 {}: {e:#}", file.path.display());
                Vec::new()
            }
        };

        if chapters.is_empty() {
            unresolved.insert(&file.path);
            return Ok(false);
        }

        let mut starts: Vec<f64> = chapters.iter().map(|c| c.start).collect();
        starts.sort_by(f64::total_cmp);
        starts.dedup();

        // 寫入失敗表示輸出資料夾不可用，屬於整批中止的錯誤
        write_markers(&file.marker_path(), &starts)?;

        unresolved.remove(&file.path);
        file.status = FileStatus::ResolvedByChapters;
        debug!("{} 有 {} 個章節", file.display_name(), starts.len());
        Ok(true)
    }
}
