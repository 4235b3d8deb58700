use super::marker_file::write_markers;
use super::media_file::{FileStatus, MediaFile, UnresolvedFiles};
use anyhow::Result;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 解析外部標記檔：每行 `<檔名> = <秒數>`
///
/// 格式錯誤的行直接略過；同一檔名出現多次時以最後一行為準。
#[must_use]
pub fn parse_marker_source(content: &str) -> HashMap<String, f64> {
    let mut markers = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name, seconds)) = line.rsplit_once('=') else {
            debug!("略過格式錯誤的標記行: {line}");
            continue;
        };

        match seconds.trim().parse::<f64>() {
            Ok(t) if t.is_finite() && t >= 0.0 => {
                markers.insert(name.trim().to_string(), t);
            }
            _ => debug!("略過無效的標記時間: {line}"),
        }
    }

    markers
}

/// 以先前匯出的外部標記（例如 `plex_timestamps.txt`）解決剩下的檔案
pub struct ExternalMarkerFallback {
    marker_source_name: String,
}

impl ExternalMarkerFallback {
    #[must_use]
    pub fn new(marker_source_name: &str) -> Self {
        Self {
            marker_source_name: marker_source_name.to_string(),
        }
    }

    fn load_source(&self, dir: &Path) -> Option<HashMap<String, f64>> {
        let source = dir.join(&self.marker_source_name);
        match fs::read_to_string(&source) {
            Ok(content) => {
                let markers = parse_marker_source(&content);
                debug!("讀取外部標記 {}: {} 筆", source.display(), markers.len());
                Some(markers)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("無法讀取外部標記 {}: {}", source.display(), e);
                None
            }
        }
    }

    /// 只比對檔名，且只使用與影片同一資料夾的標記檔。回傳解決的檔案數
    pub fn apply(&self, files: &mut [MediaFile], unresolved: &UnresolvedFiles) -> Result<usize> {
        let mut sources: HashMap<PathBuf, Option<HashMap<String, f64>>> = HashMap::new();
        let mut resolved = 0;

        for file in files.iter_mut() {
            if file.status != FileStatus::Unresolved || !unresolved.contains(&file.path) {
                continue;
            }

            let Some(dir) = file.path.parent() else {
                continue;
            };
            let markers = sources
                .entry(dir.to_path_buf())
                .or_insert_with(|| self.load_source(dir));

            let file_name = file.display_name();
            let Some(timestamp) = markers.as_ref().and_then(|m| m.get(&file_name)).copied()
            else {
                continue;
            };

            write_markers(&file.marker_path(), &[timestamp])?;
            unresolved.remove(&file.path);
            file.status = FileStatus::ResolvedByFallback;
            debug!("{file_name} 使用外部標記 {timestamp}");
            resolved += 1;
        }

        if resolved > 0 {
            info!("{resolved} 個檔案使用外部標記");
        }
        Ok(resolved)
    }
}
