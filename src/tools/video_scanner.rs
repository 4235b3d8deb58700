use crate::config::FileTypeTable;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 遞迴列出資料夾內的影片檔，依路徑排序以保持順序穩定
#[must_use]
pub fn scan_video_files(directory: &Path, file_type_table: &FileTypeTable) -> Vec<PathBuf> {
    let video_extensions = file_type_table.video_extensions_set();

    let mut video_files: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| video_extensions.contains(&format!(".{}", ext.to_lowercase())))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();

    video_files.sort();
    video_files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table() -> FileTypeTable {
        FileTypeTable {
            video_file: vec![".mkv".to_string(), ".mp4".to_string()],
        }
    }

    #[test]
    fn test_scan_video_files_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let season = temp_dir.path().join("season1");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("b.mkv"), b"x").unwrap();
        fs::write(season.join("a.MP4"), b"x").unwrap();
        fs::write(season.join("notes.txt"), b"x").unwrap();
        fs::write(temp_dir.path().join("z.mkv"), b"x").unwrap();

        let files = scan_video_files(temp_dir.path(), &table());
        assert_eq!(
            files,
            vec![
                season.join("a.MP4"),
                season.join("b.mkv"),
                temp_dir.path().join("z.mkv"),
            ]
        );
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_video_files(temp_dir.path(), &table()).is_empty());
    }
}
