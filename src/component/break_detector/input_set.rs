use crate::config::FileTypeTable;
use crate::tools::scan_video_files;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct InputEntry {
    /// 加入順序；重複加入時更新為最新
    order: u64,
    /// 透過資料夾加入時記錄該資料夾，用來鏡像輸出結構
    source_root: Option<PathBuf>,
}

/// 輸入集合：個別檔案與資料夾混合，整理成去重、順序穩定的路徑列表
#[derive(Debug, Clone)]
pub struct InputSet {
    entries: HashMap<PathBuf, InputEntry>,
    next_order: u64,
    file_type_table: FileTypeTable,
}

impl InputSet {
    #[must_use]
    pub fn new(file_type_table: FileTypeTable) -> Self {
        Self {
            entries: HashMap::new(),
            next_order: 0,
            file_type_table,
        }
    }

    /// 加入個別檔案；不存在或不是檔案的路徑會被略過。回傳實際加入的數量
    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            match fs::canonicalize(path) {
                Ok(absolute) if absolute.is_file() => {
                    self.push(absolute, None);
                    added += 1;
                }
                _ => warn!("略過無效的檔案路徑: {}", path.display()),
            }
        }
        added
    }

    /// 遞迴加入資料夾內所有影片檔。回傳實際加入的數量
    pub fn add_folders<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut added = 0;
        for folder in paths {
            let folder = folder.as_ref();
            let root = match fs::canonicalize(folder) {
                Ok(root) if root.is_dir() => root,
                _ => {
                    warn!("略過無效的資料夾路徑: {}", folder.display());
                    continue;
                }
            };

            let videos = scan_video_files(&root, &self.file_type_table);
            debug!("資料夾 {} 找到 {} 個影片", root.display(), videos.len());

            for video in videos {
                self.push(video, Some(root.clone()));
                added += 1;
            }
        }
        added
    }

    /// 重複的路徑以最後一次加入的位置與來源為準
    fn push(&mut self, path: PathBuf, source_root: Option<PathBuf>) {
        let order = self.next_order;
        self.next_order += 1;
        self.entries.insert(path, InputEntry { order, source_root });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn has_input(&self) -> bool {
        !self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn consolidated_paths(&self) -> Vec<PathBuf> {
        let mut ordered: Vec<(u64, &PathBuf)> =
            self.entries.iter().map(|(path, e)| (e.order, path)).collect();
        ordered.sort_unstable_by_key(|(order, _)| *order);
        ordered.into_iter().map(|(_, path)| path.clone()).collect()
    }

    /// 檔案的輸出資料夾
    ///
    /// 從資料夾加入的檔案：`base/<資料夾名稱>/<相對子路徑>`；個別加入的檔案：`base`
    #[must_use]
    pub fn output_path_for(&self, file: &Path, base_output_dir: &Path) -> PathBuf {
        let entry = self.entries.get_key_value(file).or_else(|| {
            let absolute = fs::canonicalize(file).ok()?;
            self.entries.get_key_value(&absolute)
        });

        let Some((
            path,
            InputEntry {
                source_root: Some(root),
                ..
            },
        )) = entry
        else {
            return base_output_dir.to_path_buf();
        };

        let mut output = base_output_dir.to_path_buf();
        if let Some(root_name) = root.file_name() {
            output.push(root_name);
        }
        if let Some(relative_parent) = path.parent().and_then(|p| p.strip_prefix(root).ok()) {
            output.push(relative_parent);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table() -> FileTypeTable {
        FileTypeTable {
            video_file: vec![".mkv".to_string(), ".mp4".to_string()],
        }
    }

    fn touch(path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
        fs::canonicalize(path).unwrap()
    }

    #[test]
    fn test_invalid_paths_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let mut inputs = InputSet::new(table());

        assert_eq!(inputs.add_files([temp_dir.path().join("missing.mkv")]), 0);
        assert_eq!(inputs.add_folders([temp_dir.path().join("missing")]), 0);
        assert!(!inputs.has_input());
    }

    #[test]
    fn test_duplicates_collapse_and_later_addition_wins_position() {
        let temp_dir = TempDir::new().unwrap();
        let a = touch(&temp_dir.path().join("show/a.mkv"));
        let b = touch(&temp_dir.path().join("show/b.mkv"));

        let mut inputs = InputSet::new(table());
        inputs.add_folders([temp_dir.path().join("show")]);
        assert_eq!(inputs.consolidated_paths(), vec![a.clone(), b.clone()]);

        inputs.add_files([&a]);
        assert_eq!(inputs.consolidated_paths(), vec![b, a]);
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn test_large_folder_keeps_scan_order() {
        let temp_dir = TempDir::new().unwrap();
        let expected: Vec<PathBuf> = (0..500)
            .map(|i| touch(&temp_dir.path().join(format!("show/e{i:04}.mkv"))))
            .collect();

        let mut inputs = InputSet::new(table());
        assert_eq!(inputs.add_folders([temp_dir.path().join("show")]), 500);
        inputs.add_folders([temp_dir.path().join("show")]);

        assert_eq!(inputs.len(), 500);
        assert_eq!(inputs.consolidated_paths(), expected);
    }

    #[test]
    fn test_folder_scan_filters_extensions() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("show/a.mkv"));
        touch(&temp_dir.path().join("show/a.txt"));
        touch(&temp_dir.path().join("show/plex_timestamps.txt"));

        let mut inputs = InputSet::new(table());
        assert_eq!(inputs.add_folders([temp_dir.path().join("show")]), 1);
    }

    #[test]
    fn test_output_path_mirrors_folder_layout() {
        let temp_dir = TempDir::new().unwrap();
        let episode = touch(&temp_dir.path().join("Show/Season 1/e01.mkv"));
        let single = touch(&temp_dir.path().join("loose.mp4"));

        let mut inputs = InputSet::new(table());
        inputs.add_folders([temp_dir.path().join("Show")]);
        inputs.add_files([&single]);

        let base = Path::new("/out");
        assert_eq!(
            inputs.output_path_for(&episode, base),
            PathBuf::from("/out/Show/Season 1")
        );
        assert_eq!(inputs.output_path_for(&single, base), PathBuf::from("/out"));
    }

    #[test]
    fn test_file_added_individually_after_folder_maps_flat() {
        let temp_dir = TempDir::new().unwrap();
        let episode = touch(&temp_dir.path().join("Show/e01.mkv"));

        let mut inputs = InputSet::new(table());
        inputs.add_folders([temp_dir.path().join("Show")]);
        inputs.add_files([&episode]);

        assert_eq!(
            inputs.output_path_for(&episode, Path::new("/out")),
            PathBuf::from("/out")
        );
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let a = touch(&temp_dir.path().join("a.mkv"));
        let mut inputs = InputSet::new(table());
        inputs.add_files([a]);
        assert!(inputs.has_input());
        inputs.clear();
        assert!(!inputs.has_input());
        assert!(inputs.consolidated_paths().is_empty());
    }
}
