use super::marker_file::marker_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Unresolved,
    ResolvedByChapters,
    ResolvedByDetection,
    ResolvedByFallback,
    Failed,
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub output_dir: PathBuf,
    pub status: FileStatus,
}

impl MediaFile {
    #[must_use]
    pub fn new(path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            path,
            output_dir,
            status: FileStatus::Unresolved,
        }
    }

    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        marker_path(&self.output_dir, &self.path)
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().to_string())
    }
}

/// 尚未找到切點的檔案集合
///
/// 由單次執行擁有，在章節 / 偵測 / 外部標記各階段之間傳遞；可同時從多個執行緒移除。
#[derive(Debug, Default)]
pub struct UnresolvedFiles {
    inner: Mutex<UnresolvedInner>,
}

/// 路徑對應加入順序，`snapshot` 依此排序
#[derive(Debug, Default)]
struct UnresolvedInner {
    paths: HashMap<PathBuf, u64>,
    next_order: u64,
}

impl UnresolvedFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, UnresolvedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, path: &Path) {
        let mut inner = self.lock();
        if inner.paths.contains_key(path) {
            return;
        }
        let order = inner.next_order;
        inner.next_order += 1;
        inner.paths.insert(path.to_path_buf(), order);
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.lock().paths.remove(path).is_some()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().paths.contains_key(path)
    }

    /// 依加入順序列出
    #[must_use]
    pub fn snapshot(&self) -> Vec<PathBuf> {
        let inner = self.lock();
        let mut ordered: Vec<(u64, &PathBuf)> =
            inner.paths.iter().map(|(path, order)| (*order, path)).collect();
        ordered.sort_unstable_by_key(|(order, _)| *order);
        ordered.into_iter().map(|(_, path)| path.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().paths.is_empty()
    }
}
