use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// 失敗清單：每行一個輸入路徑
///
/// 沒有失敗時移除前一次執行留下的清單，清單只反映最近一次執行。
pub fn write_failure_ledger(
    output_dir: &Path,
    file_name: &str,
    failed_paths: &[PathBuf],
) -> Result<Option<PathBuf>> {
    let ledger_path = output_dir.join(file_name);

    if failed_paths.is_empty() {
        match fs::remove_file(&ledger_path) {
            Ok(()) => debug!("移除舊的失敗清單: {}", ledger_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("無法移除舊的失敗清單: {}", ledger_path.display()));
            }
        }
        return Ok(None);
    }

    let mut content = failed_paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');

    fs::write(&ledger_path, content)
        .with_context(|| format!("無法寫入失敗清單: {}", ledger_path.display()))?;

    Ok(Some(ledger_path))
}
