use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("無法建立資料夾: {}", path.display()))?;
    }
    Ok(())
}

/// 建立資料夾並確認可以寫入
pub fn ensure_writable_directory(path: &Path) -> Result<()> {
    ensure_directory_exists(path)?;

    let probe = path.join(format!(".write_test_{}", Uuid::new_v4().simple()));
    fs::write(&probe, b"")
        .with_context(|| format!("輸出資料夾無法寫入: {}", path.display()))?;
    let _ = fs::remove_file(&probe);

    Ok(())
}
