use anyhow::{Context, Result, bail};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// 切點檔：`<輸出資料夾>/<完整原檔名>.txt`
///
/// 保留副檔名，同資料夾的 `ep.mkv` 與 `ep.mp4` 各自擁有 `ep.mkv.txt`、`ep.mp4.txt`。
#[must_use]
pub fn marker_path(output_dir: &Path, media_path: &Path) -> PathBuf {
    let mut name = media_path
        .file_name()
        .map_or_else(|| OsString::from("video"), OsStr::to_os_string);
    name.push(".txt");
    output_dir.join(name)
}

#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{seconds:.1}")
    } else {
        format!("{seconds}")
    }
}

/// 寫入切點（每行一個，遞增）。先寫暫存檔再改名，最終路徑不會出現寫一半的檔案。
///
/// 空的列表會產生空檔案，代表「沒有切點」。
pub fn write_markers(path: &Path, timestamps: &[f64]) -> Result<()> {
    if timestamps.windows(2).any(|w| w[1] <= w[0]) {
        bail!("切點必須嚴格遞增: {timestamps:?}");
    }

    let mut content = String::new();
    for t in timestamps {
        content.push_str(&format_timestamp(*t));
        content.push('\n');
    }

    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, content)
        .with_context(|| format!("無法寫入切點檔: {}", temp_path.display()))?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("無法建立切點檔: {}", path.display()));
    }

    Ok(())
}

pub fn read_markers(path: &Path) -> Result<Vec<f64>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("無法讀取切點檔: {}", path.display()))?;

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f64>()
                .with_context(|| format!("切點檔格式錯誤 {}: {line}", path.display()))
        })
        .collect()
}
