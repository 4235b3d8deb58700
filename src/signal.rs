use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 安裝 Ctrl-C 處理器，回傳整個程式共用的中斷旗標
///
/// 旗標只會從 false 變成 true；每次執行開始前由呼叫端以 [`reset_shutdown_signal`] 歸零。
#[must_use]
pub fn setup_shutdown_signal() -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    ctrlc::set_handler(move || {
        signal_clone.store(true, Ordering::SeqCst);
        eprintln!("\n收到中斷信號，正在停止目前的工作並清理暫存檔...");
    })
    .expect("無法設定 Ctrl-C 處理器");

    shutdown_signal
}

/// 上一次執行被中斷後，回到選單前清除旗標
pub fn reset_shutdown_signal(shutdown_signal: &AtomicBool) {
    shutdown_signal.store(false, Ordering::SeqCst);
}
