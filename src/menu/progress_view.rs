use crate::component::break_detector::{Phase, ProgressObserver, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};

/// 以千分比顯示，避免總量在階段邊界變動時進度條跳動
const BAR_LENGTH: u64 = 1000;

/// 終端機進度條：進度顯示在條上，狀態顯示在訊息欄
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_LENGTH);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {prefix} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        let position = (update.percent.clamp(0.0, 100.0) * 10.0).round() as u64;
        self.bar.set_position(position.min(BAR_LENGTH));
        self.bar.set_prefix(format!("{:>5.1}%", update.percent));
        if update.phase == Phase::Complete {
            self.bar.set_message(Phase::Complete.to_string());
        }
    }

    fn on_status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }
}
