mod failure_ledger;
mod ffmpeg_command;
mod ffprobe_info;
mod media_error;
mod media_toolkit;
mod path_validator;
mod process_runner;
mod video_scanner;
mod worker_pool;

pub use failure_ledger::write_failure_ledger;
pub use ffmpeg_command::FfmpegCommand;
pub use ffprobe_info::{Chapter, VideoInfo, get_chapters, get_video_info};
pub use media_error::{FailureKind, MediaError};
pub use media_toolkit::{FfmpegToolkit, LumaSample, MediaToolkit, mean_luma};
pub use path_validator::{ensure_directory_exists, ensure_writable_directory};
pub use process_runner::{ProcessOutput, run_cancellable, run_cancellable_capture};
pub use video_scanner::scan_video_files;
pub use worker_pool::{build_worker_pool, cpu_count, worker_limit};
