//! 影片切割元件
//!
//! 讀取切點檔，以 ffmpeg segment 不重新編碼地分割成 `_part1`、`_part2`...

mod cutter;
mod main;

pub use cutter::{Cutter, plan_segments};
pub use main::{CUT_LEDGER, CutReport, VideoCutter};
