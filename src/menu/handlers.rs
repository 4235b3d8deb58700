use super::progress_view::TerminalProgress;
use crate::component::break_detector::{DetectionReport, InputSet};
use crate::component::video_cutter::CutReport;
use crate::component::{BreakDetector, VideoCutter};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::pause;
use crate::signal::reset_shutdown_signal;
use crate::tools::{FfmpegToolkit, MediaToolkit};
use anyhow::{Result, bail};
use console::{Term, style};
use dialoguer::Input;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_break_detection(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    println!("{}", style("=== 廣告切點偵測 ===").cyan().bold());
    println!(
        "{}",
        style(format!(
            "偵測順序: {}，代理模式: {}",
            config.settings.detection.detection_order, config.settings.detection.proxy_mode
        ))
        .dim()
    );

    if let Err(e) = detect(shutdown_signal, config) {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

fn detect(shutdown_signal: &Arc<AtomicBool>, config: &mut Config) -> Result<()> {
    let inputs = prompt_inputs(config)?;
    let output_dir = prompt_output_dir(config)?;

    reset_shutdown_signal(shutdown_signal);
    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(Arc::clone(shutdown_signal)));
    let progress = Arc::new(TerminalProgress::new());

    let detector = BreakDetector::new(
        config.settings.detection.clone(),
        toolkit,
        progress.clone(),
        Arc::clone(shutdown_signal),
    );
    let report = detector.detect(&inputs, &output_dir)?;
    progress.finish("偵測結束");

    print_detection_summary(&report);
    Ok(())
}

pub fn run_video_cutter(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    println!("{}", style("=== 依切點分割影片 ===").cyan().bold());
    if config.settings.cutter.destructive {
        println!("{}", style("注意：分割成功後會刪除原始檔").yellow().bold());
    }

    if let Err(e) = cut(shutdown_signal, config) {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

fn cut(shutdown_signal: &Arc<AtomicBool>, config: &mut Config) -> Result<()> {
    let inputs = prompt_inputs(config)?;
    let output_dir = prompt_output_dir(config)?;

    reset_shutdown_signal(shutdown_signal);
    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(Arc::clone(shutdown_signal)));
    let progress = Arc::new(TerminalProgress::new());

    let cutter = VideoCutter::new(
        config.clone(),
        toolkit,
        progress.clone(),
        Arc::clone(shutdown_signal),
    );
    let report = cutter.cut_all(&inputs, &output_dir)?;
    progress.finish("分割結束");

    print_cut_summary(&report);
    Ok(())
}

/// 逐一輸入檔案或資料夾路徑，空白結束
fn prompt_inputs(config: &Config) -> Result<InputSet> {
    let mut inputs = InputSet::new(config.file_type_table.clone());

    println!("{}", style("請輸入影片檔案或資料夾路徑，每次一個，直接按 Enter 結束").dim());
    loop {
        let path: String = Input::new()
            .with_prompt(format!("輸入路徑 ({} 個影片)", inputs.len()))
            .allow_empty(true)
            .interact_text()?;
        let path = path.trim();
        if path.is_empty() {
            break;
        }

        let path = Path::new(path);
        let added = if path.is_dir() {
            inputs.add_folders([path])
        } else {
            inputs.add_files([path])
        };

        if added == 0 {
            println!("  {} 沒有加入任何影片: {}", style("⤳").dim(), path.display());
        } else {
            println!("  {} 加入 {} 個影片", style("✓").green(), added);
        }
    }

    if !inputs.has_input() {
        bail!("沒有任何輸入影片");
    }
    Ok(inputs)
}

fn prompt_output_dir(config: &mut Config) -> Result<PathBuf> {
    let mut prompt = Input::<String>::new().with_prompt("請輸入輸出資料夾路徑");
    if let Some(recent) = config.settings.recent_paths.first() {
        prompt = prompt.default(recent.clone());
    }
    let path: String = prompt.interact_text()?;
    let path = path.trim().to_string();
    if path.is_empty() {
        bail!("輸出資料夾不可為空");
    }

    add_recent_path(&mut config.settings, &path);
    if let Err(e) = save_settings(&config.settings) {
        warn!("無法儲存最近使用的路徑: {e}");
    }

    Ok(PathBuf::from(path))
}

fn print_detection_summary(report: &DetectionReport) {
    println!();
    println!("{}", style("=== 偵測摘要 ===").cyan().bold());
    println!("  總計: {} 個影片", report.total_videos);
    println!("  已有切點檔（略過）: {} 個", style(report.skipped).dim());
    println!("  章節: {} 個", style(report.by_chapters).green());
    println!("  黑畫面偵測: {} 個", style(report.by_detection).green());
    println!("  外部標記: {} 個", style(report.by_fallback).green());
    println!("  沒有切點: {} 個", report.no_markers);
    println!(
        "  黑畫面候選: {} 個（分析 {} 幀）",
        report.black_frames, report.frames_processed
    );

    if !report.failures.is_empty() {
        println!("  失敗: {} 個", style(report.failures.len()).red());
        for failure in &report.failures {
            println!(
                "    {} {} ({:?})",
                style("✗").red(),
                failure.path.display(),
                failure.kind
            );
        }
    }
    if let Some(ledger) = &report.failure_ledger {
        println!("{}", style(format!("失敗清單: {}", ledger.display())).yellow());
    }
    if report.cancelled {
        println!("{}", style("偵測已中斷，未完成的檔案沒有產生切點檔").yellow());
    }
}

fn print_cut_summary(report: &CutReport) {
    println!();
    println!("{}", style("=== 分割摘要 ===").cyan().bold());
    println!("  總計: {} 個影片", report.total_videos);
    println!(
        "  成功: {} 個（共 {} 段）",
        style(report.cut).green(),
        report.parts
    );
    println!("  沒有切點檔（略過）: {} 個", style(report.skipped).dim());

    if !report.failures.is_empty() {
        println!("  失敗: {} 個", style(report.failures.len()).red());
        for path in &report.failures {
            println!("    {} {}", style("✗").red(), path.display());
        }
    }
    if let Some(ledger) = &report.failure_ledger {
        println!("{}", style(format!("失敗清單: {}", ledger.display())).yellow());
    }
    if report.cancelled {
        println!("{}", style("分割已中斷").yellow());
    }
}
