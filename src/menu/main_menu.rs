use crate::config::save::save_settings;
use crate::config::{Config, DetectionOrder, ProxyMode};
use crate::menu::handlers::{run_break_detection, run_video_cutter};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 廣告切點偵測與分割 ===").cyan().bold());
    println!("{}", style("按 ESC 離開").dim());

    let options = vec!["偵測廣告切點", "依切點分割影片", "設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_break_detection(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            run_video_cutter(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(2) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        // ESC 或離開
        _ => Ok(false),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style("按 ESC 返回").dim());

        let detection = &config.settings.detection;
        let options = vec![
            format!("偵測順序: {}", detection.detection_order),
            format!("代理模式: {}", detection.proxy_mode),
            format!(
                "分割後刪除原始檔: {}",
                if config.settings.cutter.destructive { "是" } else { "否" }
            ),
            "返回".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇要修改的設定")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => select_detection_order(term, config)?,
            Some(1) => select_proxy_mode(term, config)?,
            Some(2) => toggle_destructive(config)?,
            _ => break,
        }
    }

    Ok(())
}

fn select_detection_order(term: &Term, config: &mut Config) -> Result<()> {
    let current = config.settings.detection.detection_order;
    let items: Vec<String> = DetectionOrder::ALL.iter().map(ToString::to_string).collect();
    let default_index = DetectionOrder::ALL
        .iter()
        .position(|&o| o == current)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("偵測順序")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC：不儲存
    let Some(selection) = selection else {
        return Ok(());
    };

    let selected = DetectionOrder::ALL[selection];
    if selected != current {
        config.settings.detection.detection_order = selected;
        save_and_confirm(config, &selected.to_string())?;
    }
    Ok(())
}

fn select_proxy_mode(term: &Term, config: &mut Config) -> Result<()> {
    let modes = [ProxyMode::Segments, ProxyMode::WholeFile];
    let current = config.settings.detection.proxy_mode;
    let items: Vec<String> = modes.iter().map(ToString::to_string).collect();
    let default_index = modes.iter().position(|&m| m == current).unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("代理模式")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    let Some(selection) = selection else {
        return Ok(());
    };

    let selected = modes[selection];
    if selected != current {
        config.settings.detection.proxy_mode = selected;
        save_and_confirm(config, &selected.to_string())?;
    }
    Ok(())
}

fn toggle_destructive(config: &mut Config) -> Result<()> {
    let destructive = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("分割成功後刪除原始檔？")
        .default(config.settings.cutter.destructive)
        .interact()?;

    if destructive != config.settings.cutter.destructive {
        config.settings.cutter.destructive = destructive;
        save_and_confirm(config, if destructive { "刪除原始檔" } else { "保留原始檔" })?;
    }
    Ok(())
}

fn save_and_confirm(config: &Config, label: &str) -> Result<()> {
    save_settings(&config.settings)?;
    println!("\n{} {}", style("設定已儲存:").green(), label);
    thread::sleep(Duration::from_secs(1));
    Ok(())
}
