//! droidpilot CLI entry point.

mod args;

use std::time::Duration;

use clap::Parser;
use droidpilot_core::{AdbInteractor, DeviceInteractor, InteractionResult, ScreenNode};
use tracing::{error, info};

use crate::args::{Cli, Commands};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut device = AdbInteractor::new().with_adb_path(&cli.adb_path);
    if let Some(serial) = &cli.serial {
        device = device.with_serial(serial);
    }

    match cli.command {
        Commands::Launch(args) => {
            let timeout = Duration::from_millis(args.timeout);
            report(&device, device.launch_app(&args.package, timeout).await).await
        }
        Commands::Stop(args) => report(&device, device.stop_app(&args.package).await).await,
        Commands::Running(args) => {
            let running = device.is_app_running(&args.package).await;
            println!("{running}");
            if running {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Commands::Dump(args) => {
            let screen = device.dump_screen().await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&screen)?);
            } else {
                print!("{}", screen.pretty_print());
            }
            Ok(())
        }
        Commands::Screenshot(args) => match device.take_screenshot(&args.name).await {
            Some(path) => {
                println!("{}", path.display());
                Ok(())
            }
            None => anyhow::bail!("screenshot capture failed"),
        },
        Commands::DeviceInfo => {
            let (width, height) = device.display_size().await?;
            let density = device.display_density().await?;
            let package = device.current_package().await?;
            println!("display: {width}x{height}");
            println!("density: {density}");
            println!("foreground: {}", package.as_deref().unwrap_or("<none>"));
            Ok(())
        }
        Commands::Click(args) => report(&device, device.click(&args.to_selector()?).await).await,
        Commands::LongClick(args) => {
            report(&device, device.long_click(&args.to_selector()?).await).await
        }
        Commands::Tap(args) => {
            device.click_at(args.x, args.y).await;
            Ok(())
        }
        Commands::Type(args) => {
            let selector = args.selector.to_selector()?;
            report(&device, device.type_text(&selector, &args.text).await).await
        }
        Commands::ClearType(args) => {
            let selector = args.selector.to_selector()?;
            report(&device, device.clear_and_type(&selector, &args.text).await).await
        }
        Commands::Swipe(args) => {
            report(&device, device.swipe(args.direction.into(), args.steps).await).await
        }
        Commands::Scroll(args) => {
            let selector = args.selector.to_selector()?;
            report(
                &device,
                device
                    .scroll_until_found(
                        &selector,
                        args.direction.into(),
                        args.max_scrolls,
                        Duration::from_millis(args.delay),
                    )
                    .await,
            )
            .await
        }
        Commands::WaitFor(args) => {
            let selector = args.selector.to_selector()?;
            if device
                .wait_for(&selector, Duration::from_millis(args.timeout))
                .await
            {
                println!("found {selector}");
                Ok(())
            } else {
                eprintln!("timed out waiting for {selector}");
                eprint!("{}", failure_diagnostics(&device.dump_screen().await));
                std::process::exit(1);
            }
        }
        Commands::Back => {
            device.press_back().await;
            Ok(())
        }
        Commands::Home => {
            device.press_home().await;
            Ok(())
        }
        Commands::Recents => {
            device.press_recent_apps().await;
            Ok(())
        }
        Commands::Key(args) => {
            device.press_key_event(args.code).await;
            Ok(())
        }
        Commands::Text(args) => {
            device.input_raw_text(&args.text).await;
            Ok(())
        }
        Commands::Logcat(args) => {
            if args.clear {
                device.logcat_clear().await?;
                info!("log buffer cleared");
                Ok(())
            } else if args.follow {
                follow_logcat(&device).await
            } else {
                print!("{}", device.logcat_dump(args.lines).await?);
                Ok(())
            }
        }
    }
}

/// Print a successful interaction, or report the failure with a screen dump
/// and exit nonzero.
async fn report(device: &AdbInteractor, result: InteractionResult) -> anyhow::Result<()> {
    match result {
        InteractionResult::Success(message) => {
            println!("{message}");
            Ok(())
        }
        other => {
            eprintln!("Error: {other}");
            eprint!("{}", failure_diagnostics(&device.dump_screen().await));
            std::process::exit(1);
        }
    }
}

/// Render the screen state captured after a failure.
///
/// The capture is best-effort: a dump that degraded to the empty root is
/// reported as unavailable instead of printed as an empty tree.
fn failure_diagnostics(screen: &ScreenNode) -> String {
    let mut out = String::from("--- Screen dump at failure ---\n");
    if *screen == ScreenNode::empty_root() {
        out.push_str("(could not capture screen)\n");
    } else {
        out.push_str(&screen.pretty_print());
    }
    out
}

/// Stream live log lines to stdout until Ctrl+C or the pipe closes.
async fn follow_logcat(device: &AdbInteractor) -> anyhow::Result<()> {
    let mut stream = device.logcat()?;
    loop {
        tokio::select! {
            line = stream.next_line() => match line {
                Some(line) => println!("{line}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    stream.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidpilot_core::parser;

    #[test]
    fn failure_diagnostics_prints_screen_tree() {
        let screen = parser::parse(
            r#"<hierarchy>
                <node class="android.widget.FrameLayout" bounds="[0,0][1080,2400]">
                    <node class="android.widget.Button" text="Retry" bounds="[40,400][1040,520]" clickable="true"/>
                </node>
            </hierarchy>"#,
        )
        .unwrap();
        let out = failure_diagnostics(&screen);
        assert!(out.starts_with("--- Screen dump at failure ---\n"));
        assert!(out.contains("android.widget.Button"));
        assert!(out.contains("text=\"Retry\""));
    }

    #[test]
    fn failure_diagnostics_degrades_when_capture_failed() {
        let out = failure_diagnostics(&ScreenNode::empty_root());
        assert!(out.contains("(could not capture screen)"));
        assert!(!out.contains("|"), "no node lines for a failed capture");
    }
}
