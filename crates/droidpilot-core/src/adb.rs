//! Remote-shell backend over an `adb` channel.
//!
//! This backend has no live handles into the device UI: every query runs
//! `uiautomator dump` on the device, reads the file back, and re-parses the
//! whole hierarchy. Interactions are synthesized `input` commands aimed at
//! the bounds recorded in the latest dump, which can be stale if the UI
//! moved between dump and tap.
//!
//! Foreground-app detection and display metrics come from pattern-matching
//! `dumpsys`/`wm` text output. Display geometry is queried once and cached
//! for the lifetime of the instance; device geometry is assumed static.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::interactor::{DeviceInteractor, SwipeDirection, DEFAULT_SWIPE_STEPS};
use crate::logstream::LogStream;
use crate::parser;
use crate::result::{DeviceError, InteractionResult};
use crate::screen::{Bounds, ScreenNode};
use crate::selector::Selector;
use crate::wait::{self, DEFAULT_POLL_INTERVAL};

/// Where `uiautomator dump` writes on the device.
const REMOTE_DUMP_PATH: &str = "/sdcard/window_dump.xml";
/// Pause after tapping a field before injecting text.
const FOCUS_SETTLE: Duration = Duration::from_millis(200);
/// Pause after clearing a field before typing.
const CLEAR_SETTLE: Duration = Duration::from_millis(100);
/// Delete-key presses used to empty a field (best-effort emulation).
const CLEAR_DELETE_COUNT: usize = 50;
/// Hold time for the zero-displacement long-press swipe, in ms.
const LONG_PRESS_MS: u32 = 750;
/// Distance kept from screen edges when synthesizing full-screen swipes.
const SWIPE_MARGIN: i32 = 100;

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)x(\d+)").unwrap())
}

fn density_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)").unwrap())
}

fn foreground_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Device platforms renamed the field; either spelling is equal evidence.
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:mResumedActivity|topResumedActivity).*?([a-zA-Z][a-zA-Z0-9_.]*)/").unwrap()
    })
}

/// Parse `wm size` output like "Physical size: 1080x2400".
fn parse_display_size(output: &str) -> Option<(i32, i32)> {
    let caps = size_pattern().captures(output)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

/// Parse `wm density` output like "Physical density: 420".
fn parse_display_density(output: &str) -> Option<u32> {
    density_pattern()
        .captures(output)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Extract the foreground package from `dumpsys activity activities` output.
fn extract_foreground_package(output: &str) -> Option<String> {
    foreground_pattern()
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Whether `dumpsys` output is evidence that `package` is in the foreground.
fn foreground_evidence(output: &str, package: &str) -> bool {
    let has_resumed =
        output.contains("mResumedActivity") || output.contains("topResumedActivity");
    has_resumed && output.contains(package)
}

/// Gesture duration for `input swipe`: roughly 5ms per uiautomator step,
/// saturating on absurd step counts.
fn swipe_duration_ms(steps: u32) -> u32 {
    steps.saturating_mul(5)
}

/// Escape text for `input text`: the shell on the device splits on spaces
/// and interprets metacharacters.
fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ' ' => escaped.push_str("%s"),
            '&' | '<' | '>' | '(' | ')' | '|' | ';' | '\'' | '"' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Device interactor speaking plain `adb`.
pub struct AdbInteractor {
    adb_path: String,
    serial: Option<String>,
    display: OnceCell<(i32, i32)>,
}

impl Default for AdbInteractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AdbInteractor {
    pub fn new() -> Self {
        Self {
            adb_path: "adb".to_string(),
            serial: None,
            display: OnceCell::new(),
        }
    }

    /// Use a specific `adb` executable.
    #[must_use]
    pub fn with_adb_path(mut self, path: impl Into<String>) -> Self {
        self.adb_path = path.into();
        self
    }

    /// Target a specific device (`adb -s <serial>`).
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        cmd
    }

    async fn adb(&self, args: &[&str]) -> Result<String, DeviceError> {
        debug!(command = %args.join(" "), "adb");
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| DeviceError::transport(format!("adb {}", args.join(" ")), e))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() && !stderr.trim().is_empty() {
            return Err(DeviceError::transport(
                format!("adb {}", args.join(" ")),
                stderr.trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.adb(&full).await
    }

    /// Run a shell command whose failure is logged, not surfaced.
    async fn fire(&self, args: &[&str]) {
        if let Err(e) = self.shell(args).await {
            warn!("input injection failed: {}", e);
        }
    }

    /// Display size in pixels, queried once and cached.
    pub async fn display_size(&self) -> Result<(i32, i32), DeviceError> {
        self.display
            .get_or_try_init(|| async {
                let output = self.shell(&["wm", "size"]).await?;
                parse_display_size(&output).ok_or_else(|| {
                    DeviceError::transport(
                        "adb shell wm size",
                        format!("unrecognized output: {}", output.trim()),
                    )
                })
            })
            .await
            .copied()
    }

    /// Display density in dpi.
    pub async fn display_density(&self) -> Result<u32, DeviceError> {
        let output = self.shell(&["wm", "density"]).await?;
        parse_display_density(&output).ok_or_else(|| {
            DeviceError::transport(
                "adb shell wm density",
                format!("unrecognized output: {}", output.trim()),
            )
        })
    }

    /// Package owning the foreground activity, if one can be determined.
    pub async fn current_package(&self) -> Result<Option<String>, DeviceError> {
        let output = self.shell(&["dumpsys", "activity", "activities"]).await?;
        Ok(extract_foreground_package(&output))
    }

    async fn try_dump(&self) -> Result<ScreenNode, DeviceError> {
        self.shell(&["uiautomator", "dump", REMOTE_DUMP_PATH]).await?;
        let xml = self.shell(&["cat", REMOTE_DUMP_PATH]).await?;
        let trimmed = xml.trim();
        if trimmed.is_empty()
            || !(trimmed.starts_with("<?xml") || trimmed.starts_with("<hierarchy"))
        {
            return Err(DeviceError::transport(
                "adb shell uiautomator dump",
                "no hierarchy produced",
            ));
        }
        Ok(parser::parse(trimmed)?)
    }

    /// Resolve `selector` to tappable bounds, or a ready-to-return result.
    async fn resolve_bounds(&self, selector: &Selector) -> Result<Bounds, InteractionResult> {
        let screen = self.dump_screen().await;
        let Some(node) = screen.find_first(selector) else {
            return Err(InteractionResult::ElementNotFound(selector.clone()));
        };
        node.bounds.ok_or_else(|| {
            InteractionResult::Error(DeviceError::transport(
                "adb shell uiautomator dump",
                format!("node matched by {} has no bounds", selector),
            ))
        })
    }

    async fn input_text(&self, text: &str) -> Result<(), DeviceError> {
        let escaped = escape_input_text(text);
        self.shell(&["input", "text", &escaped]).await.map(|_| ())
    }

    async fn tap_bounds(&self, bounds: Bounds) -> Result<(), DeviceError> {
        let x = bounds.center_x().to_string();
        let y = bounds.center_y().to_string();
        self.shell(&["input", "tap", &x, &y]).await.map(|_| ())
    }
}

#[async_trait]
impl DeviceInteractor for AdbInteractor {
    async fn launch_app(&self, package: &str, timeout: Duration) -> InteractionResult {
        let launch = self
            .shell(&["monkey", "-p", package, "-c", "android.intent.category.LAUNCHER", "1"])
            .await;
        if let Err(e) = launch {
            return InteractionResult::Error(e);
        }
        let running = wait::await_condition(
            move || self.is_app_running(package),
            timeout,
            DEFAULT_POLL_INTERVAL,
        )
        .await;
        if running {
            InteractionResult::success(format!("App launched: {}", package))
        } else {
            InteractionResult::Error(DeviceError::Timeout(timeout))
        }
    }

    async fn stop_app(&self, package: &str) -> InteractionResult {
        match self.shell(&["am", "force-stop", package]).await {
            Ok(_) => InteractionResult::success(format!("App stopped: {}", package)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn is_app_running(&self, package: &str) -> bool {
        match self.shell(&["dumpsys", "activity", "activities"]).await {
            Ok(output) => foreground_evidence(&output, package),
            Err(e) => {
                debug!("foreground query failed: {}", e);
                false
            }
        }
    }

    async fn dump_screen(&self) -> ScreenNode {
        match self.try_dump().await {
            Ok(root) => root,
            Err(e) => {
                warn!("screen dump failed, returning empty tree: {}", e);
                ScreenNode::empty_root()
            }
        }
    }

    async fn screen_contains(&self, selector: &Selector) -> bool {
        self.dump_screen().await.contains(selector)
    }

    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> bool {
        wait::await_condition(
            move || async move { self.dump_screen().await.contains(selector) },
            timeout,
            DEFAULT_POLL_INTERVAL,
        )
        .await
    }

    async fn wait_for_idle(&self, timeout: Duration) {
        // The shell transport exposes no idle signal; approximate with a
        // short sleep capped well below the requested timeout.
        tokio::time::sleep(timeout.min(Duration::from_secs(1))).await;
    }

    async fn click(&self, selector: &Selector) -> InteractionResult {
        let bounds = match self.resolve_bounds(selector).await {
            Ok(b) => b,
            Err(result) => return result,
        };
        match self.tap_bounds(bounds).await {
            Ok(()) => InteractionResult::success(format!("Clicked: {}", selector)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn long_click(&self, selector: &Selector) -> InteractionResult {
        let bounds = match self.resolve_bounds(selector).await {
            Ok(b) => b,
            Err(result) => return result,
        };
        let x = bounds.center_x().to_string();
        let y = bounds.center_y().to_string();
        let hold = LONG_PRESS_MS.to_string();
        // No long-press primitive in `input`; hold a zero-displacement swipe.
        match self.shell(&["input", "swipe", &x, &y, &x, &y, &hold]).await {
            Ok(_) => InteractionResult::success(format!("Long clicked: {}", selector)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> InteractionResult {
        let bounds = match self.resolve_bounds(selector).await {
            Ok(b) => b,
            Err(result) => return result,
        };
        let typed = async {
            self.tap_bounds(bounds).await?;
            tokio::time::sleep(FOCUS_SETTLE).await;
            self.input_text(text).await
        }
        .await;
        match typed {
            Ok(()) => InteractionResult::success(format!("Typed text: {}", text)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn clear_and_type(&self, selector: &Selector, text: &str) -> InteractionResult {
        let bounds = match self.resolve_bounds(selector).await {
            Ok(b) => b,
            Err(result) => return result,
        };
        let typed = async {
            self.tap_bounds(bounds).await?;
            tokio::time::sleep(FOCUS_SETTLE).await;
            // Jump to the end, then hold delete over the whole field.
            self.shell(&["input", "keyevent", "KEYCODE_MOVE_HOME"]).await?;
            let mut args = vec!["input", "keyevent", "--longpress"];
            args.extend(std::iter::repeat("KEYCODE_DEL").take(CLEAR_DELETE_COUNT));
            self.shell(&args).await?;
            tokio::time::sleep(CLEAR_SETTLE).await;
            self.input_text(text).await
        }
        .await;
        match typed {
            Ok(()) => InteractionResult::success(format!("Cleared and typed: {}", text)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn swipe(&self, direction: SwipeDirection, steps: u32) -> InteractionResult {
        let (w, h) = match self.display_size().await {
            Ok(size) => size,
            Err(e) => return InteractionResult::Error(e),
        };
        let (cx, cy) = (w / 2, h / 2);
        let m = SWIPE_MARGIN;
        let (x1, y1, x2, y2) = match direction {
            SwipeDirection::Up => (cx, h - m, cx, m),
            SwipeDirection::Down => (cx, m, cx, h - m),
            SwipeDirection::Left => (w - m, cy, m, cy),
            SwipeDirection::Right => (m, cy, w - m, cy),
        };
        let duration = swipe_duration_ms(steps).to_string();
        let coords = [x1.to_string(), y1.to_string(), x2.to_string(), y2.to_string()];
        let args: [&str; 7] = [
            "input", "swipe", &coords[0], &coords[1], &coords[2], &coords[3], &duration,
        ];
        match self.shell(&args).await {
            Ok(_) => InteractionResult::success(format!("Swiped: {}", direction)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn scroll_until_found(
        &self,
        selector: &Selector,
        direction: SwipeDirection,
        max_scrolls: u32,
        delay_between: Duration,
    ) -> InteractionResult {
        for _ in 0..max_scrolls {
            if self.screen_contains(selector).await {
                return InteractionResult::success(format!("Found after scrolling: {}", selector));
            }
            self.swipe(direction, DEFAULT_SWIPE_STEPS).await;
            tokio::time::sleep(delay_between).await;
        }
        // One more look after the last scroll settles.
        if self.screen_contains(selector).await {
            InteractionResult::success(format!("Found after scrolling: {}", selector))
        } else {
            InteractionResult::ElementNotFound(selector.clone())
        }
    }

    async fn click_at(&self, x: i32, y: i32) {
        let (x, y) = (x.to_string(), y.to_string());
        self.fire(&["input", "tap", &x, &y]).await;
    }

    async fn press_back(&self) {
        self.fire(&["input", "keyevent", "KEYCODE_BACK"]).await;
    }

    async fn press_home(&self) {
        self.fire(&["input", "keyevent", "KEYCODE_HOME"]).await;
    }

    async fn press_recent_apps(&self) {
        self.fire(&["input", "keyevent", "KEYCODE_APP_SWITCH"]).await;
    }

    async fn press_key_event(&self, key_code: u32) {
        let code = key_code.to_string();
        self.fire(&["input", "keyevent", &code]).await;
    }

    async fn input_raw_text(&self, text: &str) {
        if let Err(e) = self.input_text(text).await {
            warn!("input text failed: {}", e);
        }
    }

    fn logcat(&self) -> Result<LogStream, DeviceError> {
        LogStream::spawn(self.command(&["logcat"]))
    }

    async fn logcat_dump(&self, lines: u32) -> Result<String, DeviceError> {
        let count = lines.to_string();
        self.adb(&["logcat", "-d", "-t", &count]).await
    }

    async fn logcat_clear(&self) -> Result<(), DeviceError> {
        self.adb(&["logcat", "-c"]).await.map(|_| ())
    }

    async fn take_screenshot(&self, name: &str) -> Option<PathBuf> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let file_name = format!("{}_{}.png", name, stamp);
        let remote = format!("/sdcard/{}", file_name);
        let local = std::env::temp_dir().join(&file_name);
        let captured = async {
            self.shell(&["screencap", "-p", &remote]).await?;
            self.adb(&["pull", &remote, &local.to_string_lossy()]).await?;
            self.shell(&["rm", &remote]).await
        }
        .await;
        match captured {
            Ok(_) => Some(local),
            Err(e) => {
                warn!("could not take screenshot: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_input_text_for_device_shell() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a&b"), "a\\&b");
        assert_eq!(escape_input_text("(1|2);'x'"), "\\(1\\|2\\)\\;\\'x\\'");
        assert_eq!(escape_input_text("c:\\path"), "c:\\\\path");
        assert_eq!(escape_input_text("say \"hi\" <now>"), "say%s\\\"hi\\\"%s\\<now\\>");
        assert_eq!(escape_input_text("plain"), "plain");
    }

    #[test]
    fn swipe_duration_saturates_on_huge_step_counts() {
        assert_eq!(swipe_duration_ms(20), 100);
        assert_eq!(swipe_duration_ms(u32::MAX), u32::MAX);
    }

    #[test]
    fn parses_wm_size_output() {
        assert_eq!(
            parse_display_size("Physical size: 1080x2400\n"),
            Some((1080, 2400))
        );
        assert_eq!(parse_display_size("no size here"), None);
    }

    #[test]
    fn parses_wm_density_output() {
        assert_eq!(parse_display_density("Physical density: 420\n"), Some(420));
        assert_eq!(parse_display_density(""), None);
    }

    #[test]
    fn foreground_package_matches_old_field_name() {
        let output = "  mResumedActivity: ActivityRecord{abc u0 com.example.app/.MainActivity t12}";
        assert_eq!(
            extract_foreground_package(output).as_deref(),
            Some("com.example.app")
        );
    }

    #[test]
    fn foreground_package_matches_new_field_name() {
        let output = "  topResumedActivity=ActivityRecord{def u0 org.other.pkg/.Home t3}";
        assert_eq!(
            extract_foreground_package(output).as_deref(),
            Some("org.other.pkg")
        );
    }

    #[test]
    fn foreground_evidence_requires_field_and_package() {
        let old = "mResumedActivity: ActivityRecord{x u0 com.example.app/.Main t1}";
        let new = "topResumedActivity=ActivityRecord{x u0 com.example.app/.Main t1}";
        assert!(foreground_evidence(old, "com.example.app"));
        assert!(foreground_evidence(new, "com.example.app"));
        assert!(!foreground_evidence(old, "com.missing.app"));
        // Package mentioned but no resumed-activity field at all.
        assert!(!foreground_evidence("task: com.example.app", "com.example.app"));
    }

    #[test]
    fn builder_configures_path_and_serial() {
        let interactor = AdbInteractor::new()
            .with_adb_path("/opt/sdk/adb")
            .with_serial("emulator-5554");
        assert_eq!(interactor.adb_path, "/opt/sdk/adb");
        assert_eq!(interactor.serial.as_deref(), Some("emulator-5554"));
    }
}
