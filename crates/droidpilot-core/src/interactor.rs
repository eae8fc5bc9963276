//! The backend-agnostic device interaction contract.
//!
//! Two backends implement this trait with very different internals: the
//! [direct backend](crate::direct) resolves selectors against a live UI
//! service handle, while the [ADB backend](crate::adb) re-dumps and
//! re-parses the hierarchy for every query. Callers get identical
//! success/failure semantics from both:
//!
//! - selector resolution always takes the first pre-order match
//! - a selector matching nothing is [`InteractionResult::ElementNotFound`],
//!   never an error
//! - `dump_screen` never fails; a broken transport degrades to the empty
//!   root so downstream queries stay total
//! - bounded waits compute their deadline once at call entry

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::logstream::LogStream;
use crate::result::{DeviceError, InteractionResult};
use crate::screen::ScreenNode;
use crate::selector::Selector;

/// Full-screen swipe direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl std::fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        };
        f.write_str(s)
    }
}

/// Default timeout for [`DeviceInteractor::launch_app`].
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Default timeout for [`DeviceInteractor::wait_for`] and `wait_for_idle`.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default swipe steps (each step is roughly 5ms of gesture time).
pub const DEFAULT_SWIPE_STEPS: u32 = 20;
/// Default scroll attempts for [`DeviceInteractor::scroll_until_found`].
pub const DEFAULT_MAX_SCROLLS: u32 = 5;
/// Default pause between scrolls.
pub const DEFAULT_SCROLL_DELAY: Duration = Duration::from_millis(500);

/// Operations any device backend must provide.
///
/// One instance serves one logical caller: operations issued sequentially
/// complete in issue order, and no operation overlaps another against the
/// same backend. Instances for different devices are fully independent.
#[async_trait]
pub trait DeviceInteractor: Send + Sync {
    // App lifecycle

    /// Start `package` and poll until it owns the foreground or `timeout`
    /// elapses. A timeout is `Error`, never `ElementNotFound`.
    async fn launch_app(&self, package: &str, timeout: Duration) -> InteractionResult;

    async fn stop_app(&self, package: &str) -> InteractionResult;

    async fn is_app_running(&self, package: &str) -> bool;

    // Screen

    /// Capture a fresh snapshot tree. Never fails: transport or parse
    /// trouble collapses to the synthetic empty root.
    async fn dump_screen(&self) -> ScreenNode;

    async fn screen_contains(&self, selector: &Selector) -> bool;

    // Waiting

    /// True once `selector` appears on screen, false after `timeout`.
    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> bool;

    /// Wait for the UI to go quiet. Best effort: the ADB backend has no
    /// idle signal and degrades to a short fixed sleep.
    async fn wait_for_idle(&self, timeout: Duration);

    // Interactions

    async fn click(&self, selector: &Selector) -> InteractionResult;

    async fn long_click(&self, selector: &Selector) -> InteractionResult;

    async fn type_text(&self, selector: &Selector, text: &str) -> InteractionResult;

    async fn clear_and_type(&self, selector: &Selector, text: &str) -> InteractionResult;

    async fn swipe(&self, direction: SwipeDirection, steps: u32) -> InteractionResult;

    /// Swipe up to `max_scrolls` times until `selector` is on screen,
    /// checking before the first swipe and again after the last.
    async fn scroll_until_found(
        &self,
        selector: &Selector,
        direction: SwipeDirection,
        max_scrolls: u32,
        delay_between: Duration,
    ) -> InteractionResult;

    // Fire-and-forget primitives: assumed to succeed at the transport
    // level; failures are logged and swallowed.

    async fn click_at(&self, x: i32, y: i32);

    async fn press_back(&self);

    async fn press_home(&self);

    async fn press_recent_apps(&self);

    async fn press_key_event(&self, key_code: u32);

    async fn input_raw_text(&self, text: &str);

    // Debug capture

    /// Subscribe to the live device log. The stream owns its reader process
    /// and tears it down on close/drop.
    fn logcat(&self) -> Result<LogStream, DeviceError>;

    async fn logcat_dump(&self, lines: u32) -> Result<String, DeviceError>;

    async fn logcat_clear(&self) -> Result<(), DeviceError>;

    /// Capture a screenshot into the local temp dir. Best effort: a failed
    /// capture logs a warning and returns `None`.
    async fn take_screenshot(&self, name: &str) -> Option<PathBuf>;
}
