//! CLI argument parsing with clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use droidpilot_core::interactor::{
    DEFAULT_LAUNCH_TIMEOUT, DEFAULT_MAX_SCROLLS, DEFAULT_SCROLL_DELAY, DEFAULT_SWIPE_STEPS,
    DEFAULT_WAIT_TIMEOUT,
};
use droidpilot_core::{Selector, SwipeDirection};

/// Android device automation from the command line.
///
/// Drive a connected device or emulator over adb: inspect the UI tree,
/// tap/type/swipe by declarative selectors, and wait for screens to load.
/// Designed for scripting and AI agent consumption.
#[derive(Debug, Parser)]
#[command(name = "droidpilot", version)]
pub struct Cli {
    /// Target a specific device serial (adb -s)
    #[arg(short, long, global = true)]
    pub serial: Option<String>,

    /// Path to the adb executable
    #[arg(long, global = true, default_value = "adb")]
    pub adb_path: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch an app and wait for it to reach the foreground
    #[command(after_help = "\
Examples:
  droidpilot launch com.android.settings
  droidpilot launch com.example.app --timeout 30000")]
    Launch(LaunchArgs),

    /// Force-stop an app
    Stop(PackageArgs),

    /// Check whether an app owns the foreground
    Running(PackageArgs),

    /// Dump the current UI tree
    #[command(after_help = "\
Examples:
  droidpilot dump                       # Indented one-line-per-node text
  droidpilot dump --json                # Full tree as JSON

Use the output to pick a selector (--text, --id, --desc, --class)
for click/type/wait commands. Always dump before interacting.")]
    Dump(DumpArgs),

    /// Capture a screenshot into the local temp directory
    Screenshot(ScreenshotArgs),

    /// Show display size, density, and the foreground package
    DeviceInfo,

    /// Click the first element matching a selector
    #[command(after_help = "\
Examples:
  droidpilot click --text 'Sign in'
  droidpilot click --id login_button
  droidpilot click --desc 'Navigate up'")]
    Click(SelectorArgs),

    /// Long-click the first element matching a selector
    LongClick(SelectorArgs),

    /// Tap at raw screen coordinates
    Tap(TapArgs),

    /// Type text into the element matching a selector
    #[command(
        name = "type",
        after_help = "\
Examples:
  droidpilot type --id search_field 'donuts near me'
  droidpilot clear-type --id search_field 'fresh query'"
    )]
    Type(TypeArgs),

    /// Clear a field, then type text into it
    ClearType(TypeArgs),

    /// Swipe across the screen
    Swipe(SwipeArgs),

    /// Scroll until a selector appears on screen
    #[command(after_help = "\
Examples:
  droidpilot scroll --text 'Terms of service'
  droidpilot scroll --id footer --direction up --max-scrolls 10")]
    Scroll(ScrollArgs),

    /// Wait for an element to appear on screen
    #[command(after_help = "\
Examples:
  droidpilot wait-for --text 'Welcome'
  droidpilot wait-for --id progress_done --timeout 15000

Exits nonzero on timeout, so scripts can branch on it.")]
    WaitFor(WaitForArgs),

    /// Press the back button
    Back,

    /// Press the home button
    Home,

    /// Open the recent-apps switcher
    Recents,

    /// Send a raw key event code
    Key(KeyArgs),

    /// Type raw text at the current focus
    Text(TextArgs),

    /// Dump, follow, or clear the device log
    #[command(after_help = "\
Examples:
  droidpilot logcat                     # Last 500 lines
  droidpilot logcat --lines 2000
  droidpilot logcat --follow            # Stream until Ctrl+C
  droidpilot logcat --clear")]
    Logcat(LogcatArgs),
}

#[derive(Debug, clap::Args)]
pub struct LaunchArgs {
    /// Package name (e.g. com.android.settings)
    pub package: String,

    /// Max wait for the app to reach the foreground, in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_LAUNCH_TIMEOUT.as_millis() as u64)]
    pub timeout: u64,
}

#[derive(Debug, clap::Args)]
pub struct PackageArgs {
    /// Package name
    pub package: String,
}

#[derive(Debug, clap::Args)]
pub struct DumpArgs {
    /// Emit the tree as JSON instead of indented text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct ScreenshotArgs {
    /// Base name for the screenshot file
    #[arg(default_value = "screenshot")]
    pub name: String,
}

#[derive(Debug, clap::Args)]
pub struct TapArgs {
    /// X coordinate in device pixels
    pub x: i32,

    /// Y coordinate in device pixels
    pub y: i32,
}

/// Element selector flags shared by interaction commands.
///
/// Exactly one of the flags must be given.
#[derive(Debug, Clone, clap::Args)]
pub struct SelectorArgs {
    /// Match by resource-id substring
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Match by exact visible text
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Match by case-insensitive text substring
    #[arg(long, value_name = "TEXT")]
    pub text_contains: Option<String>,

    /// Match by exact accessibility description
    #[arg(long, value_name = "DESC")]
    pub desc: Option<String>,

    /// Match by exact class name
    #[arg(long, value_name = "CLASS")]
    pub class: Option<String>,
}

impl SelectorArgs {
    /// Convert the flags into a selector, requiring exactly one criterion.
    pub fn to_selector(&self) -> anyhow::Result<Selector> {
        let mut selectors = Vec::new();
        if let Some(id) = &self.id {
            selectors.push(Selector::resource_id(id));
        }
        if let Some(text) = &self.text {
            selectors.push(Selector::text(text));
        }
        if let Some(text) = &self.text_contains {
            selectors.push(Selector::text_contains(text));
        }
        if let Some(desc) = &self.desc {
            selectors.push(Selector::description(desc));
        }
        if let Some(class) = &self.class {
            selectors.push(Selector::class_name(class));
        }
        match selectors.len() {
            1 => Ok(selectors.remove(0)),
            0 => anyhow::bail!(
                "no selector given; use one of --id, --text, --text-contains, --desc, --class"
            ),
            _ => anyhow::bail!("give exactly one selector flag"),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct TypeArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Text to type
    #[arg(id = "type_text", value_name = "TEXT")]
    pub text: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl From<Direction> for SwipeDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => SwipeDirection::Up,
            Direction::Down => SwipeDirection::Down,
            Direction::Left => SwipeDirection::Left,
            Direction::Right => SwipeDirection::Right,
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct SwipeArgs {
    /// Direction to swipe
    #[arg(value_enum)]
    pub direction: Direction,

    /// Gesture steps (each step is roughly 5ms)
    #[arg(long, default_value_t = DEFAULT_SWIPE_STEPS)]
    pub steps: u32,
}

#[derive(Debug, clap::Args)]
pub struct ScrollArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Direction to scroll
    #[arg(long, value_enum, default_value_t = Direction::Down)]
    pub direction: Direction,

    /// Maximum number of swipes before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_SCROLLS)]
    pub max_scrolls: u32,

    /// Pause between swipes, in milliseconds
    #[arg(long, default_value_t = DEFAULT_SCROLL_DELAY.as_millis() as u64)]
    pub delay: u64,
}

#[derive(Debug, clap::Args)]
pub struct WaitForArgs {
    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Timeout in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_WAIT_TIMEOUT.as_millis() as u64)]
    pub timeout: u64,
}

#[derive(Debug, clap::Args)]
pub struct KeyArgs {
    /// Android key event code (e.g. 4 for BACK, 66 for ENTER)
    pub code: u32,
}

#[derive(Debug, clap::Args)]
pub struct TextArgs {
    /// Text to inject at the current focus
    pub text: String,
}

#[derive(Debug, clap::Args)]
pub struct LogcatArgs {
    /// Number of recent lines to dump
    #[arg(short, long, default_value_t = 500)]
    pub lines: u32,

    /// Stream live log lines until interrupted
    #[arg(short, long, conflicts_with = "clear")]
    pub follow: bool,

    /// Clear the log buffer instead of reading it
    #[arg(long)]
    pub clear: bool,
}
