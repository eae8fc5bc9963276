//! Direct backend over a live UI-inspection handle.
//!
//! Unlike the [ADB backend](crate::adb), this backend holds an in-process
//! handle to the device's UI service and can resolve a selector straight to
//! a live element without materializing the whole tree. Coordinates for
//! taps come from the element's visible bounds at the moment of the call,
//! so they track UI movement between queries.
//!
//! The handle itself is host-supplied and modeled as the [`UiAutomation`]
//! trait; elements are addressed through opaque [`ElementId`] tokens valid
//! until the next query.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::interactor::{DeviceInteractor, SwipeDirection, DEFAULT_SWIPE_STEPS};
use crate::logstream::LogStream;
use crate::parser;
use crate::result::{DeviceError, InteractionResult};
use crate::screen::{Bounds, ScreenNode};
use crate::selector::Selector;
use crate::wait::{self, DEFAULT_POLL_INTERVAL};

/// Opaque element token issued by a [`UiAutomation`] handle.
///
/// Valid until the next `find_object` call on the same handle.
pub type ElementId = u64;

/// Distance kept from screen edges when synthesizing full-screen swipes.
const SWIPE_MARGIN: i32 = 100;
/// Steps for the zero-displacement long-press drag (~750ms at ~5ms/step).
const LONG_PRESS_STEPS: u32 = 150;

/// Live view of the device UI service, supplied by the host environment.
///
/// Calls are synchronous round-trips into the service. All faults surface
/// as [`DeviceError::Transport`].
pub trait UiAutomation: Send + Sync {
    /// Package owning the foreground UI, if any.
    fn current_package(&self) -> Result<Option<String>, DeviceError>;

    /// Fire the launcher intent for `package`.
    fn launch_app(&self, package: &str) -> Result<(), DeviceError>;

    fn stop_app(&self, package: &str) -> Result<(), DeviceError>;

    /// Resolve `selector` to a live element, first match wins.
    fn find_object(&self, selector: &Selector) -> Result<Option<ElementId>, DeviceError>;

    /// Visible bounds of a live element at this moment.
    fn element_bounds(&self, element: ElementId) -> Result<Bounds, DeviceError>;

    fn element_set_text(&self, element: ElementId, text: &str) -> Result<(), DeviceError>;

    fn element_clear(&self, element: ElementId) -> Result<(), DeviceError>;

    /// Serialize the full window hierarchy as a uiautomator XML dump.
    fn dump_hierarchy(&self) -> Result<String, DeviceError>;

    fn display_size(&self) -> (i32, i32);

    fn click(&self, x: i32, y: i32) -> Result<(), DeviceError>;

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, steps: u32) -> Result<(), DeviceError>;

    fn press_back(&self) -> Result<(), DeviceError>;

    fn press_home(&self) -> Result<(), DeviceError>;

    fn press_recent_apps(&self) -> Result<(), DeviceError>;

    fn press_key(&self, key_code: u32) -> Result<(), DeviceError>;

    fn input_text(&self, text: &str) -> Result<(), DeviceError>;

    /// Block until the UI goes quiet or `timeout` elapses.
    fn wait_idle(&self, timeout: Duration);

    /// PNG screenshot bytes.
    fn screenshot(&self) -> Result<Vec<u8>, DeviceError>;
}

/// Device interactor backed by a live [`UiAutomation`] handle.
pub struct DirectInteractor {
    ui: Box<dyn UiAutomation>,
}

impl DirectInteractor {
    pub fn new(ui: Box<dyn UiAutomation>) -> Self {
        Self { ui }
    }

    /// Resolve a selector to its live center point, or a ready result.
    fn resolve_center(&self, selector: &Selector) -> Result<(ElementId, i32, i32), InteractionResult> {
        let element = match self.ui.find_object(selector) {
            Ok(Some(element)) => element,
            Ok(None) => return Err(InteractionResult::ElementNotFound(selector.clone())),
            Err(e) => return Err(InteractionResult::Error(e)),
        };
        match self.ui.element_bounds(element) {
            Ok(bounds) => Ok((element, bounds.center_x(), bounds.center_y())),
            Err(e) => Err(InteractionResult::Error(e)),
        }
    }

    fn fire(&self, outcome: Result<(), DeviceError>) {
        if let Err(e) = outcome {
            warn!("input injection failed: {}", e);
        }
    }
}

#[async_trait]
impl DeviceInteractor for DirectInteractor {
    async fn launch_app(&self, package: &str, timeout: Duration) -> InteractionResult {
        if let Err(e) = self.ui.launch_app(package) {
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
        match self.ui.stop_app(package) {
            Ok(()) => InteractionResult::success(format!("App stopped: {}", package)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn is_app_running(&self, package: &str) -> bool {
        match self.ui.current_package() {
            Ok(current) => current.as_deref() == Some(package),
            Err(e) => {
                debug!("foreground query failed: {}", e);
                false
            }
        }
    }

    async fn dump_screen(&self) -> ScreenNode {
        let dumped = self
            .ui
            .dump_hierarchy()
            .and_then(|xml| parser::parse(&xml).map_err(DeviceError::from));
        match dumped {
            Ok(root) => root,
            Err(e) => {
                warn!("screen dump failed, returning empty tree: {}", e);
                ScreenNode::empty_root()
            }
        }
    }

    async fn screen_contains(&self, selector: &Selector) -> bool {
        matches!(self.ui.find_object(selector), Ok(Some(_)))
    }

    async fn wait_for(&self, selector: &Selector, timeout: Duration) -> bool {
        wait::await_condition(
            move || self.screen_contains(selector),
            timeout,
            DEFAULT_POLL_INTERVAL,
        )
        .await
    }

    async fn wait_for_idle(&self, timeout: Duration) {
        self.ui.wait_idle(timeout);
    }

    async fn click(&self, selector: &Selector) -> InteractionResult {
        let (_, x, y) = match self.resolve_center(selector) {
            Ok(target) => target,
            Err(result) => return result,
        };
        match self.ui.click(x, y) {
            Ok(()) => InteractionResult::success(format!("Clicked: {}", selector)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn long_click(&self, selector: &Selector) -> InteractionResult {
        let (_, x, y) = match self.resolve_center(selector) {
            Ok(target) => target,
            Err(result) => return result,
        };
        // The injection surface has no long-press call; hold an in-place drag.
        match self.ui.swipe(x, y, x, y, LONG_PRESS_STEPS) {
            Ok(()) => InteractionResult::success(format!("Long clicked: {}", selector)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn type_text(&self, selector: &Selector, text: &str) -> InteractionResult {
        let (element, x, y) = match self.resolve_center(selector) {
            Ok(target) => target,
            Err(result) => return result,
        };
        let typed = self
            .ui
            .click(x, y)
            .and_then(|()| self.ui.element_set_text(element, text));
        match typed {
            Ok(()) => InteractionResult::success(format!("Typed text: {}", text)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn clear_and_type(&self, selector: &Selector, text: &str) -> InteractionResult {
        let (element, x, y) = match self.resolve_center(selector) {
            Ok(target) => target,
            Err(result) => return result,
        };
        let typed = self
            .ui
            .click(x, y)
            .and_then(|()| self.ui.element_clear(element))
            .and_then(|()| self.ui.element_set_text(element, text));
        match typed {
            Ok(()) => InteractionResult::success(format!("Cleared and typed: {}", text)),
            Err(e) => InteractionResult::Error(e),
        }
    }

    async fn swipe(&self, direction: SwipeDirection, steps: u32) -> InteractionResult {
        let (w, h) = self.ui.display_size();
        let (cx, cy) = (w / 2, h / 2);
        let m = SWIPE_MARGIN;
        let swiped = match direction {
            SwipeDirection::Up => self.ui.swipe(cx, h - m, cx, m, steps),
            SwipeDirection::Down => self.ui.swipe(cx, m, cx, h - m, steps),
            SwipeDirection::Left => self.ui.swipe(w - m, cy, m, cy, steps),
            SwipeDirection::Right => self.ui.swipe(m, cy, w - m, cy, steps),
        };
        match swiped {
            Ok(()) => InteractionResult::success(format!("Swiped: {}", direction)),
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
        self.fire(self.ui.click(x, y));
    }

    async fn press_back(&self) {
        self.fire(self.ui.press_back());
    }

    async fn press_home(&self) {
        self.fire(self.ui.press_home());
    }

    async fn press_recent_apps(&self) {
        self.fire(self.ui.press_recent_apps());
    }

    async fn press_key_event(&self, key_code: u32) {
        self.fire(self.ui.press_key(key_code));
    }

    async fn input_raw_text(&self, text: &str) {
        self.fire(self.ui.input_text(text));
    }

    fn logcat(&self) -> Result<LogStream, DeviceError> {
        // Running on-device next to the UI service: read the local log.
        LogStream::spawn(Command::new("logcat"))
    }

    async fn logcat_dump(&self, lines: u32) -> Result<String, DeviceError> {
        let count = lines.to_string();
        let output = Command::new("logcat")
            .args(["-d", "-t", &count])
            .output()
            .await
            .map_err(|e| DeviceError::transport("logcat -d", e))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn logcat_clear(&self) -> Result<(), DeviceError> {
        Command::new("logcat")
            .arg("-c")
            .status()
            .await
            .map_err(|e| DeviceError::transport("logcat -c", e))?;
        Ok(())
    }

    async fn take_screenshot(&self, name: &str) -> Option<PathBuf> {
        let bytes = match self.ui.screenshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not take screenshot: {}", e);
                return None;
            }
        };
        let stamp = chrono::Utc::now().timestamp_millis();
        let path = std::env::temp_dir().join(format!("{}_{}.png", name, stamp));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("could not write screenshot: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Scripted stand-in for the live UI service.
    ///
    /// Holds a sequence of screens; each swipe advances to the next one,
    /// which is how the scroll tests reveal an element "below the fold".
    /// Clones share state so tests can inspect what the backend did.
    #[derive(Clone)]
    struct FakeUi {
        state: Arc<Mutex<FakeState>>,
    }

    struct FakeState {
        screens: Vec<(String, ScreenNode)>,
        current: usize,
        package: Option<String>,
        clicks: Vec<(i32, i32)>,
        swipes: u32,
        set_texts: Vec<(ElementId, String)>,
        clears: Vec<ElementId>,
        broken_dump: bool,
    }

    impl FakeUi {
        fn with_screens(xmls: &[&str]) -> Self {
            let screens = xmls
                .iter()
                .map(|xml| (xml.to_string(), parser::parse(xml).unwrap()))
                .collect();
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    screens,
                    current: 0,
                    package: None,
                    clicks: Vec::new(),
                    swipes: 0,
                    set_texts: Vec::new(),
                    clears: Vec::new(),
                    broken_dump: false,
                })),
            }
        }

        fn single(xml: &str) -> Self {
            Self::with_screens(&[xml])
        }
    }

    impl UiAutomation for FakeUi {
        fn current_package(&self) -> Result<Option<String>, DeviceError> {
            Ok(self.state.lock().unwrap().package.clone())
        }

        fn launch_app(&self, package: &str) -> Result<(), DeviceError> {
            self.state.lock().unwrap().package = Some(package.to_string());
            Ok(())
        }

        fn stop_app(&self, _package: &str) -> Result<(), DeviceError> {
            self.state.lock().unwrap().package = None;
            Ok(())
        }

        fn find_object(&self, selector: &Selector) -> Result<Option<ElementId>, DeviceError> {
            let state = self.state.lock().unwrap();
            let screen = &state.screens[state.current].1;
            Ok(screen
                .flatten()
                .iter()
                .position(|n| selector.matches(n))
                .map(|i| i as ElementId))
        }

        fn element_bounds(&self, element: ElementId) -> Result<Bounds, DeviceError> {
            let state = self.state.lock().unwrap();
            let screen = &state.screens[state.current].1;
            screen
                .flatten()
                .get(element as usize)
                .and_then(|n| n.bounds)
                .ok_or_else(|| DeviceError::transport("element_bounds", "stale element"))
        }

        fn element_set_text(&self, element: ElementId, text: &str) -> Result<(), DeviceError> {
            self.state
                .lock()
                .unwrap()
                .set_texts
                .push((element, text.to_string()));
            Ok(())
        }

        fn element_clear(&self, element: ElementId) -> Result<(), DeviceError> {
            self.state.lock().unwrap().clears.push(element);
            Ok(())
        }

        fn dump_hierarchy(&self) -> Result<String, DeviceError> {
            let state = self.state.lock().unwrap();
            if state.broken_dump {
                return Err(DeviceError::transport("dump_hierarchy", "service gone"));
            }
            Ok(state.screens[state.current].0.clone())
        }

        fn display_size(&self) -> (i32, i32) {
            (1080, 2400)
        }

        fn click(&self, x: i32, y: i32) -> Result<(), DeviceError> {
            self.state.lock().unwrap().clicks.push((x, y));
            Ok(())
        }

        fn swipe(&self, _x1: i32, _y1: i32, _x2: i32, _y2: i32, _steps: u32) -> Result<(), DeviceError> {
            let mut state = self.state.lock().unwrap();
            state.swipes += 1;
            if state.current + 1 < state.screens.len() {
                state.current += 1;
            }
            Ok(())
        }

        fn press_back(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn press_home(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn press_recent_apps(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn press_key(&self, _key_code: u32) -> Result<(), DeviceError> {
            Ok(())
        }

        fn input_text(&self, _text: &str) -> Result<(), DeviceError> {
            Ok(())
        }

        fn wait_idle(&self, _timeout: Duration) {}

        fn screenshot(&self) -> Result<Vec<u8>, DeviceError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    const LOGIN_SCREEN: &str = r#"<hierarchy>
        <node class="android.widget.FrameLayout" bounds="[0,0][1080,2400]">
            <node class="android.widget.EditText" resource-id="com.example:id/user" bounds="[40,200][1040,320]"/>
            <node class="android.widget.Button" text="Sign in" bounds="[40,400][1040,520]" clickable="true"/>
        </node>
    </hierarchy>"#;

    const EMPTY_SCREEN: &str = r#"<hierarchy>
        <node class="android.widget.FrameLayout" bounds="[0,0][1080,2400]"/>
    </hierarchy>"#;

    fn interactor(fake: &FakeUi) -> DirectInteractor {
        DirectInteractor::new(Box::new(fake.clone()))
    }

    #[tokio::test]
    async fn click_taps_live_element_center() {
        let fake = FakeUi::single(LOGIN_SCREEN);
        let driver = interactor(&fake);
        let result = driver.click(&Selector::text("Sign in")).await;
        assert!(result.is_success(), "{}", result);
        assert_eq!(fake.state.lock().unwrap().clicks.as_slice(), &[(540, 460)]);
    }

    #[tokio::test]
    async fn click_on_missing_element_reports_not_found() {
        let fake = FakeUi::single(LOGIN_SCREEN);
        let driver = interactor(&fake);
        let selector = Selector::text("Sign out");
        match driver.click(&selector).await {
            InteractionResult::ElementNotFound(sel) => assert_eq!(sel, selector),
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
        assert!(fake.state.lock().unwrap().clicks.is_empty());
    }

    #[tokio::test]
    async fn type_text_focuses_then_sets_text() {
        let fake = FakeUi::single(LOGIN_SCREEN);
        let driver = interactor(&fake);
        let result = driver
            .type_text(&Selector::resource_id("user"), "alice")
            .await;
        assert!(result.is_success(), "{}", result);
        let state = fake.state.lock().unwrap();
        assert_eq!(state.clicks.len(), 1, "field is tapped before typing");
        assert_eq!(state.set_texts.as_slice(), &[(1, "alice".to_string())]);
    }

    #[tokio::test]
    async fn clear_and_type_clears_before_typing() {
        let fake = FakeUi::single(LOGIN_SCREEN);
        let driver = interactor(&fake);
        let result = driver
            .clear_and_type(&Selector::resource_id("user"), "bob")
            .await;
        assert!(result.is_success(), "{}", result);
        let state = fake.state.lock().unwrap();
        assert_eq!(state.clears.as_slice(), &[1]);
        assert_eq!(state.set_texts.as_slice(), &[(1, "bob".to_string())]);
    }

    #[tokio::test]
    async fn scroll_until_found_checks_after_final_swipe() {
        // Target appears only on the fourth screen, reached by the third swipe;
        // the post-loop check must still see it.
        let fake = FakeUi::with_screens(&[EMPTY_SCREEN, EMPTY_SCREEN, EMPTY_SCREEN, LOGIN_SCREEN]);
        let driver = interactor(&fake);
        let result = driver
            .scroll_until_found(
                &Selector::text("Sign in"),
                SwipeDirection::Down,
                3,
                Duration::from_millis(1),
            )
            .await;
        assert!(result.is_success(), "{}", result);
        assert_eq!(fake.state.lock().unwrap().swipes, 3);
    }

    #[tokio::test]
    async fn scroll_until_found_gives_up_as_not_found() {
        let fake = FakeUi::with_screens(&[EMPTY_SCREEN, EMPTY_SCREEN]);
        let driver = interactor(&fake);
        let selector = Selector::text("Sign in");
        match driver
            .scroll_until_found(&selector, SwipeDirection::Down, 2, Duration::from_millis(1))
            .await
        {
            InteractionResult::ElementNotFound(sel) => assert_eq!(sel, selector),
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn launch_app_polls_foreground() {
        let fake = FakeUi::single(EMPTY_SCREEN);
        let driver = interactor(&fake);
        let result = driver
            .launch_app("com.example.app", Duration::from_secs(5))
            .await;
        assert!(result.is_success(), "{}", result);
        assert!(driver.is_app_running("com.example.app").await);
        assert!(!driver.is_app_running("com.other.app").await);
    }

    #[tokio::test]
    async fn dump_screen_degrades_to_empty_root() {
        let fake = FakeUi::single(LOGIN_SCREEN);
        let driver = interactor(&fake);
        fake.state.lock().unwrap().broken_dump = true;
        let screen = driver.dump_screen().await;
        assert_eq!(screen, ScreenNode::empty_root());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_on_absent_element() {
        let fake = FakeUi::single(EMPTY_SCREEN);
        let driver = interactor(&fake);
        assert!(
            !driver
                .wait_for(&Selector::text("Sign in"), Duration::from_millis(600))
                .await
        );
        assert!(
            driver
                .wait_for(
                    &Selector::class_name("android.widget.FrameLayout"),
                    Duration::from_secs(1)
                )
                .await
        );
    }
}
