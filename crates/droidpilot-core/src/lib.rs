//! Core types and logic for droidpilot.
//!
//! This crate drives interactive automation of an Android device: locate
//! UI elements with declarative selectors, interpret hierarchy dumps as
//! immutable snapshot trees, and tap/type/swipe/navigate through a common
//! backend contract.
//!
//! # Modules
//!
//! - [`selector`]: declarative element-matching criteria
//! - [`screen`]: snapshot tree model with query operations
//! - [`parser`]: uiautomator XML dump → snapshot tree
//! - [`wait`]: deadline-bounded polling primitive
//! - [`result`]: interaction outcomes and the device error taxonomy
//! - [`interactor`]: the backend-agnostic operation contract
//! - [`adb`]: remote-shell backend over an `adb` channel
//! - [`direct`]: backend over a live in-process UI-service handle
//! - [`logstream`]: cancellable live log-line streaming
//!
//! # Backends
//!
//! Both backends implement [`DeviceInteractor`] with identical semantics
//! but very different mechanics:
//!
//! | | Direct | ADB |
//! |---|--------|-----|
//! | Selector resolution | live element handle | dump + parse + flatten |
//! | Tap coordinates | visible bounds at call time | bounds from last dump |
//! | Idle wait | real idle signal | short fixed sleep |
//!
//! ```no_run
//! use droidpilot_core::{AdbInteractor, DeviceInteractor, Selector};
//! use std::time::Duration;
//!
//! # async fn run() {
//! let device = AdbInteractor::new().with_serial("emulator-5554");
//! device.launch_app("com.example.app", Duration::from_secs(15)).await;
//! if device.wait_for(&Selector::text("Sign in"), Duration::from_secs(5)).await {
//!     device.click(&Selector::text("Sign in")).await;
//! }
//! # }
//! ```

pub mod adb;
pub mod direct;
pub mod interactor;
pub mod logstream;
pub mod parser;
pub mod result;
pub mod screen;
pub mod selector;
pub mod wait;

pub use adb::AdbInteractor;
pub use direct::{DirectInteractor, ElementId, UiAutomation};
pub use interactor::{DeviceInteractor, SwipeDirection};
pub use logstream::LogStream;
pub use parser::ParseError;
pub use result::{Action, DeviceError, InteractionResult, RecordedStep};
pub use screen::{Bounds, NodeKind, ScreenNode};
pub use selector::Selector;
