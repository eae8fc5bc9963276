//! Interaction outcomes and the device error taxonomy.
//!
//! "Element not found" is data, not a fault: automation scripts branch on
//! [`InteractionResult`] variants instead of catching errors. Only genuine
//! transport trouble (a failed adb invocation, a dead handle, an exhausted
//! deadline) surfaces through [`DeviceError`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParseError;
use crate::selector::Selector;

/// Faults below the interaction layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A device-channel command failed (nonzero exit, I/O fault, dead handle).
    #[error("{command}: {detail}")]
    Transport { command: String, detail: String },
    /// A bounded wait exhausted its deadline. Distinct from "not found":
    /// the condition was checked repeatedly before giving up.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// A hierarchy dump could not be tokenized.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl DeviceError {
    pub fn transport(command: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Transport {
            command: command.into(),
            detail: detail.to_string(),
        }
    }
}

/// Outcome of one selector-based interaction.
///
/// Exactly one variant per call. `Success` carries a human-readable
/// description only; callers branch on the variant, never on message text.
#[derive(Debug)]
pub enum InteractionResult {
    Success(String),
    ElementNotFound(Selector),
    Error(DeviceError),
}

impl InteractionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Serialized as a tagged object so tool-exposure layers can render
/// outcomes. The `Error` variant flattens its cause to a message; the
/// structured `DeviceError` stays a library-side type.
impl Serialize for InteractionResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            Self::Success(message) => {
                let mut s = serializer.serialize_struct("InteractionResult", 2)?;
                s.serialize_field("outcome", "success")?;
                s.serialize_field("message", message)?;
                s.end()
            }
            Self::ElementNotFound(selector) => {
                let mut s = serializer.serialize_struct("InteractionResult", 2)?;
                s.serialize_field("outcome", "not_found")?;
                s.serialize_field("selector", selector)?;
                s.end()
            }
            Self::Error(cause) => {
                let mut s = serializer.serialize_struct("InteractionResult", 2)?;
                s.serialize_field("outcome", "error")?;
                s.serialize_field("message", &cause.to_string())?;
                s.end()
            }
        }
    }
}

impl fmt::Display for InteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(message) => write!(f, "ok: {}", message),
            Self::ElementNotFound(selector) => write!(f, "not found: {}", selector),
            Self::Error(cause) => write!(f, "error: {}", cause),
        }
    }
}

/// What an interaction did, for replay and logging consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    LaunchApp,
    StopApp,
    Click,
    LongClick,
    TypeText,
    ClearAndType,
    Swipe,
    ScrollUntilFound,
    PressKey,
    WaitFor,
    InputText,
}

/// One recorded automation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStep {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    pub success: bool,
    pub elapsed_ms: u64,
}

impl RecordedStep {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            selector: None,
            params: BTreeMap::new(),
            success: true,
            elapsed_ms: 0,
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn finished(mut self, success: bool, elapsed_ms: u64) -> Self {
        self.success = success;
        self.elapsed_ms = elapsed_ms;
        self
    }
}
