//! Declarative element selectors.
//!
//! A [`Selector`] describes how to locate one UI element on screen by an
//! identity attribute. Matching is purely structural (attribute comparison
//! against a [`ScreenNode`]); there is no pixel-based recognition.
//!
//! Matching rules per variant:
//!
//! | Variant | Attribute | Rule |
//! |---------|-----------|------|
//! | `ResourceId` | resource-id | substring |
//! | `Text` | text | exact, or case-insensitive substring |
//! | `ClassName` | class | exact |
//! | `Description` | content-desc | exact |
//!
//! A node missing the relevant attribute never matches.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::screen::ScreenNode;

/// A criterion for locating a UI element.
///
/// Exactly one discriminant is active per instance. When several nodes
/// match, interactions always use the first match in pre-order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Selector {
    /// Substring match against the node's resource-id.
    ResourceId { id: String },
    /// Match against visible text, exact or case-insensitive substring.
    Text { text: String, exact: bool },
    /// Exact match against the node's class name.
    ClassName { class_name: String },
    /// Exact match against the accessibility description.
    Description { description: String },
}

impl Selector {
    pub fn resource_id(id: impl Into<String>) -> Self {
        Self::ResourceId { id: id.into() }
    }

    /// Exact text match.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Case-insensitive substring text match.
    pub fn text_contains(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    pub fn class_name(class_name: impl Into<String>) -> Self {
        Self::ClassName {
            class_name: class_name.into(),
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self::Description {
            description: description.into(),
        }
    }

    /// Whether `node` satisfies this selector.
    ///
    /// Total over any node: a missing attribute is a non-match, never a panic.
    pub fn matches(&self, node: &ScreenNode) -> bool {
        match self {
            Selector::ResourceId { id } => node
                .resource_id
                .as_deref()
                .is_some_and(|rid| rid.contains(id.as_str())),
            Selector::Text { text, exact } => match node.text.as_deref() {
                Some(node_text) if *exact => node_text == text,
                Some(node_text) => node_text.to_lowercase().contains(&text.to_lowercase()),
                None => false,
            },
            Selector::ClassName { class_name } => node.class_name == *class_name,
            Selector::Description { description } => {
                node.description.as_deref() == Some(description.as_str())
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::ResourceId { id } => write!(f, "id~\"{}\"", id),
            Selector::Text { text, exact: true } => write!(f, "text=\"{}\"", text),
            Selector::Text { text, exact: false } => write!(f, "text~\"{}\"", text),
            Selector::ClassName { class_name } => write!(f, "class=\"{}\"", class_name),
            Selector::Description { description } => write!(f, "desc=\"{}\"", description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::tests::node_with;

    #[test]
    fn resource_id_matches_substring() {
        let node = node_with(|n| n.resource_id = Some("com.example:id/login_button".into()));
        assert!(Selector::resource_id("login_button").matches(&node));
        assert!(Selector::resource_id("login").matches(&node));
        assert!(!Selector::resource_id("logout").matches(&node));
    }

    #[test]
    fn text_exact_is_case_sensitive() {
        let node = node_with(|n| n.text = Some("Submit".into()));
        assert!(Selector::text("Submit").matches(&node));
        assert!(!Selector::text("submit").matches(&node));
        assert!(!Selector::text("Sub").matches(&node));
    }

    #[test]
    fn text_contains_is_case_insensitive() {
        let node = node_with(|n| n.text = Some("Submit Order".into()));
        assert!(Selector::text_contains("submit").matches(&node));
        assert!(Selector::text_contains("ORDER").matches(&node));
        assert!(!Selector::text_contains("cancel").matches(&node));
    }

    #[test]
    fn class_name_is_exact() {
        let node = node_with(|n| n.class_name = "android.widget.Button".into());
        assert!(Selector::class_name("android.widget.Button").matches(&node));
        assert!(!Selector::class_name("Button").matches(&node));
    }

    #[test]
    fn description_is_exact() {
        let node = node_with(|n| n.description = Some("Navigate up".into()));
        assert!(Selector::description("Navigate up").matches(&node));
        assert!(!Selector::description("Navigate").matches(&node));
    }

    #[test]
    fn missing_attributes_never_match() {
        let node = node_with(|_| {});
        assert!(!Selector::resource_id("anything").matches(&node));
        assert!(!Selector::text("anything").matches(&node));
        assert!(!Selector::text_contains("anything").matches(&node));
        assert!(!Selector::description("anything").matches(&node));
    }

    #[test]
    fn display_names_each_variant() {
        assert_eq!(Selector::resource_id("ok").to_string(), "id~\"ok\"");
        assert_eq!(Selector::text("OK").to_string(), "text=\"OK\"");
        assert_eq!(Selector::text_contains("ok").to_string(), "text~\"ok\"");
        assert_eq!(Selector::class_name("C").to_string(), "class=\"C\"");
        assert_eq!(Selector::description("d").to_string(), "desc=\"d\"");
    }

    #[test]
    fn serializes_with_tag() {
        let json = serde_json::to_string(&Selector::text("OK")).unwrap();
        assert!(json.contains("\"by\":\"text\""));
        assert!(json.contains("\"exact\":true"));
    }
}
