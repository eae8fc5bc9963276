//! UI snapshot tree: nodes, bounds, and classification.
//!
//! A [`ScreenNode`] tree is one immutable snapshot of the device UI,
//! produced fresh on every dump and discarded after use. Nodes own their
//! children; there are no back-references and no sharing across snapshots,
//! so every query call sees a consistent, point-in-time view.

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// A device-pixel rectangle from a hierarchy dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Horizontal center, integer division.
    pub fn center_x(&self) -> i32 {
        (self.left + self.right) / 2
    }

    /// Vertical center, integer division.
    pub fn center_y(&self) -> i32 {
        (self.top + self.bottom) / 2
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Semantic classification of a node, derived from its class name and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Button,
    Text,
    TextField,
    Image,
    Checkbox,
    Switch,
    Scrollable,
    Clickable,
    Container,
    Unknown,
}

impl NodeKind {
    /// Classify a node from its lower-cased class name and behavior flags.
    ///
    /// Rules are ordered; the first match wins:
    ///
    /// 1. `button` substring → Button
    /// 2. `edittext`/`textfield` suffix → TextField
    /// 3. `checkbox` substring → Checkbox
    /// 4. `switch`/`toggle` substring → Switch
    /// 5. `imageview`/`image` substring → Image
    /// 6. `textview` suffix → Text
    /// 7. scrollable flag → Scrollable
    /// 8. clickable flag → Clickable
    /// 9. `layout`/`view`/`frame`/`group` substring → Container
    /// 10. otherwise → Unknown
    pub fn from_class(class_name: &str, clickable: bool, scrollable: bool) -> Self {
        let lower = class_name.to_lowercase();
        if lower.contains("button") {
            NodeKind::Button
        } else if lower.ends_with("edittext") || lower.ends_with("textfield") {
            NodeKind::TextField
        } else if lower.contains("checkbox") {
            NodeKind::Checkbox
        } else if lower.contains("switch") || lower.contains("toggle") {
            NodeKind::Switch
        } else if lower.contains("imageview") || lower.contains("image") {
            NodeKind::Image
        } else if lower.ends_with("textview") {
            NodeKind::Text
        } else if scrollable {
            NodeKind::Scrollable
        } else if clickable {
            NodeKind::Clickable
        } else if lower.contains("layout")
            || lower.contains("view")
            || lower.contains("frame")
            || lower.contains("group")
        {
            NodeKind::Container
        } else {
            NodeKind::Unknown
        }
    }
}

/// One node of a UI snapshot tree.
///
/// Blank string attributes are normalized to `None` at parse time, so any
/// `Some` value here is non-empty. `depth` is 0 for the root and grows by
/// one per child level; children are in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenNode {
    pub class_name: String,
    pub kind: NodeKind,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
    pub clickable: bool,
    pub scrollable: bool,
    pub checkable: bool,
    pub checked: bool,
    pub enabled: bool,
    pub focusable: bool,
    pub bounds: Option<Bounds>,
    pub children: Vec<ScreenNode>,
    pub depth: usize,
}

impl ScreenNode {
    /// Synthetic empty container root.
    ///
    /// Returned when a dump yields no nodes and as the degraded result of a
    /// failed dump, so callers always have a safe tree to query.
    pub fn empty_root() -> Self {
        Self {
            class_name: String::new(),
            kind: NodeKind::Container,
            resource_id: None,
            text: None,
            description: None,
            clickable: false,
            scrollable: false,
            checkable: false,
            checked: false,
            enabled: true,
            focusable: false,
            bounds: None,
            children: Vec::new(),
            depth: 0,
        }
    }

    /// First non-blank of text, description, resource id, else class name.
    ///
    /// For diagnostics only; matching never goes through this.
    pub fn display_name(&self) -> &str {
        self.text
            .as_deref()
            .or(self.description.as_deref())
            .or(self.resource_id.as_deref())
            .unwrap_or(&self.class_name)
    }

    /// Pre-order sequence of this node and all descendants.
    pub fn flatten(&self) -> Vec<&ScreenNode> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ScreenNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }

    /// All nodes satisfying `predicate`, in pre-order.
    pub fn find<P>(&self, predicate: P) -> Vec<&ScreenNode>
    where
        P: Fn(&ScreenNode) -> bool,
    {
        self.flatten().into_iter().filter(|n| predicate(n)).collect()
    }

    /// First node matching `selector` in pre-order.
    pub fn find_first(&self, selector: &Selector) -> Option<&ScreenNode> {
        self.flatten().into_iter().find(|n| selector.matches(n))
    }

    /// Whether any node in the tree matches `selector`.
    pub fn contains(&self, selector: &Selector) -> bool {
        self.find_first(selector).is_some()
    }

    pub fn find_by_resource_id(&self, id: &str) -> Vec<&ScreenNode> {
        self.find(|n| n.resource_id.as_deref().is_some_and(|r| r.contains(id)))
    }

    /// `contains = false` requires an exact text match; `true` matches a
    /// case-insensitive substring.
    pub fn find_by_text(&self, text: &str, contains: bool) -> Vec<&ScreenNode> {
        let needle = text.to_lowercase();
        self.find(|n| match n.text.as_deref() {
            Some(t) if contains => t.to_lowercase().contains(&needle),
            Some(t) => t == text,
            None => false,
        })
    }

    pub fn find_by_description(&self, desc: &str, contains: bool) -> Vec<&ScreenNode> {
        let needle = desc.to_lowercase();
        self.find(|n| match n.description.as_deref() {
            Some(d) if contains => d.to_lowercase().contains(&needle),
            Some(d) => d == desc,
            None => false,
        })
    }

    pub fn find_by_kind(&self, kind: NodeKind) -> Vec<&ScreenNode> {
        self.find(|n| n.kind == kind)
    }

    pub fn find_clickable(&self) -> Vec<&ScreenNode> {
        self.find(|n| n.clickable)
    }

    pub fn find_scrollable(&self) -> Vec<&ScreenNode> {
        self.find(|n| n.scrollable)
    }

    /// The most specific selector that re-locates this node.
    ///
    /// Priority: resource id, then text, then description, then class name.
    pub fn to_selector(&self) -> Selector {
        if let Some(id) = self.resource_id.as_deref() {
            Selector::resource_id(id)
        } else if let Some(text) = self.text.as_deref() {
            Selector::text(text)
        } else if let Some(desc) = self.description.as_deref() {
            Selector::description(desc)
        } else {
            Selector::class_name(&self.class_name)
        }
    }

    /// Indented one-line-per-node rendering for humans and agents.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.pretty_print_into(&mut out, 0);
        out
    }

    fn pretty_print_into(&self, out: &mut String, indent: usize) {
        let mut info: Vec<String> = vec![self.class_name.clone()];
        if let Some(text) = &self.text {
            info.push(format!("text=\"{}\"", text));
        }
        if let Some(desc) = &self.description {
            info.push(format!("desc=\"{}\"", desc));
        }
        if let Some(id) = &self.resource_id {
            info.push(format!("id=\"{}\"", id));
        }
        if self.clickable {
            info.push("clickable".into());
        }
        if self.scrollable {
            info.push("scrollable".into());
        }
        if self.checkable {
            info.push("checkable".into());
        }
        if self.checked {
            info.push("checked".into());
        }
        if let Some(b) = &self.bounds {
            info.push(format!("bounds=[{},{}][{},{}]", b.left, b.top, b.right, b.bottom));
        }
        out.push_str(&"  ".repeat(indent));
        out.push_str(&info.join(" | "));
        out.push('\n');
        for child in &self.children {
            child.pretty_print_into(out, indent + 1);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a bare node and let the test customize the fields it cares about.
    pub(crate) fn node_with(customize: impl FnOnce(&mut ScreenNode)) -> ScreenNode {
        let mut node = ScreenNode::empty_root();
        customize(&mut node);
        node
    }

    fn tree() -> ScreenNode {
        // root
        // ├── a (button "OK", id ok_btn)
        // │   └── b (textview "Hello")
        // └── c (scrollable list)
        node_with(|root| {
            root.class_name = "android.widget.FrameLayout".into();
            root.kind = NodeKind::Container;
            root.children = vec![
                node_with(|a| {
                    a.class_name = "android.widget.Button".into();
                    a.kind = NodeKind::Button;
                    a.text = Some("OK".into());
                    a.resource_id = Some("com.example:id/ok_btn".into());
                    a.clickable = true;
                    a.depth = 1;
                    a.children = vec![node_with(|b| {
                        b.class_name = "android.widget.TextView".into();
                        b.kind = NodeKind::Text;
                        b.text = Some("Hello".into());
                        b.depth = 2;
                    })];
                }),
                node_with(|c| {
                    c.class_name = "androidx.recyclerview.widget.RecyclerView".into();
                    c.kind = NodeKind::Scrollable;
                    c.scrollable = true;
                    c.depth = 1;
                }),
            ];
        })
    }

    #[test]
    fn bounds_center_uses_integer_division() {
        let b = Bounds::new(10, 20, 110, 70);
        assert_eq!(b.center_x(), 60);
        assert_eq!(b.center_y(), 45);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
    }

    #[test]
    fn classification_rules_in_priority_order() {
        use NodeKind::*;
        assert_eq!(NodeKind::from_class("android.widget.Button", false, false), Button);
        // "button" beats the clickable flag
        assert_eq!(NodeKind::from_class("my.ImageButton", true, false), Button);
        assert_eq!(NodeKind::from_class("android.widget.EditText", false, false), TextField);
        assert_eq!(NodeKind::from_class("compose.ui.TextField", false, false), TextField);
        assert_eq!(NodeKind::from_class("android.widget.CheckBox", false, false), Checkbox);
        assert_eq!(NodeKind::from_class("android.widget.Switch", false, false), Switch);
        assert_eq!(NodeKind::from_class("my.ToggleView", false, false), Switch);
        assert_eq!(NodeKind::from_class("android.widget.ImageView", false, false), Image);
        assert_eq!(NodeKind::from_class("android.widget.TextView", false, false), Text);
        assert_eq!(NodeKind::from_class("x.Widget", false, true), Scrollable);
        assert_eq!(NodeKind::from_class("x.Widget", true, false), Clickable);
        assert_eq!(NodeKind::from_class("android.widget.LinearLayout", false, false), Container);
        assert_eq!(NodeKind::from_class("android.view.View", false, false), Container);
        assert_eq!(NodeKind::from_class("x.Widget", false, false), Unknown);
    }

    #[test]
    fn flatten_is_stable_preorder() {
        let root = tree();
        let flat = root.flatten();
        assert_eq!(flat.len(), 4);
        let names: Vec<&str> = flat.iter().map(|n| n.class_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "android.widget.FrameLayout",
                "android.widget.Button",
                "android.widget.TextView",
                "androidx.recyclerview.widget.RecyclerView",
            ]
        );
        // Same order on a repeated call over the same immutable tree.
        let again: Vec<&str> = root.flatten().iter().map(|n| n.class_name.as_str()).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn find_helpers() {
        let root = tree();
        assert_eq!(root.find_by_resource_id("ok_btn").len(), 1);
        assert_eq!(root.find_by_text("OK", false).len(), 1);
        assert_eq!(root.find_by_text("ok", false).len(), 0);
        assert_eq!(root.find_by_text("hell", true).len(), 1);
        assert_eq!(root.find_by_kind(NodeKind::Button).len(), 1);
        assert_eq!(root.find_clickable().len(), 1);
        assert_eq!(root.find_scrollable().len(), 1);
        assert!(root.contains(&Selector::text("OK")));
        assert!(!root.contains(&Selector::text("Cancel")));
    }

    #[test]
    fn find_first_returns_preorder_winner() {
        let mut root = tree();
        // Two text matches; the button ("OK") sits before its child in pre-order.
        root.children[0].children[0].text = Some("OK".into());
        let hit = root.find_first(&Selector::text("OK")).unwrap();
        assert_eq!(hit.class_name, "android.widget.Button");
    }

    #[test]
    fn to_selector_priority() {
        let root = tree();
        let button = &root.children[0];
        assert_eq!(
            button.to_selector(),
            Selector::resource_id("com.example:id/ok_btn")
        );
        let textview = &button.children[0];
        assert_eq!(textview.to_selector(), Selector::text("Hello"));
        let list = &root.children[1];
        assert_eq!(
            list.to_selector(),
            Selector::class_name("androidx.recyclerview.widget.RecyclerView")
        );
        let described = node_with(|n| {
            n.class_name = "android.widget.ImageView".into();
            n.description = Some("Avatar".into());
        });
        assert_eq!(described.to_selector(), Selector::description("Avatar"));
    }

    #[test]
    fn to_selector_is_reflexive() {
        for node in tree().flatten() {
            assert!(
                node.to_selector().matches(node),
                "node {:?} does not match its own selector",
                node.display_name()
            );
        }
    }

    #[test]
    fn display_name_fallback_chain() {
        let node = node_with(|n| {
            n.class_name = "C".into();
            n.text = Some("t".into());
            n.description = Some("d".into());
            n.resource_id = Some("r".into());
        });
        assert_eq!(node.display_name(), "t");
        let node = node_with(|n| {
            n.class_name = "C".into();
            n.description = Some("d".into());
        });
        assert_eq!(node.display_name(), "d");
        let node = node_with(|n| {
            n.class_name = "C".into();
            n.resource_id = Some("r".into());
        });
        assert_eq!(node.display_name(), "r");
        let node = node_with(|n| n.class_name = "C".into());
        assert_eq!(node.display_name(), "C");
    }

    #[test]
    fn pretty_print_indents_children() {
        let out = tree().pretty_print();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("android.widget.FrameLayout"));
        assert!(lines[1].starts_with("  android.widget.Button"));
        assert!(lines[1].contains("text=\"OK\""));
        assert!(lines[2].starts_with("    android.widget.TextView"));
    }
}
