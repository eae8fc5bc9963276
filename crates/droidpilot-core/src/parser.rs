//! Parser for uiautomator hierarchy dumps.
//!
//! A dump is an XML document of nested `<node>` elements, each carrying the
//! attribute set produced by `uiautomator dump`. The parser walks the event
//! stream and rebuilds the tree as [`ScreenNode`]s, preserving document
//! order and depth. Wrapper elements that are not named `node` (such as the
//! outer `<hierarchy>`) contribute nothing to depth.
//!
//! Attribute rules:
//! - booleans are `true` only for the literal string `"true"`, except
//!   `enabled`, which is true unless the value is exactly `"false"`
//! - blank string attributes become `None`
//! - a `bounds` value that does not match `[l,t][r,b]` yields `None` bounds;
//!   the node itself is still created

use std::sync::OnceLock;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

use crate::screen::{Bounds, NodeKind, ScreenNode};

/// A dump that could not be tokenized at all.
///
/// Note this is deliberately narrow: a dump with zero `<node>` elements is
/// not an error, it parses to the synthetic empty root.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed hierarchy dump: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("malformed attribute in hierarchy dump: {0}")]
    Attribute(#[from] AttrError),
}

fn bounds_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+),(\d+)\]\[(\d+),(\d+)\]").unwrap())
}

/// Parse a hierarchy dump into a snapshot tree.
///
/// A single top-level `<node>` becomes the root directly; zero or several
/// top-level nodes are wrapped in a synthetic container root at depth 0.
pub fn parse(xml: &str) -> Result<ScreenNode, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<ScreenNode> = Vec::new();
    let mut roots: Vec<ScreenNode> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == b"node" => {
                let node = parse_node(e, stack.len())?;
                stack.push(node);
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"node" => {
                let node = parse_node(e, stack.len())?;
                attach(&mut stack, &mut roots, node);
            }
            Event::End(ref e) if e.local_name().as_ref() == b"node" => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut roots, node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unclosed <node> elements at EOF still belong somewhere; fold them in
    // deepest-first so partial dumps keep their structure.
    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut roots, node);
    }

    if roots.len() == 1 {
        Ok(roots.remove(0))
    } else {
        let mut root = ScreenNode::empty_root();
        root.children = roots;
        Ok(root)
    }
}

fn attach(stack: &mut [ScreenNode], roots: &mut Vec<ScreenNode>, node: ScreenNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn parse_node(element: &BytesStart<'_>, depth: usize) -> Result<ScreenNode, ParseError> {
    let mut class_name = String::new();
    let mut resource_id = None;
    let mut text = None;
    let mut description = None;
    let mut clickable = false;
    let mut scrollable = false;
    let mut checkable = false;
    let mut checked = false;
    let mut enabled = true;
    let mut focusable = false;
    let mut bounds = None;

    for attr in element.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"class" => class_name = value.into_owned(),
            b"resource-id" => resource_id = blank_to_none(&value),
            b"text" => text = blank_to_none(&value),
            b"content-desc" => description = blank_to_none(&value),
            b"clickable" => clickable = value == "true",
            b"scrollable" => scrollable = value == "true",
            b"checkable" => checkable = value == "true",
            b"checked" => checked = value == "true",
            b"enabled" => enabled = value != "false",
            b"focusable" => focusable = value == "true",
            b"bounds" => bounds = parse_bounds(&value),
            _ => {}
        }
    }

    Ok(ScreenNode {
        kind: NodeKind::from_class(&class_name, clickable, scrollable),
        class_name,
        resource_id,
        text,
        description,
        clickable,
        scrollable,
        checkable,
        checked,
        enabled,
        focusable,
        bounds,
        children: Vec::new(),
        depth,
    })
}

fn blank_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bounds(value: &str) -> Option<Bounds> {
    let caps = bounds_pattern().captures(value)?;
    // The pattern only admits digit runs; overflow on absurd input maps to None.
    let coord = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
    Some(Bounds::new(coord(1)?, coord(2)?, coord(3)?, coord(4)?))
}
