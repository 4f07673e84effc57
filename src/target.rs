//! Locates the node that should receive typed characters.
//!
//! Native fields and contenteditable elements are used directly. Otherwise the
//! focused node's shadow tree is searched: known editor components first (the
//! whole tree, nested shadow roots included), then the first contenteditable
//! element anywhere in it.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::TypingError;

/// Nested shadow roots deeper than this below the focused host are not searched.
pub const MAX_SHADOW_DEPTH: usize = 5;

pub const EDITOR_COMPONENT_TAGS: [&str; 2] = ["prosemirror-editor", "monaco-editor"];

const TEXT_INPUT_TYPES: [&str; 7] = ["text", "search", "email", "url", "tel", "number", "password"];

/// Read-only view of a node tree with attached shadow roots.
pub trait ShadowTree {
    type Node: Copy + Eq + Hash + Debug;

    fn is_attached(&self, node: Self::Node) -> bool;
    fn tag_name(&self, node: Self::Node) -> &str;
    fn input_type(&self, node: Self::Node) -> Option<&str>;
    /// Inherited "is editable" flag.
    fn is_content_editable(&self, node: Self::Node) -> bool;
    /// Whether the node itself carries an enabling `contenteditable` attribute.
    fn has_editable_attr(&self, node: Self::Node) -> bool;
    fn shadow_root(&self, node: Self::Node) -> Option<Self::Node>;
    /// Tree-order descendants of `root`, not crossing into shadow roots.
    fn descendants(&self, root: Self::Node) -> Vec<Self::Node>;
}

impl ShadowTree for Document {
    type Node = NodeId;

    fn is_attached(&self, node: NodeId) -> bool {
        Document::is_attached(self, node)
    }

    fn tag_name(&self, node: NodeId) -> &str {
        Document::tag_name(self, node)
    }

    fn input_type(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "type")
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        Document::is_content_editable(self, node)
    }

    fn has_editable_attr(&self, node: NodeId) -> bool {
        matches!(self.content_editable_state(node), "true" | "plaintext-only")
    }

    fn shadow_root(&self, node: NodeId) -> Option<NodeId> {
        self.shadow_root_of(node)
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        Document::descendants(self, root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EditKind {
    PlainInput,
    TextArea,
    ContentEditable,
    /// Not known to be editable; only keyboard events are dispatched.
    Opaque,
}

impl EditKind {
    pub fn is_text_field(self) -> bool {
        matches!(self, EditKind::PlainInput | EditKind::TextArea)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TargetSource {
    ManualOverride,
    Focus,
    ShadowTree,
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget<N = NodeId> {
    pub node: N,
    pub kind: EditKind,
    pub source: TargetSource,
}

/// Structural classification of a single node.
pub fn classify<T: ShadowTree>(tree: &T, node: T::Node) -> Option<EditKind> {
    let tag = tree.tag_name(node);
    if tag.eq_ignore_ascii_case("input") {
        let ty = tree.input_type(node).unwrap_or("").trim();
        if ty.is_empty() || TEXT_INPUT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(ty)) {
            return Some(EditKind::PlainInput);
        }
        return None;
    }
    if tag.eq_ignore_ascii_case("textarea") {
        return Some(EditKind::TextArea);
    }
    tree.is_content_editable(node)
        .then_some(EditKind::ContentEditable)
}

pub fn resolve_target<T: ShadowTree>(
    tree: &T,
    focused: Option<T::Node>,
    manual_override: Option<T::Node>,
    force_type: bool,
) -> Result<ResolvedTarget<T::Node>, TypingError> {
    if let Some(node) = manual_override.filter(|n| tree.is_attached(*n)) {
        debug!(tag = tree.tag_name(node), "using manually picked element");
        return Ok(resolve_override(tree, node));
    }

    let Some(focused) = focused else {
        debug!("no element is focused");
        return Err(TypingError::NoTargetFound);
    };

    if let Some(kind) = classify(tree, focused) {
        debug!(tag = tree.tag_name(focused), %kind, "focused element is editable");
        return Ok(ResolvedTarget {
            node: focused,
            kind,
            source: TargetSource::Focus,
        });
    }

    if let Some(node) = find_editable_in_shadow(tree, focused) {
        debug!(host = tree.tag_name(focused), tag = tree.tag_name(node), "found editable inside shadow DOM");
        return Ok(ResolvedTarget {
            node,
            kind: EditKind::ContentEditable,
            source: TargetSource::ShadowTree,
        });
    }

    if !force_type {
        debug!(tag = tree.tag_name(focused), "focused element is not editable");
        return Err(TypingError::NoTargetFound);
    }

    debug!(tag = tree.tag_name(focused), "force type: relying on keyboard events only");
    Ok(ResolvedTarget {
        node: focused,
        kind: EditKind::Opaque,
        source: TargetSource::Forced,
    })
}

fn resolve_override<T: ShadowTree>(tree: &T, node: T::Node) -> ResolvedTarget<T::Node> {
    if let Some(kind) = classify(tree, node) {
        return ResolvedTarget {
            node,
            kind,
            source: TargetSource::ManualOverride,
        };
    }
    // clicks inside a shadow tree are retargeted to its host
    if let Some(inner) = find_editable_in_shadow(tree, node) {
        return ResolvedTarget {
            node: inner,
            kind: EditKind::ContentEditable,
            source: TargetSource::ManualOverride,
        };
    }
    ResolvedTarget {
        node,
        kind: EditKind::Opaque,
        source: TargetSource::ManualOverride,
    }
}

pub fn is_editor_component(tag: &str) -> bool {
    let tag = tag.to_ascii_lowercase();
    EDITOR_COMPONENT_TAGS.iter().any(|t| tag.contains(t))
}

/// Two-phase search of `host`'s shadow tree. An editor component anywhere in
/// the tree wins over a contenteditable that precedes it in tree order.
pub fn find_editable_in_shadow<T: ShadowTree>(tree: &T, host: T::Node) -> Option<T::Node> {
    tree.shadow_root(host)?;
    find_editor_component(tree, host, 0, &mut HashSet::new())
        .or_else(|| find_first_editable(tree, host, 0, &mut HashSet::new()))
}

fn find_editor_component<T: ShadowTree>(
    tree: &T,
    host: T::Node,
    depth: usize,
    visited: &mut HashSet<T::Node>,
) -> Option<T::Node> {
    let shadow = tree.shadow_root(host)?;
    if !visited.insert(host) {
        return None;
    }

    for child in tree.descendants(shadow) {
        let inner = tree.shadow_root(child);
        if is_editor_component(tree.tag_name(child)) {
            debug!(tag = tree.tag_name(child), depth, "found editor component");
            let editable = inner.and_then(|root| {
                tree.descendants(root)
                    .into_iter()
                    .find(|n| tree.has_editable_attr(*n))
            });
            if editable.is_some() {
                return editable;
            }
        }
        if inner.is_some() && depth < MAX_SHADOW_DEPTH {
            if let Some(found) = find_editor_component(tree, child, depth + 1, visited) {
                return Some(found);
            }
        }
    }
    None
}

fn find_first_editable<T: ShadowTree>(
    tree: &T,
    host: T::Node,
    depth: usize,
    visited: &mut HashSet<T::Node>,
) -> Option<T::Node> {
    let shadow = tree.shadow_root(host)?;
    if !visited.insert(host) {
        return None;
    }

    for child in tree.descendants(shadow) {
        if tree.has_editable_attr(child) {
            return Some(child);
        }
        if tree.shadow_root(child).is_some() && depth < MAX_SHADOW_DEPTH {
            if let Some(found) = find_first_editable(tree, child, depth + 1, visited) {
                return Some(found);
            }
        }
    }
    None
}
