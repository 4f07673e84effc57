//! In-memory page model: an arena of nodes with attached shadow roots, focus,
//! per-root selections and the editing primitives the typing engine drives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::editing::{self, char_len};
use crate::keys::{KeyPhase, KeyStroke};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not attached to the document")]
    Detached(NodeId),
    #[error("node {0:?} is not a text field")]
    NotTextField(NodeId),
    #[error("node {0:?} already hosts a shadow root")]
    ShadowRootExists(NodeId),
    #[error("no selection in root {0:?}")]
    NoSelection(NodeId),
}

pub type SharedDocument = Arc<Mutex<Document>>;

pub const EVENT_LOG_CAPACITY: usize = 4096;

pub fn shared(doc: Document) -> SharedDocument {
    Arc::new(Mutex::new(doc))
}

/// Locks the page. A panicked session must not take the page down with it.
pub fn lock_document(doc: &SharedDocument) -> MutexGuard<'_, Document> {
    doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Value and selection state of an `<input>` or `<textarea>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
}

/// A range inside the text content of a single editable container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub container: NodeId,
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn collapsed(container: NodeId, offset: usize) -> Self {
        Self {
            container,
            start: offset,
            end: offset,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum InputType {
    #[strum(serialize = "insertText")]
    InsertText,
    #[strum(serialize = "insertLineBreak")]
    InsertLineBreak,
    #[strum(serialize = "deleteContentBackward")]
    DeleteContentBackward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    Key {
        target: NodeId,
        phase: KeyPhase,
        stroke: KeyStroke,
    },
    Input {
        target: NodeId,
        input_type: InputType,
        data: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    attrs: HashMap<String, String>,
    shadow_root: Option<NodeId>,
    field: Option<TextField>,
    text: String,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    ShadowRoot { host: NodeId },
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    focused: Option<NodeId>,
    selections: HashMap<NodeId, TextRange>,
    events: Vec<DomEvent>,
    exec_command_enabled: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            focused: None,
            selections: HashMap::new(),
            events: Vec::new(),
            exec_command_enabled: true,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached element. Tag names are stored upper-cased, as the
    /// DOM reports them.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag_name = tag.to_ascii_uppercase();
        let field = matches!(tag_name.as_str(), "INPUT" | "TEXTAREA").then(TextField::default);
        self.push(Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(Element {
                tag_name,
                attrs: HashMap::new(),
                shadow_root: None,
                field,
                text: String::new(),
            }),
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        self.node(child)?;
        self.remove(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Detaches `node` (and its subtree) from its parent.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
    }

    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DomError> {
        match self.element(host) {
            None => return Err(DomError::UnknownNode(host)),
            Some(el) if el.shadow_root.is_some() => return Err(DomError::ShadowRootExists(host)),
            Some(_) => {}
        }
        let shadow = self.push(Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::ShadowRoot { host },
        });
        if let Some(el) = self.element_mut(host) {
            el.shadow_root = Some(shadow);
        }
        Ok(shadow)
    }

    pub fn shadow_root_of(&self, host: NodeId) -> Option<NodeId> {
        self.element(host)?.shadow_root
    }

    pub fn host_of(&self, shadow: NodeId) -> Option<NodeId> {
        match self.nodes.get(shadow.0)?.kind {
            NodeKind::ShadowRoot { host } => Some(host),
            _ => None,
        }
    }

    /// Topmost ancestor within the node's own tree: the document, a shadow
    /// root, or the top of a detached subtree.
    pub fn root_node(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.nodes.get(current.0).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if self.nodes.get(current.0).is_none() {
                return false;
            }
            let top = self.root_node(current);
            if top == self.root {
                return true;
            }
            match self.host_of(top) {
                Some(host) => current = host,
                None => return false,
            }
        }
    }

    /// Root whose selection governs editing inside `node`.
    pub fn selection_root(&self, node: NodeId) -> NodeId {
        let top = self.root_node(node);
        if top == self.root || self.host_of(top).is_some() {
            top
        } else {
            self.root
        }
    }

    pub fn tag_name(&self, node: NodeId) -> &str {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => &el.tag_name,
            Some(NodeKind::ShadowRoot { .. }) => "#shadow-root",
            Some(NodeKind::Document) => "#document",
            None => "",
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Children in tree order, depth-first, without entering shadow roots.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(root.0)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(id.0) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Inherited editability: the nearest `contenteditable` attribute in the
    /// node's own tree decides.
    pub fn is_content_editable(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(value) = self.attribute(id, "contenteditable") {
                match value.to_ascii_lowercase().as_str() {
                    "true" | "" | "plaintext-only" => return true,
                    "false" => return false,
                    _ => {}
                }
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// The `contentEditable` IDL value: `"true"`, `"false"` or `"inherit"`.
    pub fn content_editable_state(&self, node: NodeId) -> &'static str {
        match self
            .attribute(node, "contenteditable")
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("true") | Some("") => "true",
            Some("plaintext-only") => "plaintext-only",
            Some("false") => "false",
            _ => "inherit",
        }
    }

    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// The focused node as seen from the document: focus inside a shadow tree
    /// is retargeted to the outermost host.
    pub fn active_element(&self) -> Option<NodeId> {
        let mut current = self.focused?;
        if !self.is_attached(current) {
            return None;
        }
        while let Some(host) = self.host_of(self.root_node(current)) {
            current = host;
        }
        Some(current)
    }

    pub fn focused_node(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn text_content(&self, node: NodeId) -> &str {
        self.element(node).map_or("", |el| el.text.as_str())
    }

    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if let Some(el) = self.element_mut(node) {
            el.text = text.to_string();
        }
    }

    pub fn field(&self, node: NodeId) -> Option<&TextField> {
        self.element(node)?.field.as_ref()
    }

    fn field_mut(&mut self, node: NodeId) -> Result<&mut TextField, DomError> {
        if self.nodes.get(node.0).is_none() {
            return Err(DomError::UnknownNode(node));
        }
        self.element_mut(node)
            .and_then(|el| el.field.as_mut())
            .ok_or(DomError::NotTextField(node))
    }

    /// Assigning `value` moves the caret to the end, as browsers do.
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        let field = self.field_mut(node)?;
        field.value = value.to_string();
        field.selection_start = char_len(value);
        field.selection_end = field.selection_start;
        Ok(())
    }

    pub fn set_selection_range(&mut self, node: NodeId, start: usize, end: usize) -> Result<(), DomError> {
        let field = self.field_mut(node)?;
        let (start, end) = editing::clamp_range(&field.value, start, end);
        field.selection_start = start;
        field.selection_end = end;
        Ok(())
    }

    /// Splices `text` over the field's selection and collapses the caret after it.
    pub fn insert_into_field(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.ensure_attached(node)?;
        let field = self.field_mut(node)?;
        let (value, caret) = editing::splice(&field.value, field.selection_start, field.selection_end, text);
        field.value = value;
        field.selection_start = caret;
        field.selection_end = caret;
        Ok(())
    }

    /// Backspace inside a field. Returns whether anything was removed.
    pub fn delete_backward_in_field(&mut self, node: NodeId) -> Result<bool, DomError> {
        self.ensure_attached(node)?;
        let field = self.field_mut(node)?;
        match editing::delete_backward(&field.value, field.selection_start, field.selection_end) {
            Some((value, caret)) => {
                field.value = value;
                field.selection_start = caret;
                field.selection_end = caret;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_attached(&self, node: NodeId) -> Result<(), DomError> {
        self.node(node)?;
        if self.is_attached(node) {
            Ok(())
        } else {
            Err(DomError::Detached(node))
        }
    }

    pub fn selection(&self, root: NodeId) -> Option<TextRange> {
        self.selections.get(&root).copied()
    }

    pub fn set_selection(&mut self, root: NodeId, range: Option<TextRange>) {
        match range {
            Some(range) => {
                let text = self.text_content(range.container);
                let (start, end) = editing::clamp_range(text, range.start, range.end);
                self.selections.insert(
                    root,
                    TextRange {
                        container: range.container,
                        start,
                        end,
                    },
                );
            }
            None => {
                self.selections.remove(&root);
            }
        }
    }

    /// Whether `document.execCommand` style editing succeeds. Pages (and
    /// tests) can disable it to force the manual insertion path.
    pub fn set_exec_command_enabled(&mut self, enabled: bool) {
        self.exec_command_enabled = enabled;
    }

    fn editable_range(&self, root: NodeId) -> Option<TextRange> {
        let range = self.selection(root)?;
        (self.is_attached(range.container) && self.is_content_editable(range.container)).then_some(range)
    }

    fn replace_range(&mut self, root: NodeId, range: TextRange, text: &str) {
        let current = self.text_content(range.container).to_string();
        let (updated, caret) = editing::splice(&current, range.start, range.end, text);
        self.set_text_content(range.container, &updated);
        self.selections
            .insert(root, TextRange::collapsed(range.container, caret));
    }

    /// The platform text-insertion primitive. `Ok(false)` mirrors a refused
    /// `execCommand('insertText')`.
    pub fn exec_insert_text(&mut self, root: NodeId, text: &str) -> Result<bool, DomError> {
        self.exec_insert(root, text, InputType::InsertText)
    }

    pub fn exec_insert_line_break(&mut self, root: NodeId) -> Result<bool, DomError> {
        self.exec_insert(root, "\n", InputType::InsertLineBreak)
    }

    fn exec_insert(&mut self, root: NodeId, text: &str, input_type: InputType) -> Result<bool, DomError> {
        self.node(root)?;
        if !self.exec_command_enabled {
            return Ok(false);
        }
        let Some(range) = self.editable_range(root) else {
            return Ok(false);
        };
        self.replace_range(root, range, text);
        let data = (input_type == InputType::InsertText).then(|| text.to_string());
        self.dispatch(DomEvent::Input {
            target: range.container,
            input_type,
            data,
        });
        Ok(true)
    }

    /// `execCommand('delete')`: removes the selection, or the character before
    /// a collapsed caret.
    pub fn exec_delete(&mut self, root: NodeId) -> Result<bool, DomError> {
        self.node(root)?;
        if !self.exec_command_enabled {
            return Ok(false);
        }
        let Some(range) = self.editable_range(root) else {
            return Ok(false);
        };
        if self.delete_range_backward(root, range) {
            self.dispatch(DomEvent::Input {
                target: range.container,
                input_type: InputType::DeleteContentBackward,
                data: None,
            });
        }
        Ok(true)
    }

    /// Manual fallback for a refused delete: removes the selection or the
    /// character before the caret. Returns whether anything was removed.
    /// Dispatches nothing.
    pub fn delete_text_backward(&mut self, root: NodeId) -> Result<bool, DomError> {
        let range = self.selection(root).ok_or(DomError::NoSelection(root))?;
        self.ensure_attached(range.container)?;
        Ok(self.delete_range_backward(root, range))
    }

    fn delete_range_backward(&mut self, root: NodeId, range: TextRange) -> bool {
        let current = self.text_content(range.container).to_string();
        let Some((updated, caret)) = editing::delete_backward(&current, range.start, range.end) else {
            return false;
        };
        self.set_text_content(range.container, &updated);
        self.selections
            .insert(root, TextRange::collapsed(range.container, caret));
        true
    }

    /// Manual fallback: inserts a text node at the selection and moves the
    /// range after it. Dispatches nothing.
    pub fn insert_text_node(&mut self, root: NodeId, text: &str) -> Result<(), DomError> {
        let range = self.selection(root).ok_or(DomError::NoSelection(root))?;
        self.ensure_attached(range.container)?;
        self.replace_range(root, range, text);
        Ok(())
    }

    /// Appends to the event log. Once the log holds `EVENT_LOG_CAPACITY`
    /// events the older half is dropped.
    pub fn dispatch(&mut self, event: DomEvent) {
        if self.events.len() >= EVENT_LOG_CAPACITY {
            self.events.drain(..EVENT_LOG_CAPACITY / 2);
        }
        self.events.push(event);
    }

    pub fn dispatch_key_stroke(&mut self, target: NodeId, stroke: &KeyStroke) {
        for phase in crate::keys::KEY_SEQUENCE {
            self.dispatch(DomEvent::Key {
                target,
                phase,
                stroke: stroke.clone(),
            });
        }
    }

    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Short human-readable description, e.g. `<INPUT> id="q"`.
    pub fn describe(&self, node: NodeId) -> String {
        let mut out = format!("<{}>", self.tag_name(node));
        if let Some(id) = self.attribute(node, "id").filter(|v| !v.is_empty()) {
            out.push_str(&format!(" id=\"{id}\""));
        }
        if let Some(class) = self.attribute(node, "class").filter(|v| !v.is_empty()) {
            out.push_str(&format!(" class=\"{class}\""));
        }
        out
    }
}
