//! Click-to-select of the element that should receive typed text.

use tracing::debug;

use crate::dom::{Document, NodeId};

/// Page input while the picker is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    PointerMove(NodeId),
    Click(NodeId),
    KeyDown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Ignored,
    Highlighted(NodeId),
    /// The click's default action must be suppressed.
    Picked(NodeId),
    Cancelled,
}

impl PickerOutcome {
    pub fn default_prevented(&self) -> bool {
        matches!(self, PickerOutcome::Picked(_))
    }
}

#[derive(Debug, Default)]
pub struct ElementPicker {
    active: bool,
    highlighted: Option<NodeId>,
}

impl ElementPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activating while already active resets the highlight.
    pub fn activate(&mut self) {
        if self.active {
            debug!("picker already active, resetting");
        }
        self.active = true;
        self.highlighted = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }

    fn close(&mut self) {
        self.active = false;
        self.highlighted = None;
    }

    pub fn handle(&mut self, doc: &Document, event: &PageEvent) -> PickerOutcome {
        if !self.active {
            return PickerOutcome::Ignored;
        }
        match event {
            PageEvent::PointerMove(node) if doc.is_attached(*node) => {
                self.highlighted = Some(*node);
                PickerOutcome::Highlighted(*node)
            }
            PageEvent::Click(node) if doc.is_attached(*node) => {
                debug!(element = %doc.describe(*node), "element picked");
                self.close();
                PickerOutcome::Picked(*node)
            }
            PageEvent::KeyDown(key) if key == "Escape" => {
                debug!("element picker cancelled");
                self.close();
                PickerOutcome::Cancelled
            }
            _ => PickerOutcome::Ignored,
        }
    }
}
