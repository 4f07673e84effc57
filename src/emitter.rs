//! Character-by-character emission into a resolved target.
//!
//! Every character is one cooperative step: check cancellation, wait out a
//! pause, optionally mistype and correct, dispatch key events, mutate the
//! target, then sleep. The page lock is held only while mutating.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dom::{lock_document, DomError, DomEvent, Document, InputType, NodeId, SharedDocument, TextRange};
use crate::editing::char_len;
use crate::error::TypingError;
use crate::keys::KeyStroke;
use crate::pacing::Pacer;
use crate::request::TypingRequest;
use crate::runtime::{Sleeper, PAUSE_POLL_INTERVAL};
use crate::session::SessionToken;
use crate::target::{EditKind, ResolvedTarget};
use crate::util::{as_millis_f64, mean, std_dev};

const PROGRESS_LOG_EVERY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Finished,
    Cancelled,
    Failed(TypingError),
}

impl fmt::Display for EmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitOutcome::Finished => write!(f, "finished"),
            EmitOutcome::Cancelled => write!(f, "cancelled"),
            EmitOutcome::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmitReport {
    pub outcome: EmitOutcome,
    pub total_chars: usize,
    pub chars_typed: usize,
    pub mistakes_injected: usize,
    pub delays: Vec<Duration>,
}

impl EmitReport {
    fn new(total_chars: usize) -> Self {
        Self {
            outcome: EmitOutcome::Finished,
            total_chars,
            chars_typed: 0,
            mistakes_injected: 0,
            delays: Vec::new(),
        }
    }

    fn delays_ms(&self) -> Vec<f64> {
        self.delays.iter().copied().map(as_millis_f64).collect()
    }

    pub fn mean_delay_ms(&self) -> Option<f64> {
        mean(&self.delays_ms())
    }

    pub fn delay_std_dev_ms(&self) -> Option<f64> {
        std_dev(&self.delays_ms())
    }
}

/// Emitted after each intended character is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitProgress {
    pub index: usize,
    pub total: usize,
    pub ch: char,
}

type ProgressFn<'a> = Box<dyn FnMut(&EmitProgress) + Send + 'a>;

pub struct Emitter<'a> {
    doc: &'a SharedDocument,
    sleeper: &'a dyn Sleeper,
    pacer: Pacer,
    on_progress: Option<ProgressFn<'a>>,
}

impl<'a> Emitter<'a> {
    pub fn new(doc: &'a SharedDocument, sleeper: &'a dyn Sleeper, pacer: Pacer) -> Self {
        Self {
            doc,
            sleeper,
            pacer,
            on_progress: None,
        }
    }

    pub fn on_progress(mut self, callback: impl FnMut(&EmitProgress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn emit(&mut self, target: &ResolvedTarget, request: &TypingRequest, token: &SessionToken) -> EmitReport {
        let chars: Vec<char> = request.text.chars().collect();
        let mut report = EmitReport::new(chars.len());
        info!(chars = chars.len(), cps = request.chars_per_second, kind = %target.kind, "typing started");

        report.outcome = match self.run(&chars, target, request, token, &mut report) {
            Ok(()) => {
                info!(chars = report.chars_typed, "finished typing");
                EmitOutcome::Finished
            }
            Err(err) if !err.is_failure() => {
                info!(typed = report.chars_typed, total = report.total_chars, reason = %err, "typing cancelled");
                EmitOutcome::Cancelled
            }
            Err(err) => {
                warn!(typed = report.chars_typed, error = %err, "typing stopped early");
                EmitOutcome::Failed(err)
            }
        };
        report
    }

    fn run(
        &mut self,
        chars: &[char],
        target: &ResolvedTarget,
        request: &TypingRequest,
        token: &SessionToken,
        report: &mut EmitReport,
    ) -> Result<(), TypingError> {
        for (index, &ch) in chars.iter().enumerate() {
            checkpoint(token)?;
            self.wait_while_paused(token)?;

            if index > 0 && index % PROGRESS_LOG_EVERY == 0 {
                debug!("typed {index}/{} characters", chars.len());
            }

            if self.pacer.should_mistype(ch) {
                let wrong = self.pacer.wrong_char(ch);
                debug!(intended = %ch.escape_debug(), %wrong, "injecting mistake");
                self.type_char(target, wrong, request, token, report)?;
                self.remove_previous(target, token)?;
                report.mistakes_injected += 1;
                self.suspend(self.pacer.half_delay(), report);
            }

            if ch == '\n' && target.kind == EditKind::ContentEditable {
                checkpoint(token)?;
                self.insert_line_break(target, request)?;
                self.suspend(self.pacer.base_delay(), report);
            } else {
                self.type_char(target, ch, request, token, report)?;
            }

            report.chars_typed += 1;
            if let Some(callback) = self.on_progress.as_mut() {
                callback(&EmitProgress {
                    index,
                    total: chars.len(),
                    ch,
                });
            }
        }
        Ok(())
    }

    fn wait_while_paused(&self, token: &SessionToken) -> Result<(), TypingError> {
        while token.is_paused() {
            checkpoint(token)?;
            self.sleeper.sleep(PAUSE_POLL_INTERVAL);
        }
        Ok(())
    }

    fn suspend(&self, duration: Duration, report: &mut EmitReport) {
        report.delays.push(duration);
        self.sleeper.sleep(duration);
    }

    fn type_char(
        &mut self,
        target: &ResolvedTarget,
        ch: char,
        request: &TypingRequest,
        token: &SessionToken,
        report: &mut EmitReport,
    ) -> Result<(), TypingError> {
        checkpoint(token)?;
        {
            let mut doc = lock_document(self.doc);
            ensure_attached(&doc, target.node)?;

            if request.use_key_events || target.kind == EditKind::Opaque {
                doc.dispatch_key_stroke(target.node, &KeyStroke::for_char(ch));
            }

            let text = ch.to_string();
            let result = match target.kind {
                EditKind::PlainInput | EditKind::TextArea => insert_into_field(&mut doc, target.node, &text),
                EditKind::ContentEditable => insert_into_editable(&mut doc, target.node, &text),
                EditKind::Opaque => Ok(()),
            };
            tolerate(ch, result)?;
        }
        let delay = self.pacer.jittered_delay();
        self.suspend(delay, report);
        Ok(())
    }

    /// Removes the character just typed (the mistake). A stopped session
    /// still cleans up its typo; a replaced one leaves the target alone.
    fn remove_previous(&mut self, target: &ResolvedTarget, token: &SessionToken) -> Result<(), TypingError> {
        let mut doc = lock_document(self.doc);
        if token.is_superseded() {
            return Err(TypingError::Aborted);
        }
        ensure_attached(&doc, target.node)?;

        let result = match target.kind {
            EditKind::PlainInput | EditKind::TextArea => {
                doc.delete_backward_in_field(target.node).map(|removed| {
                    if removed {
                        doc.dispatch(DomEvent::Input {
                            target: target.node,
                            input_type: InputType::DeleteContentBackward,
                            data: None,
                        });
                    }
                })
            }
            EditKind::ContentEditable => {
                let root = doc.selection_root(target.node);
                match doc.exec_delete(root) {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        debug!("delete primitive refused, removing text directly");
                        doc.delete_text_backward(root).map(|removed| {
                            if removed {
                                doc.dispatch(DomEvent::Input {
                                    target: target.node,
                                    input_type: InputType::DeleteContentBackward,
                                    data: None,
                                });
                            }
                        })
                    }
                    Err(err) => Err(err),
                }
            }
            EditKind::Opaque => {
                doc.dispatch_key_stroke(target.node, &KeyStroke::backspace());
                Ok(())
            }
        };
        tolerate('\u{8}', result)
    }

    fn insert_line_break(&mut self, target: &ResolvedTarget, request: &TypingRequest) -> Result<(), TypingError> {
        let mut doc = lock_document(self.doc);
        ensure_attached(&doc, target.node)?;

        if request.use_key_events {
            doc.dispatch_key_stroke(target.node, &KeyStroke::for_char('\n'));
        }
        let root = prepare_range(&mut doc, target.node);
        let result = match doc.exec_insert_line_break(root) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("line break insertion refused, inserting newline text");
                doc.insert_text_node(root, "\n")
            }
            Err(err) => Err(err),
        };
        tolerate('\n', result)
    }
}

/// `Cancelled` for a user stop, `Aborted` once a newer session took over.
fn checkpoint(token: &SessionToken) -> Result<(), TypingError> {
    if token.is_superseded() {
        Err(TypingError::Aborted)
    } else if token.is_cancelled() {
        Err(TypingError::Cancelled)
    } else {
        Ok(())
    }
}

fn ensure_attached(doc: &Document, node: NodeId) -> Result<(), TypingError> {
    if doc.is_attached(node) {
        Ok(())
    } else {
        Err(TypingError::TargetDetached)
    }
}

/// Per-character problems are logged and skipped; only a detached target
/// ends the session.
fn tolerate(ch: char, result: Result<(), DomError>) -> Result<(), TypingError> {
    match result {
        Ok(()) => Ok(()),
        Err(DomError::Detached(_)) => Err(TypingError::TargetDetached),
        Err(err) => {
            let err = TypingError::InsertionFailed {
                ch,
                reason: err.to_string(),
            };
            warn!(error = %err, "continuing after insertion failure");
            Ok(())
        }
    }
}

fn insert_into_field(doc: &mut Document, node: NodeId, text: &str) -> Result<(), DomError> {
    doc.insert_into_field(node, text)?;
    doc.dispatch(DomEvent::Input {
        target: node,
        input_type: InputType::InsertText,
        data: Some(text.to_string()),
    });
    Ok(())
}

/// Makes sure the root governing `node` has a range inside it (collapsed to
/// the end when missing) and returns that root.
fn prepare_range(doc: &mut Document, node: NodeId) -> NodeId {
    let root = doc.selection_root(node);
    let inside = doc.selection(root).is_some_and(|range| range.container == node);
    if !inside {
        let end = char_len(doc.text_content(node));
        doc.set_selection(root, Some(TextRange::collapsed(node, end)));
        debug!("created selection range at end of element");
    }
    root
}

fn insert_into_editable(doc: &mut Document, node: NodeId, text: &str) -> Result<(), DomError> {
    let root = prepare_range(doc, node);

    if doc.selection(root).is_some_and(|range| !range.is_collapsed()) {
        doc.exec_delete(root)?;
    }

    if doc.exec_insert_text(root, text)? {
        return Ok(());
    }

    debug!("text insertion primitive refused, inserting text node directly");
    doc.insert_text_node(root, text)?;
    doc.dispatch(DomEvent::Input {
        target: node,
        input_type: InputType::InsertText,
        data: Some(text.to_string()),
    });
    Ok(())
}
