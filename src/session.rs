//! Owns the single in-flight typing session of a page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::dom::{lock_document, Document, SharedDocument, TextRange};
use crate::emitter::{EmitReport, Emitter};
use crate::error::TypingError;
use crate::pacing::Pacer;
use crate::request::TypingRequest;
use crate::runtime::Sleeper;
use crate::target::ResolvedTarget;

#[derive(Debug, Default)]
struct SessionFlags {
    cancelled: AtomicBool,
    superseded: AtomicBool,
    paused: AtomicBool,
}

/// Cancellation and pause flags of exactly one session. A new session always
/// gets a fresh token, so a stale loop can never observe the new session's
/// state.
#[derive(Debug, Clone, Default)]
pub struct SessionToken(Arc<SessionFlags>);

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels a session that another session replaced. Its remaining
    /// cleanup must not touch the shared target any more.
    pub fn supersede(&self) {
        self.0.superseded.store(true, Ordering::SeqCst);
        self.cancel();
    }

    pub fn is_superseded(&self) -> bool {
        self.0.superseded.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.0.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
}

/// Caret or range captured before the first mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSnapshot {
    Field { start: usize, end: usize },
    Range(TextRange),
}

impl SelectionSnapshot {
    pub fn capture(doc: &Document, target: &ResolvedTarget) -> Option<Self> {
        if let Some(field) = doc.field(target.node).filter(|_| target.kind.is_text_field()) {
            return Some(SelectionSnapshot::Field {
                start: field.selection_start,
                end: field.selection_end,
            });
        }
        doc.selection(doc.selection_root(target.node))
            .map(SelectionSnapshot::Range)
    }

    /// Best effort: silently skipped once the target is gone.
    pub fn restore(&self, doc: &mut Document, target: &ResolvedTarget) {
        if !doc.is_attached(target.node) {
            debug!("target detached, skipping cursor restore");
            return;
        }
        match *self {
            SelectionSnapshot::Field { start, end } => {
                if let Err(err) = doc.set_selection_range(target.node, start, end) {
                    debug!(error = %err, "could not restore caret");
                }
            }
            SelectionSnapshot::Range(range) => {
                if doc.is_attached(range.container) {
                    let root = doc.selection_root(target.node);
                    doc.set_selection(root, Some(range));
                }
            }
        }
    }
}

pub type SessionId = u64;

struct ActiveSession {
    id: SessionId,
    token: SessionToken,
    handle: JoinHandle<EmitReport>,
}

pub struct TypingController {
    doc: SharedDocument,
    sleeper: Arc<dyn Sleeper>,
    seed: Option<u64>,
    current: Option<ActiveSession>,
    last_report: Option<EmitReport>,
    next_id: SessionId,
}

impl TypingController {
    pub fn new(doc: SharedDocument, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            doc,
            sleeper,
            seed: None,
            current: None,
            last_report: None,
            next_id: 1,
        }
    }

    /// Deterministic pacing: session `n` uses `seed + n`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn state(&self) -> SessionState {
        match &self.current {
            Some(session) if !session.handle.is_finished() => {
                if session.token.is_paused() {
                    SessionState::Paused
                } else {
                    SessionState::Running
                }
            }
            _ => SessionState::Idle,
        }
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current.as_ref().map(|s| s.id)
    }

    /// Replaces any session in flight. The previous session is only asked to
    /// stop; its worker winds down on its own.
    pub fn start(&mut self, target: ResolvedTarget, request: TypingRequest) -> Result<SessionId, TypingError> {
        if let Some(previous) = self.current.take() {
            previous.token.supersede();
            if !previous.handle.is_finished() {
                info!(session = previous.id, "replacing session in flight");
            }
        }

        let id = self.next_id;
        self.next_id += 1;

        let request = request.normalized();
        let token = SessionToken::new();
        let snapshot = {
            let mut doc = lock_document(&self.doc);
            doc.focus(target.node);
            SelectionSnapshot::capture(&doc, &target)
        };
        let pacer = match self.seed {
            Some(seed) => Pacer::seeded(&request, seed.wrapping_add(id)),
            None => Pacer::new(&request),
        };

        let doc = self.doc.clone();
        let sleeper = self.sleeper.clone();
        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("typing-session-{id}"))
            .spawn(move || run_session(&doc, sleeper.as_ref(), pacer, target, request, worker_token, snapshot))
            .map_err(|err| TypingError::WorkerUnavailable(err.to_string()))?;

        info!(session = id, "session started");
        self.current = Some(ActiveSession { id, token, handle });
        Ok(id)
    }

    /// Returns whether a running session was paused. Idempotent.
    pub fn pause(&self) -> bool {
        match self.state() {
            SessionState::Idle => false,
            _ => {
                self.token_of_current().pause();
                true
            }
        }
    }

    pub fn resume(&self) -> bool {
        match self.state() {
            SessionState::Paused => {
                self.token_of_current().resume();
                true
            }
            _ => false,
        }
    }

    /// Requests cancellation; honored at the session's next checkpoint.
    pub fn stop(&self) -> bool {
        match self.state() {
            SessionState::Idle => false,
            _ => {
                self.token_of_current().cancel();
                true
            }
        }
    }

    fn token_of_current(&self) -> SessionToken {
        self.current
            .as_ref()
            .map(|s| s.token.clone())
            .unwrap_or_default()
    }

    /// Blocks until the current session ends and returns its report.
    pub fn wait(&mut self) -> Option<EmitReport> {
        let session = self.current.take()?;
        let report = session.handle.join().ok()?;
        self.last_report = Some(report.clone());
        Some(report)
    }

    pub fn last_report(&self) -> Option<&EmitReport> {
        self.last_report.as_ref()
    }
}

fn run_session(
    doc: &SharedDocument,
    sleeper: &dyn Sleeper,
    pacer: Pacer,
    target: ResolvedTarget,
    request: TypingRequest,
    token: SessionToken,
    snapshot: Option<SelectionSnapshot>,
) -> EmitReport {
    let report = Emitter::new(doc, sleeper, pacer).emit(&target, &request, &token);

    if request.restore_cursor {
        if let Some(snapshot) = snapshot {
            let mut page = lock_document(doc);
            if token.is_superseded() {
                debug!("session replaced, leaving the cursor to its successor");
            } else {
                snapshot.restore(&mut page, &target);
            }
        }
    }
    info!(outcome = %report.outcome, typed = report.chars_typed, "session ended");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{shared, NodeId};
    use crate::emitter::EmitOutcome;
    use crate::runtime::{FnSleeper, RecordingSleeper};
    use crate::target::{EditKind, TargetSource};
    use std::sync::mpsc;
    use std::time::Duration;

    fn page() -> (SharedDocument, NodeId) {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        let root = doc.root();
        doc.append_child(root, input).unwrap();
        (shared(doc), input)
    }

    fn input_target(node: NodeId) -> ResolvedTarget {
        ResolvedTarget {
            node,
            kind: EditKind::PlainInput,
            source: TargetSource::Focus,
        }
    }

    /// Blocks each suspension until the test lets it through.
    fn gated() -> (Arc<dyn Sleeper>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel::<()>();
        let rx = std::sync::Mutex::new(rx);
        let sleeper = FnSleeper(move |_: Duration| {
            if let Ok(rx) = rx.lock() {
                let _ = rx.recv_timeout(Duration::from_secs(5));
            }
        });
        (Arc::new(sleeper), tx)
    }

    #[test]
    fn idle_controller_ignores_controls() {
        let (doc, _) = page();
        let controller = TypingController::new(doc, Arc::new(RecordingSleeper::new()));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!controller.pause());
        assert!(!controller.resume());
        assert!(!controller.stop());
    }

    #[test]
    fn session_runs_to_completion() {
        let (doc, input) = page();
        let mut controller = TypingController::new(doc.clone(), Arc::new(RecordingSleeper::new())).with_seed(1);

        let id = controller.start(input_target(input), TypingRequest::new("done")).unwrap();
        assert_eq!(controller.current_id(), Some(id));
        let report = controller.wait().unwrap();

        assert_eq!(report.outcome, EmitOutcome::Finished);
        assert_eq!(lock_document(&doc).field(input).unwrap().value, "done");
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.last_report(), Some(&report));
    }

    #[test]
    fn pause_resume_and_stop_drive_the_state_machine() {
        let (doc, input) = page();
        let (sleeper, gate) = gated();
        let mut controller = TypingController::new(doc.clone(), sleeper);

        controller.start(input_target(input), TypingRequest::new("abcdef")).unwrap();
        assert_eq!(controller.state(), SessionState::Running);

        assert!(controller.pause());
        assert!(controller.pause());
        assert_eq!(controller.state(), SessionState::Paused);

        assert!(controller.resume());
        assert_eq!(controller.state(), SessionState::Running);
        assert!(!controller.resume());

        assert!(controller.stop());
        for _ in 0..10 {
            let _ = gate.send(());
        }
        let report = controller.wait().unwrap();

        assert_eq!(report.outcome, EmitOutcome::Cancelled);
        assert!(report.chars_typed < 6);
        let value = lock_document(&doc).field(input).unwrap().value.clone();
        assert_eq!(value, &"abcdef"[..report.chars_typed]);
    }

    #[test]
    fn starting_a_new_session_supersedes_the_previous_one() {
        let (doc, input) = page();
        let (sleeper, gate) = gated();
        let mut controller = TypingController::new(doc.clone(), sleeper);

        controller.start(input_target(input), TypingRequest::new("first")).unwrap();
        let first = controller.token_of_current();
        controller.start(input_target(input), TypingRequest::new("second")).unwrap();
        let second = controller.token_of_current();

        assert!(first.is_cancelled() && first.is_superseded());
        assert!(!second.is_cancelled() && !second.is_superseded());

        for _ in 0..20 {
            let _ = gate.send(());
        }
        let report = controller.wait().unwrap();
        assert_eq!(report.outcome, EmitOutcome::Finished);
    }

    #[test]
    fn replaced_session_does_not_restore_over_its_successor() {
        let (doc, input) = page();
        let (reached_tx, reached_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let first_gate = std::sync::Mutex::new((reached_tx, release_rx));
        let sleeper = FnSleeper(move |_: Duration| {
            if thread::current().name() == Some("typing-session-1") {
                if let Ok(gate) = first_gate.lock() {
                    let _ = gate.0.send(());
                    let _ = gate.1.recv_timeout(Duration::from_secs(5));
                }
            }
        });
        let mut controller = TypingController::new(doc.clone(), Arc::new(sleeper));

        let replaced = TypingRequest {
            restore_cursor: true,
            ..TypingRequest::new("first")
        };
        controller.start(input_target(input), replaced).unwrap();
        reached_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        controller.start(input_target(input), TypingRequest::new("second")).unwrap();
        assert_eq!(controller.wait().unwrap().outcome, EmitOutcome::Finished);

        // the replaced worker owns the only other handle on the page
        release_tx.send(()).unwrap();
        for _ in 0..500 {
            if Arc::strong_count(&doc) == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(Arc::strong_count(&doc), 2);

        let page = lock_document(&doc);
        let field = page.field(input).unwrap();
        assert_eq!(field.value, "fsecond");
        assert_eq!((field.selection_start, field.selection_end), (7, 7));
    }

    #[test]
    fn superseded_session_skips_cursor_restore() {
        let (doc, input) = page();
        let target = input_target(input);
        let snapshot = SelectionSnapshot::capture(&lock_document(&doc), &target);
        let token = SessionToken::new();
        let successor = doc.clone();
        let stale = token.clone();
        // the successor starts typing while this session sleeps after its first char
        let sleeper = FnSleeper(move |_: Duration| {
            if !stale.is_superseded() {
                stale.supersede();
                lock_document(&successor).insert_into_field(input, "bbb").unwrap();
            }
        });
        let request = TypingRequest {
            restore_cursor: true,
            ..TypingRequest::new("aaaa")
        };

        let report = run_session(&doc, &sleeper, Pacer::seeded(&request, 3), target, request, token, snapshot);

        assert_eq!(report.outcome, EmitOutcome::Cancelled);
        let page = lock_document(&doc);
        let field = page.field(input).unwrap();
        assert_eq!(field.value, "abbb");
        assert_eq!((field.selection_start, field.selection_end), (4, 4));
    }

    #[test]
    fn cursor_is_restored_after_typing() {
        let (doc, input) = page();
        {
            let mut page = lock_document(&doc);
            page.set_value(input, "tail").unwrap();
            page.set_selection_range(input, 0, 0).unwrap();
        }
        let mut controller = TypingController::new(doc.clone(), Arc::new(RecordingSleeper::new()));
        let request = TypingRequest {
            restore_cursor: true,
            ..TypingRequest::new("head ")
        };
        controller.start(input_target(input), request).unwrap();
        controller.wait().unwrap();

        let page = lock_document(&doc);
        let field = page.field(input).unwrap();
        assert_eq!(field.value, "head tail");
        assert_eq!((field.selection_start, field.selection_end), (0, 0));
    }

    #[test]
    fn restore_is_skipped_for_detached_targets() {
        let (doc, input) = page();
        let target = input_target(input);
        let snapshot = SelectionSnapshot::capture(&lock_document(&doc), &target).unwrap();

        let mut page = lock_document(&doc);
        page.set_value(input, "abc").unwrap();
        page.remove(input);
        snapshot.restore(&mut page, &target);
        assert_eq!(page.field(input).unwrap().selection_start, 3);
    }

    #[test]
    fn contenteditable_snapshot_uses_root_selection() {
        let mut doc = Document::new();
        let root = doc.root();
        let editable = doc.create_element("div");
        doc.set_attribute(editable, "contenteditable", "true");
        doc.set_text_content(editable, "hello");
        doc.append_child(root, editable).unwrap();
        doc.set_selection(root, Some(TextRange::collapsed(editable, 2)));

        let target = ResolvedTarget {
            node: editable,
            kind: EditKind::ContentEditable,
            source: TargetSource::Focus,
        };
        let snapshot = SelectionSnapshot::capture(&doc, &target);
        assert_eq!(snapshot, Some(SelectionSnapshot::Range(TextRange::collapsed(editable, 2))));

        doc.set_selection(root, Some(TextRange::collapsed(editable, 5)));
        snapshot.unwrap().restore(&mut doc, &target);
        assert_eq!(doc.selection(root), Some(TextRange::collapsed(editable, 2)));
    }
}
