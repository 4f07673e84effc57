//! Page-side command handling: owns the manual target slot, the picker and
//! the typing controller of one page.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::dom::{lock_document, Document, NodeId, SharedDocument};
use crate::error::TypingError;
use crate::logging::LogHandle;
use crate::messages::{error_message_or_default, Command, FocusInfo, Response, TypePayload, ERROR_NO_TARGET};
use crate::picker::{ElementPicker, PageEvent, PickerOutcome};
use crate::request::TypingRequest;
use crate::runtime::Sleeper;
use crate::session::TypingController;
use crate::target::{classify, find_editable_in_shadow, resolve_target};

pub const NOTICE_PREFIX: &str = "Demo Typer: ";
const ERROR_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("could not encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

pub struct MessageRouter {
    doc: SharedDocument,
    controller: TypingController,
    picker: ElementPicker,
    manual_override: Option<NodeId>,
    enabled: bool,
    debug_logging: bool,
    log_handle: Option<LogHandle>,
    notices: Vec<String>,
}

impl MessageRouter {
    pub fn new(doc: SharedDocument, sleeper: Arc<dyn Sleeper>) -> Self {
        let controller = TypingController::new(doc.clone(), sleeper);
        Self::with_controller(doc, controller)
    }

    pub fn with_controller(doc: SharedDocument, controller: TypingController) -> Self {
        let defaults = Settings::default();
        Self {
            doc,
            controller,
            picker: ElementPicker::new(),
            manual_override: None,
            enabled: defaults.extension_enabled,
            debug_logging: defaults.debug_logging,
            log_handle: None,
            notices: Vec::new(),
        }
    }

    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.log_handle = Some(handle);
        self
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.enabled = settings.extension_enabled;
        if self.debug_logging != settings.debug_logging {
            self.debug_logging = settings.debug_logging;
            if let Some(handle) = &self.log_handle {
                handle.set_debug(settings.debug_logging);
            }
        }
        debug!(enabled = self.enabled, debug_logging = self.debug_logging, "settings applied");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    pub fn controller(&self) -> &TypingController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut TypingController {
        &mut self.controller
    }

    pub fn manual_override(&self) -> Option<NodeId> {
        self.manual_override
    }

    pub fn picker(&self) -> &ElementPicker {
        &self.picker
    }

    /// User-visible messages raised since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn handle_json(&mut self, raw: &str) -> Result<String, RouterError> {
        let command: Command = serde_json::from_str(raw).map_err(|err| {
            warn!(error = %err, "dropping malformed message");
            RouterError::Decode(err)
        })?;
        let response = self.handle(command);
        serde_json::to_string(&response).map_err(RouterError::Encode)
    }

    pub fn handle(&mut self, command: Command) -> Response {
        debug!(command = command.name(), "received message");

        if !self.enabled && command != Command::Ping {
            warn!(command = command.name(), "extension is disabled, ignoring message");
            return Response::disabled();
        }

        match command {
            Command::Ping => Response::Ping {
                ok: true,
                loaded: true,
                enabled: self.enabled,
            },
            Command::Type(payload) => self.start_typing(payload),
            Command::Stop => {
                if self.controller.stop() {
                    info!("typing cancelled");
                }
                Response::ok()
            }
            Command::Pause => {
                self.controller.pause();
                Response::ok()
            }
            Command::Resume => {
                self.controller.resume();
                Response::ok()
            }
            Command::GetFocusInfo => Response::FocusInfo(focus_info(&lock_document(&self.doc))),
            Command::PickElement => {
                info!("element picker mode activated");
                self.picker.activate();
                Response::ok()
            }
            Command::Error { message } => {
                let message = error_message_or_default(&message);
                warn!(message, "error reported");
                self.notify(message);
                Response::ok()
            }
        }
    }

    fn start_typing(&mut self, payload: TypePayload) -> Response {
        let request = TypingRequest::from(payload);
        info!(
            chars = request.text.chars().count(),
            cps = request.chars_per_second,
            mistakes = request.mistakes,
            force_type = request.force_type,
            "typing request"
        );

        let resolved = {
            let doc = lock_document(&self.doc);
            resolve_target(&*doc, doc.active_element(), self.manual_override, request.force_type)
                .map(|target| (target, doc.describe(target.node)))
                .map_err(|err| (err, no_target_message(&doc)))
        };

        let target = match resolved {
            Ok((target, description)) => {
                info!(target = %description, kind = %target.kind, source = %target.source, "starting to type");
                target
            }
            Err((err, message)) => {
                warn!(error = %err, "no element to type into");
                self.notify(&message);
                return Response::rejected(ERROR_NO_TARGET, None);
            }
        };

        match self.controller.start(target, request) {
            Ok(_) => Response::ok(),
            Err(err @ TypingError::WorkerUnavailable(_)) => {
                warn!(error = %err, "could not start session");
                Response::rejected(ERROR_UNAVAILABLE, Some(&err.to_string()))
            }
            Err(err) => Response::rejected(ERROR_NO_TARGET, Some(&err.to_string())),
        }
    }

    /// Feeds page input to the picker. A pick replaces the manual target.
    pub fn on_page_event(&mut self, event: &PageEvent) -> PickerOutcome {
        let outcome = {
            let doc = lock_document(&self.doc);
            let outcome = self.picker.handle(&doc, event);
            if let PickerOutcome::Picked(node) = outcome {
                self.notices
                    .push(format!("Selected: <{}> - Open extension popup to type", doc.tag_name(node)));
            }
            outcome
        };
        if let PickerOutcome::Picked(node) = outcome {
            self.manual_override = Some(node);
        }
        outcome
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(format!("{NOTICE_PREFIX}{message}"));
    }
}

fn no_target_message(doc: &Document) -> String {
    let focus = match doc.active_element() {
        Some(node) => {
            let mut focus = format!("<{}>", doc.tag_name(node));
            if let Some(id) = doc.attribute(node, "id").filter(|id| !id.is_empty()) {
                focus.push_str(&format!(" id=\"{id}\""));
            }
            focus
        }
        None => "<none>".to_string(),
    };
    format!(
        "No target element found.\nCurrent focus: {focus}\n\nTry:\n- Clicking in an editable field\n- Using \"Pick Target Element\" button\n- Enabling \"Force type\" mode"
    )
}

/// Describes the document's active element for the popup.
pub fn focus_info(doc: &Document) -> FocusInfo {
    let Some(el) = doc.active_element() else {
        return FocusInfo::nothing_focused();
    };

    let tag = doc.tag_name(el);
    let input_type = match tag {
        "INPUT" => doc.attribute(el, "type").unwrap_or("text").to_string(),
        "TEXTAREA" => "textarea".to_string(),
        _ => String::new(),
    };
    let has_shadow_dom = doc.shadow_root_of(el).is_some();
    let shadow_editable = has_shadow_dom && find_editable_in_shadow(doc, el).is_some();
    let focused = classify(doc, el).is_some() || shadow_editable;

    FocusInfo {
        focused,
        tag_name: tag.to_string(),
        input_type: Some(input_type),
        content_editable: Some(doc.content_editable_state(el).to_string()),
        id: Some(doc.attribute(el, "id").unwrap_or("").to_string()),
        class_name: Some(doc.attribute(el, "class").unwrap_or("").to_string()),
        has_shadow_dom: Some(has_shadow_dom),
        shadow_editable_found: Some(shadow_editable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::shared;
    use crate::emitter::EmitOutcome;
    use crate::runtime::RecordingSleeper;
    use crate::session::SessionState;
    use assert_matches::assert_matches;

    fn router_with(build: impl FnOnce(&mut Document) -> NodeId) -> (MessageRouter, NodeId) {
        let mut doc = Document::new();
        let node = build(&mut doc);
        let router = MessageRouter::new(shared(doc), Arc::new(RecordingSleeper::new()));
        (router, node)
    }

    fn focused_input(doc: &mut Document) -> NodeId {
        let input = doc.create_element("input");
        doc.set_attribute(input, "id", "q");
        let root = doc.root();
        doc.append_child(root, input).unwrap();
        doc.focus(input);
        input
    }

    fn type_cmd(text: &str) -> Command {
        Command::Type(TypePayload {
            text: text.into(),
            ..TypePayload::default()
        })
    }

    #[test]
    fn ping_is_answered_even_when_disabled() {
        let (mut router, _) = router_with(focused_input);
        router.apply_settings(&Settings {
            extension_enabled: false,
            ..Settings::default()
        });

        assert_eq!(
            router.handle(Command::Ping),
            Response::Ping { ok: true, loaded: true, enabled: false }
        );
        for cmd in [type_cmd("x"), Command::Stop, Command::Pause, Command::Resume, Command::GetFocusInfo, Command::PickElement] {
            assert_eq!(router.handle(cmd), Response::disabled());
        }
        assert!(!router.picker().is_active());
    }

    #[test]
    fn type_into_focused_input() {
        let (mut router, input) = router_with(focused_input);
        assert_eq!(router.handle(type_cmd("hey")), Response::ok());

        let report = router.controller_mut().wait().unwrap();
        assert_eq!(report.outcome, EmitOutcome::Finished);
        assert_eq!(lock_document(router.document()).field(input).unwrap().value, "hey");
    }

    #[test]
    fn missing_target_is_reported_with_remedies() {
        let (mut router, _) = router_with(|doc| {
            let button = doc.create_element("button");
            doc.set_attribute(button, "id", "go");
            let root = doc.root();
            doc.append_child(root, button).unwrap();
            doc.focus(button);
            button
        });

        let response = router.handle(type_cmd("x"));
        assert_eq!(response.error_code(), Some(ERROR_NO_TARGET));
        assert_eq!(router.controller().state(), SessionState::Idle);

        let notices = router.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Demo Typer: No target element found."));
        assert!(notices[0].contains("Current focus: <BUTTON> id=\"go\""));
        assert!(notices[0].contains("Pick Target Element"));
        assert!(notices[0].contains("Force type"));
        assert!(router.take_notices().is_empty());
    }

    #[test]
    fn controls_without_session_succeed() {
        let (mut router, _) = router_with(focused_input);
        for cmd in [Command::Stop, Command::Pause, Command::Resume] {
            assert_eq!(router.handle(cmd), Response::ok());
        }
    }

    #[test]
    fn picked_element_takes_priority_over_focus() {
        let mut doc = Document::new();
        let input = focused_input(&mut doc);
        let area = doc.create_element("textarea");
        let root = doc.root();
        doc.append_child(root, area).unwrap();
        let mut router = MessageRouter::new(shared(doc), Arc::new(RecordingSleeper::new()));

        assert_eq!(router.handle(Command::PickElement), Response::ok());
        assert_matches!(router.on_page_event(&PageEvent::PointerMove(area)), PickerOutcome::Highlighted(_));
        let outcome = router.on_page_event(&PageEvent::Click(area));
        assert!(outcome.default_prevented());
        assert_eq!(router.manual_override(), Some(area));
        assert_eq!(router.take_notices(), vec!["Selected: <TEXTAREA> - Open extension popup to type".to_string()]);

        router.handle(type_cmd("picked"));
        router.controller_mut().wait().unwrap();

        let doc = lock_document(router.document());
        assert_eq!(doc.field(area).unwrap().value, "picked");
        assert_eq!(doc.field(input).unwrap().value, "");
    }

    #[test]
    fn escape_leaves_override_untouched() {
        let (mut router, _) = router_with(focused_input);
        router.handle(Command::PickElement);
        assert_eq!(router.on_page_event(&PageEvent::KeyDown("Escape".into())), PickerOutcome::Cancelled);
        assert_eq!(router.manual_override(), None);
        assert!(router.take_notices().is_empty());
    }

    #[test]
    fn error_command_raises_notice() {
        let (mut router, _) = router_with(focused_input);
        assert_eq!(router.handle(Command::error("Snippet #2 not found.")), Response::ok());
        assert_eq!(router.handle(Command::error("")), Response::ok());
        assert_eq!(
            router.take_notices(),
            vec![
                "Demo Typer: Snippet #2 not found.".to_string(),
                "Demo Typer: An error occurred".to_string()
            ]
        );
    }

    #[test]
    fn json_channel_round_trip() {
        let (mut router, _) = router_with(focused_input);
        let reply = router.handle_json(r#"{"type":"DEMO_TYPER/PING"}"#).unwrap();
        assert_eq!(reply, r#"{"ok":true,"loaded":true,"enabled":true}"#);

        assert_matches!(router.handle_json("{oops"), Err(RouterError::Decode(_)));
        assert_matches!(router.handle_json(r#"{"type":"DEMO_TYPER/NOPE"}"#), Err(RouterError::Decode(_)));
    }

    #[test]
    fn focus_info_for_plain_input() {
        let mut doc = Document::new();
        let input = focused_input(&mut doc);
        doc.set_attribute(input, "class", "search");

        let info = focus_info(&doc);
        assert!(info.focused);
        assert_eq!(info.tag_name, "INPUT");
        assert_eq!(info.input_type.as_deref(), Some("text"));
        assert_eq!(info.id.as_deref(), Some("q"));
        assert_eq!(info.class_name.as_deref(), Some("search"));
        assert_eq!(info.has_shadow_dom, Some(false));
        assert_eq!(info.shadow_editable_found, Some(false));
    }

    #[test]
    fn focus_info_sees_shadow_editor() {
        let mut doc = Document::new();
        let root = doc.root();
        let host = doc.create_element("my-app");
        doc.append_child(root, host).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let editable = doc.create_element("div");
        doc.set_attribute(editable, "contenteditable", "true");
        doc.append_child(shadow, editable).unwrap();
        doc.focus(editable);

        let info = focus_info(&doc);
        assert_eq!(info.tag_name, "MY-APP");
        assert!(info.focused);
        assert_eq!(info.has_shadow_dom, Some(true));
        assert_eq!(info.shadow_editable_found, Some(true));
    }

    #[test]
    fn focus_info_when_nothing_focused() {
        assert_eq!(focus_info(&Document::new()), FocusInfo::nothing_focused());
    }
}
