//! JSON messages exchanged between the popup/background and a page.

use serde::{Deserialize, Serialize};

use crate::request::{TypingRequest, DEFAULT_CPS, DEFAULT_MISTAKE_RATE};

pub const ERROR_NO_TARGET: &str = "no-target";
pub const ERROR_DISABLED: &str = "extension-disabled";
pub const DISABLED_MESSAGE: &str = "Demo Typer is currently disabled";
const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "DEMO_TYPER/PING")]
    Ping,
    #[serde(rename = "DEMO_TYPER/TYPE")]
    Type(TypePayload),
    #[serde(rename = "DEMO_TYPER/STOP")]
    Stop,
    #[serde(rename = "DEMO_TYPER/PAUSE")]
    Pause,
    #[serde(rename = "DEMO_TYPER/RESUME")]
    Resume,
    #[serde(rename = "DEMO_TYPER/GET_FOCUS_INFO")]
    GetFocusInfo,
    #[serde(rename = "DEMO_TYPER/PICK_ELEMENT")]
    PickElement,
    #[serde(rename = "DEMO_TYPER/ERROR")]
    Error {
        #[serde(default)]
        message: String,
    },
}

impl Command {
    pub fn error(message: impl Into<String>) -> Self {
        Command::Error {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Type(_) => "TYPE",
            Command::Stop => "STOP",
            Command::Pause => "PAUSE",
            Command::Resume => "RESUME",
            Command::GetFocusInfo => "GET_FOCUS_INFO",
            Command::PickElement => "PICK_ELEMENT",
            Command::Error { .. } => "ERROR",
        }
    }
}

/// Absent fields take the extension's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypePayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cps: Option<f64>,
    pub mistakes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mistake_rate: Option<f64>,
    pub cursor_restore: bool,
    pub force_type: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_key_events: Option<bool>,
}

impl From<TypePayload> for TypingRequest {
    fn from(payload: TypePayload) -> Self {
        TypingRequest {
            text: payload.text,
            chars_per_second: payload.cps.filter(|c| *c != 0.0).unwrap_or(DEFAULT_CPS),
            mistakes: payload.mistakes,
            mistake_rate_percent: payload.mistake_rate.unwrap_or(DEFAULT_MISTAKE_RATE),
            restore_cursor: payload.cursor_restore,
            force_type: payload.force_type,
            use_key_events: payload.use_key_events.unwrap_or(true),
        }
        .normalized()
    }
}

impl From<&TypingRequest> for TypePayload {
    fn from(request: &TypingRequest) -> Self {
        TypePayload {
            text: request.text.clone(),
            cps: Some(request.chars_per_second),
            mistakes: request.mistakes,
            mistake_rate: Some(request.mistake_rate_percent),
            cursor_restore: request.restore_cursor,
            force_type: request.force_type,
            use_key_events: Some(request.use_key_events),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusInfo {
    pub focused: bool,
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_editable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(rename = "hasShadowDOM", default, skip_serializing_if = "Option::is_none")]
    pub has_shadow_dom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_editable_found: Option<bool>,
}

impl FocusInfo {
    pub fn nothing_focused() -> Self {
        FocusInfo {
            focused: false,
            tag_name: "none".to_string(),
            input_type: None,
            content_editable: None,
            id: None,
            class_name: None,
            has_shadow_dom: None,
            shadow_editable_found: None,
        }
    }
}

/// Reply shapes; the variant order decides untagged decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ping {
        ok: bool,
        loaded: bool,
        enabled: bool,
    },
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    FocusInfo(FocusInfo),
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack {
            ok: true,
            error: None,
            message: None,
        }
    }

    pub fn rejected(error: &str, message: Option<&str>) -> Self {
        Response::Ack {
            ok: false,
            error: Some(error.to_string()),
            message: message.map(str::to_string),
        }
    }

    pub fn disabled() -> Self {
        Response::rejected(ERROR_DISABLED, Some(DISABLED_MESSAGE))
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Response::Ping { ok, .. } | Response::Ack { ok, .. } => *ok,
            Response::FocusInfo(_) => true,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Response::Ack { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

pub(crate) fn error_message_or_default(message: &str) -> &str {
    if message.is_empty() {
        FALLBACK_ERROR_MESSAGE
    } else {
        message
    }
}
