//! Newline delimited JSON spoken with the host over stdin/stdout.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{TabId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

/// Notifications about the browser state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    TabUpdated {
        tab_id: TabId,
        window_id: WindowId,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    WindowFocusChanged { window_id: Option<WindowId> },
    IdleStateChanged { state: IdleState },
}

/// Requests coming from the stats UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    SendStats,
    ClearStats,
    AddIgnoredSite { url: String },
    Pause,
    Resume,
}

impl ControlRequest {
    pub fn action(&self) -> &'static str {
        match self {
            ControlRequest::SendStats => "sendStats",
            ControlRequest::ClearStats => "clearStats",
            ControlRequest::AddIgnoredSite { .. } => "addIgnoredSite",
            ControlRequest::Pause => "pause",
            ControlRequest::Resume => "resume",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    action: String,
    #[serde(default)]
    site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Event(HostEvent),
    Request(ControlRequest),
}

/// Parses one line sent by the host. Unknown actions are logged and yield `Ok(None)`, anything
/// that is not a valid message is an error.
pub fn parse_inbound(line: &str) -> Result<Option<InboundMessage>> {
    let value: Value = serde_json::from_str(line)?;

    if value.get("event").is_some() {
        return Ok(Some(InboundMessage::Event(HostEvent::deserialize(value)?)));
    }

    if value.get("action").is_some() {
        let RawRequest { action, site } = RawRequest::deserialize(value)?;
        let request = match action.as_str() {
            "sendStats" => ControlRequest::SendStats,
            "clearStats" => ControlRequest::ClearStats,
            "addIgnoredSite" => match site {
                Some(url) => ControlRequest::AddIgnoredSite { url },
                None => {
                    warn!("addIgnoredSite request without a site");
                    return Ok(None);
                }
            },
            "pause" => ControlRequest::Pause,
            "resume" => ControlRequest::Resume,
            other => {
                warn!("Invalid action given: {other}");
                return Ok(None);
            }
        };
        return Ok(Some(InboundMessage::Request(request)));
    }

    Err(anyhow!("message has neither an event nor an action"))
}

/// What the toolbar icon should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Paused,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Ack { action: &'static str },
    Status { status: Status },
}
