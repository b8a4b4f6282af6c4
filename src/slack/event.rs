//! Socket Mode envelope types.
//!
//! Every field is optional so that unexpected payloads deserialize and
//! are rejected by the filter rather than failing to parse.

use serde::Deserialize;

/// A Socket Mode frame as delivered over the WebSocket.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocketEnvelope {
    /// Frame kind: `hello`, `disconnect`, `events_api`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub envelope_id: Option<String>,
    /// Present on `disconnect` frames.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub payload: EventPayload,
}

/// The Events API callback carried by an `events_api` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    /// Identities this app is installed as; used to ignore our own messages.
    #[serde(default)]
    pub authorizations: Vec<Authorization>,
    #[serde(default)]
    pub event: Option<InnerEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The inner Slack event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InnerEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl SocketEnvelope {
    /// User ids the app itself posts as.
    pub fn self_user_ids(&self) -> impl Iterator<Item = &str> {
        self.payload
            .authorizations
            .iter()
            .filter_map(|a| a.user_id.as_deref())
    }
}
