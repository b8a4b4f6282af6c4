//! Inbound message filtering.
//!
//! Decides whether a Socket Mode envelope is a message the game should see
//! and, if so, turns it into a [`CanonicalMessage`]. Our own posts, other
//! bots, edits/joins/deletions and chatter outside the trivia channel are
//! dropped here.

use tracing::debug;

use crate::common::{CanonicalMessage, ChannelKind};
use crate::slack::event::SocketEnvelope;

/// Envelope kind used for Events API callbacks.
const EVENTS_API: &str = "events_api";

/// Message filter bound to the configured trivia channel.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    trivia_channel: String,
}

impl MessageFilter {
    pub fn new(trivia_channel: impl Into<String>) -> Self {
        Self {
            trivia_channel: trivia_channel.into(),
        }
    }

    /// Return a canonical message if the envelope is actionable.
    ///
    /// Self identities are taken from the envelope's own authorization list.
    pub fn parse(&self, envelope: &SocketEnvelope) -> Option<CanonicalMessage> {
        if envelope.kind != EVENTS_API {
            return None;
        }

        let event = envelope.payload.event.as_ref()?;

        if event.kind.as_deref() != Some("message") || event.subtype.is_some() {
            debug!(kind = ?event.kind, subtype = ?event.subtype, "Ignoring non-message event");
            return None;
        }

        if event.bot_id.is_some() || event.app_id.is_some() {
            debug!(bot_id = ?event.bot_id, app_id = ?event.app_id, "Ignoring automated message");
            return None;
        }

        let user = event.user.as_deref()?;
        if envelope.self_user_ids().any(|id| id == user) {
            debug!(user, "Ignoring our own message");
            return None;
        }

        let channel = event.channel.as_deref()?;
        let kind = ChannelKind::from_slack(event.channel_type.as_deref());
        if channel != self.trivia_channel && kind != ChannelKind::DirectMessage {
            debug!(channel, "Ignoring message outside the trivia channel");
            return None;
        }

        Some(CanonicalMessage::new(
            user,
            event.text.as_deref()?,
            event.ts.as_deref()?,
            channel,
            kind,
        ))
    }
}
