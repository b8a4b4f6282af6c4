//! Dispatch between Slack and the trivia engine.
//!
//! [`Dispatcher`] drains Socket Mode envelopes, filters them and routes
//! each canonical message to the self-test or to the engine.
//! [`SlackResponder`] is the other direction: it implements the engine's
//! event interface on top of the Slack Web API.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::common::{CanonicalMessage, QuestionRecord};
use crate::game::formatter::{format_question, pre_format};
use crate::game::{EngineEvents, TriviaEngine};
use crate::slack::commands::{is_self_test, run_self_test};
use crate::slack::event::SocketEnvelope;
use crate::slack::{ChatOutbound, DisplayNames};

use super::filter::MessageFilter;

/// Where an envelope ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Filtered out.
    Ignored,
    /// Handled by the self-test.
    SelfTest,
    /// Forwarded to the engine.
    Engine,
}

/// Routes inbound envelopes.
pub struct Dispatcher {
    filter: MessageFilter,
    engine: Arc<dyn TriviaEngine>,
    outbound: Arc<dyn ChatOutbound>,
    names: Arc<dyn DisplayNames>,
}

impl Dispatcher {
    pub fn new(
        filter: MessageFilter,
        engine: Arc<dyn TriviaEngine>,
        outbound: Arc<dyn ChatOutbound>,
        names: Arc<dyn DisplayNames>,
    ) -> Self {
        Self {
            filter,
            engine,
            outbound,
            names,
        }
    }

    /// Process envelopes until the socket side hangs up.
    pub async fn run(&self, mut envelope_rx: mpsc::UnboundedReceiver<SocketEnvelope>) {
        while let Some(envelope) = envelope_rx.recv().await {
            self.handle_envelope(&envelope).await;
        }
        info!("Dispatcher stopped");
    }

    pub async fn handle_envelope(&self, envelope: &SocketEnvelope) -> Dispatched {
        let Some(message) = self.filter.parse(envelope) else {
            return Dispatched::Ignored;
        };

        if is_self_test(message.text()) {
            // Several Slack round trips; keep them off the dispatch loop
            let outbound = Arc::clone(&self.outbound);
            let names = Arc::clone(&self.names);
            tokio::spawn(async move {
                run_self_test(outbound.as_ref(), names.as_ref(), &message).await;
            });
            return Dispatched::SelfTest;
        }

        debug!(
            user = message.user_id(),
            channel = message.channel_id(),
            "Forwarding message to engine"
        );
        let user_id = message.user_id().to_string();
        let text = message.text().to_string();
        if let Err(e) = self.engine.handle_message(&user_id, &text, message).await {
            error!("Failed to hand message to engine: {}", e);
        }
        Dispatched::Engine
    }
}

/// Carries out engine events in Slack.
pub struct SlackResponder {
    outbound: Arc<dyn ChatOutbound>,
    names: Arc<dyn DisplayNames>,
    trivia_channel: String,
}

impl SlackResponder {
    pub fn new(
        outbound: Arc<dyn ChatOutbound>,
        names: Arc<dyn DisplayNames>,
        trivia_channel: impl Into<String>,
    ) -> Self {
        Self {
            outbound,
            names,
            trivia_channel: trivia_channel.into(),
        }
    }

    async fn post(&self, channel: &str, text: &str) {
        if let Err(e) = self.outbound.post_message(channel, text).await {
            error!("Failed to post to {}: {}", channel, e);
        }
    }

    async fn react(&self, channel: &str, timestamp: &str, name: &str) {
        if let Err(e) = self.outbound.add_reaction(channel, timestamp, name).await {
            error!("Failed to add :{}: to {} in {}: {}", name, timestamp, channel, e);
        }
    }
}

#[async_trait]
impl EngineEvents for SlackResponder {
    async fn correct_answer(&self, message: &CanonicalMessage) {
        self.react(&self.trivia_channel, message.timestamp(), "white_check_mark")
            .await;
    }

    async fn error(&self, message: &CanonicalMessage, text: &str) {
        self.react(message.channel_id(), message.timestamp(), "x").await;
        if let Err(e) = self
            .outbound
            .post_ephemeral(message.channel_id(), message.user_id(), text)
            .await
        {
            error!("Failed to send error to {}: {}", message.user_id(), e);
        }
    }

    async fn display_name(&self, user_id: &str) -> String {
        self.names.display_name(user_id).await
    }

    async fn post_message(&self, text: &str) {
        self.post(&self.trivia_channel, text).await;
    }

    async fn post_question(&self, question: &QuestionRecord) {
        let text = format_question(question, self.names.as_ref()).await;
        self.post(&self.trivia_channel, &text).await;
    }

    async fn post_reply(&self, text: &str, message: &CanonicalMessage) {
        self.post(message.channel_id(), text).await;
    }

    fn pre_format(&self, text: &str) -> String {
        pre_format(text)
    }
}
