//! Interfaces between the connector and the trivia engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::error::EngineResult;
use crate::common::{CanonicalMessage, QuestionRecord};
use crate::config::types::TriviaConfig;

/// The external game engine.
#[async_trait]
pub trait TriviaEngine: Send + Sync {
    /// Hand a chat message to the engine. `payload` comes back in events
    /// that refer to this message.
    async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
        payload: CanonicalMessage,
    ) -> EngineResult<()>;
}

/// Everything the engine can ask the chat side to do.
#[async_trait]
pub trait EngineEvents: Send + Sync {
    /// A message contained the right answer.
    async fn correct_answer(&self, message: &CanonicalMessage);

    /// A message was rejected; `text` explains why.
    async fn error(&self, message: &CanonicalMessage, text: &str);

    /// Name to show for a user id.
    async fn display_name(&self, user_id: &str) -> String;

    /// Post free text to the trivia channel.
    async fn post_message(&self, text: &str);

    /// Post a finished question to the trivia channel.
    async fn post_question(&self, question: &QuestionRecord);

    /// Reply in the conversation the message came from.
    async fn post_reply(&self, text: &str, message: &CanonicalMessage);

    /// Wrap tabular engine output before it is posted.
    fn pre_format(&self, text: &str) -> String;
}

/// Lines written to the engine's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineRequest {
    Init {
        platform: String,
        settings: TriviaConfig,
    },
    Message {
        user_id: String,
        text: String,
        payload: CanonicalMessage,
    },
    DisplayName {
        request_id: u64,
        display_name: String,
    },
    PreFormat {
        request_id: u64,
        text: String,
    },
}

/// Lines read from the engine's stdout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    CorrectAnswer {
        payload: CanonicalMessage,
    },
    Error {
        payload: CanonicalMessage,
        text: String,
    },
    PostMessage {
        text: String,
    },
    PostQuestion {
        question: QuestionRecord,
    },
    PostReply {
        text: String,
        payload: CanonicalMessage,
    },
    PreFormat {
        request_id: u64,
        text: String,
    },
    DisplayNameQuery {
        request_id: u64,
        user_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ChannelKind;

    #[test]
    fn test_message_request_wire_format() {
        let request = EngineRequest::Message {
            user_id: "U1".to_string(),
            text: "plato".to_string(),
            payload: CanonicalMessage::new("U1", "plato", "1.0", "C1", ChannelKind::Channel),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["user_id"], "U1");
        assert_eq!(value["payload"]["channel_id"], "C1");
    }

    #[test]
    fn test_init_omits_channel() {
        let mut settings = TriviaConfig::default();
        settings.channel = "C1".to_string();
        let request = EngineRequest::Init {
            platform: "T1".to_string(),
            settings,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["settings"]["database_path"], "trivia.db");
        assert!(value["settings"].get("channel").is_none());
    }

    #[test]
    fn test_parse_events() {
        let event: EngineEvent = serde_json::from_str(
            r#"{"event": "display_name_query", "request_id": 7, "user_id": "U1"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            EngineEvent::DisplayNameQuery {
                request_id: 7,
                user_id: "U1".to_string()
            }
        );

        let event: EngineEvent = serde_json::from_str(
            r#"{"event": "error", "text": "Too soon", "payload":
                {"user_id": "U1", "text": "new", "timestamp": "1.0",
                 "channel_id": "D1", "channel_kind": "im"}}"#,
        )
        .unwrap();
        match event {
            EngineEvent::Error { payload, text } => {
                assert_eq!(text, "Too soon");
                assert_eq!(payload.channel_kind(), ChannelKind::DirectMessage);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
