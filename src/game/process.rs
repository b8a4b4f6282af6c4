//! Trivia engine running as a child process.
//!
//! The engine speaks line-delimited JSON: [`EngineRequest`]s go to its
//! stdin, [`EngineEvent`]s come back on its stdout. Posting events are
//! handled in arrival order; display name queries are answered on their
//! own tasks so a slow `users.info` call does not stall the stream.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::common::error::{EngineError, EngineResult};
use crate::common::CanonicalMessage;
use crate::config::types::EngineConfig;
use crate::game::engine::{EngineEvent, EngineEvents, EngineRequest, TriviaEngine};

/// Longest engine line accepted before it is discarded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// How many forwarded messages events may still refer to.
const TRACKED_MESSAGES: usize = 1024;

/// Handle for sending requests to a running engine.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    requests: mpsc::UnboundedSender<EngineRequest>,
    sent: SentMessages,
}

/// Messages recently handed to the engine.
///
/// Payloads echoed back in events must match one of these, so the engine
/// cannot make us react or reply to a message that never passed the filter.
#[derive(Debug, Clone, Default)]
struct SentMessages {
    recent: Arc<Mutex<VecDeque<CanonicalMessage>>>,
}

impl SentMessages {
    async fn remember(&self, message: CanonicalMessage) {
        let mut recent = self.recent.lock().await;
        if recent.len() >= TRACKED_MESSAGES {
            recent.pop_front();
        }
        recent.push_back(message);
    }

    async fn knows(&self, message: &CanonicalMessage) -> bool {
        let known = self.recent.lock().await.contains(message);
        if !known {
            warn!(
                user = message.user_id(),
                channel = message.channel_id(),
                "Ignoring engine event for a message we never sent"
            );
        }
        known
    }
}

impl ProcessEngine {
    /// Start the engine process and send it `init`.
    ///
    /// The returned task finishes when the engine closes its stdout.
    pub fn spawn(
        config: &EngineConfig,
        init: EngineRequest,
        events: Arc<dyn EngineEvents>,
    ) -> EngineResult<(Self, JoinHandle<EngineResult<()>>)> {
        info!("Starting trivia engine: {} {}", config.command, config.args.join(" "));

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;

        let (engine, reader) = Self::attach(stdout, stdin, events);
        engine.send(init)?;

        let task = tokio::spawn(async move {
            let result = match reader.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Engine reader task panicked: {}", e);
                    Err(EngineError::Closed)
                }
            };
            match child.wait().await {
                Ok(status) => info!("Trivia engine exited: {}", status),
                Err(e) => warn!("Failed to reap trivia engine: {}", e),
            }
            result
        });

        Ok((engine, task))
    }

    /// Run the protocol over an arbitrary reader/writer pair.
    pub fn attach<R, W>(
        reader: R,
        writer: W,
        events: Arc<dyn EngineEvents>,
    ) -> (Self, JoinHandle<EngineResult<()>>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (requests, requests_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = write_requests(writer, requests_rx).await {
                error!("Engine writer stopped: {}", e);
            }
        });

        let sent = SentMessages::default();
        let replies = requests.clone();
        let reader = tokio::spawn(read_events(reader, events, replies, sent.clone()));

        (Self { requests, sent }, reader)
    }

    fn send(&self, request: EngineRequest) -> EngineResult<()> {
        self.requests.send(request).map_err(|_| EngineError::Closed)
    }
}

#[async_trait]
impl TriviaEngine for ProcessEngine {
    async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
        payload: CanonicalMessage,
    ) -> EngineResult<()> {
        self.sent.remember(payload.clone()).await;
        self.send(EngineRequest::Message {
            user_id: user_id.to_string(),
            text: text.to_string(),
            payload,
        })
    }
}

async fn write_requests<W>(
    writer: W,
    mut requests: mpsc::UnboundedReceiver<EngineRequest>,
) -> EngineResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(request) = requests.recv().await {
        let line = serde_json::to_string(&request)?;
        sink.send(line).await?;
    }
    Ok(())
}

async fn read_events<R>(
    reader: R,
    events: Arc<dyn EngineEvents>,
    replies: mpsc::UnboundedSender<EngineRequest>,
    sent: SentMessages,
) -> EngineResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, EngineLines::new());

    while let Some(line) = lines.next().await {
        let line = match line? {
            EngineLine::Text(line) => line,
            EngineLine::Invalid(reason) => {
                warn!("Skipping unreadable engine line: {}", reason);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<EngineEvent>(&line) {
            Ok(event) => dispatch_event(event, &events, &replies, &sent).await,
            Err(e) => warn!("Skipping malformed engine line ({}): {}", e, line),
        }
    }

    info!("Trivia engine closed its output");
    Ok(())
}

/// One line of engine output.
#[derive(Debug, PartialEq, Eq)]
enum EngineLine {
    Text(String),
    /// Not UTF-8 or over [`MAX_LINE_LENGTH`]; already consumed.
    Invalid(&'static str),
}

/// Line decoder that reports bad lines as items instead of stream errors,
/// so only I/O failures end the stream.
struct EngineLines {
    inner: LinesCodec,
}

impl EngineLines {
    fn new() -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    fn recover(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<EngineLine>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(EngineLine::Text)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(EngineLine::Invalid("line too long")))
            }
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(EngineLine::Invalid("not valid UTF-8")))
            }
            Err(e) => Err(e),
        }
    }
}

impl Decoder for EngineLines {
    type Item = EngineLine;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<EngineLine>, LinesCodecError> {
        Self::recover(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<EngineLine>, LinesCodecError> {
        Self::recover(self.inner.decode_eof(buf))
    }
}

async fn dispatch_event(
    event: EngineEvent,
    events: &Arc<dyn EngineEvents>,
    replies: &mpsc::UnboundedSender<EngineRequest>,
    sent: &SentMessages,
) {
    match event {
        EngineEvent::CorrectAnswer { payload } => {
            if sent.knows(&payload).await {
                events.correct_answer(&payload).await;
            }
        }
        EngineEvent::Error { payload, text } => {
            if sent.knows(&payload).await {
                events.error(&payload, &text).await;
            }
        }
        EngineEvent::PostMessage { text } => events.post_message(&text).await,
        EngineEvent::PostQuestion { question } => events.post_question(&question).await,
        EngineEvent::PostReply { text, payload } => {
            if sent.knows(&payload).await {
                events.post_reply(&text, &payload).await;
            }
        }
        EngineEvent::PreFormat { request_id, text } => {
            let text = events.pre_format(&text);
            reply(replies, EngineRequest::PreFormat { request_id, text });
        }
        EngineEvent::DisplayNameQuery {
            request_id,
            user_id,
        } => {
            let events = Arc::clone(events);
            let replies = replies.clone();
            tokio::spawn(async move {
                let display_name = events.display_name(&user_id).await;
                reply(
                    &replies,
                    EngineRequest::DisplayName {
                        request_id,
                        display_name,
                    },
                );
            });
        }
    }
}

fn reply(replies: &mpsc::UnboundedSender<EngineRequest>, request: EngineRequest) {
    if replies.send(request).is_err() {
        debug!("Engine link closed before reply could be sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChannelKind, QuestionRecord};
    use crate::game::formatter::pre_format;
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    #[derive(Default)]
    struct RecordingEvents {
        log: Mutex<Vec<String>>,
    }

    impl RecordingEvents {
        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EngineEvents for RecordingEvents {
        async fn correct_answer(&self, message: &CanonicalMessage) {
            self.record(format!("correct {}", message.timestamp()));
        }

        async fn error(&self, message: &CanonicalMessage, text: &str) {
            self.record(format!("error {} {}", message.user_id(), text));
        }

        async fn display_name(&self, user_id: &str) -> String {
            format!("name-{}", user_id)
        }

        async fn post_message(&self, text: &str) {
            self.record(format!("post {}", text));
        }

        async fn post_question(&self, question: &QuestionRecord) {
            self.record(format!("question {}", question.winning_answer));
        }

        async fn post_reply(&self, text: &str, message: &CanonicalMessage) {
            self.record(format!("reply {} {}", message.channel_id(), text));
        }

        fn pre_format(&self, text: &str) -> String {
            pre_format(text)
        }
    }

    /// The engine's end of both pipes.
    struct FakeEngine {
        requests: FramedRead<DuplexStream, LinesCodec>,
        events: FramedWrite<DuplexStream, LinesCodec>,
    }

    impl FakeEngine {
        async fn emit(&mut self, line: &str) {
            self.events.send(line.to_string()).await.unwrap();
        }

        async fn next_request(&mut self) -> EngineRequest {
            let line = self.requests.next().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    fn connect() -> (
        ProcessEngine,
        JoinHandle<EngineResult<()>>,
        FakeEngine,
        Arc<RecordingEvents>,
    ) {
        let (engine_stdin, connector_writer) = duplex(4096);
        let (connector_reader, engine_stdout) = duplex(4096);
        let events = Arc::new(RecordingEvents::default());

        let (engine, reader) = ProcessEngine::attach(connector_reader, connector_writer, events.clone());
        let fake = FakeEngine {
            requests: FramedRead::new(engine_stdin, LinesCodec::new()),
            events: FramedWrite::new(engine_stdout, LinesCodec::new()),
        };

        (engine, reader, fake, events)
    }

    const PAYLOAD: &str = r#"{"user_id": "U1", "text": "plato", "timestamp": "1.5", "channel_id": "C1", "channel_kind": "channel"}"#;

    #[tokio::test]
    async fn test_handle_message_writes_request() {
        let (engine, _reader, mut fake, _events) = connect();
        let payload = CanonicalMessage::new("U1", "plato", "1.5", "C1", ChannelKind::Channel);

        tokio_test::assert_ok!(engine.handle_message("U1", "plato", payload.clone()).await);

        assert_eq!(
            fake.next_request().await,
            EngineRequest::Message {
                user_id: "U1".to_string(),
                text: "plato".to_string(),
                payload,
            }
        );
    }

    fn sent_payload() -> CanonicalMessage {
        CanonicalMessage::new("U1", "plato", "1.5", "C1", ChannelKind::Channel)
    }

    #[tokio::test]
    async fn test_events_dispatched_in_order() {
        let (engine, _reader, mut fake, events) = connect();
        tokio_test::assert_ok!(engine.handle_message("U1", "plato", sent_payload()).await);
        fake.next_request().await;

        fake.emit(r#"{"event": "post_message", "text": "Round starts"}"#).await;
        fake.emit(&format!(r#"{{"event": "correct_answer", "payload": {}}}"#, PAYLOAD)).await;
        fake.emit(&format!(
            r#"{{"event": "post_reply", "text": "Your score: 5", "payload": {}}}"#,
            PAYLOAD
        ))
        .await;
        // The reply to this query arrives after the events above were handled
        fake.emit(r#"{"event": "pre_format", "request_id": 3, "text": "table"}"#).await;

        assert_eq!(
            fake.next_request().await,
            EngineRequest::PreFormat {
                request_id: 3,
                text: "```table```".to_string()
            }
        );
        assert_eq!(
            events.log(),
            vec!["post Round starts", "correct 1.5", "reply C1 Your score: 5"]
        );
    }

    #[tokio::test]
    async fn test_events_for_unknown_messages_dropped() {
        let (engine, _reader, mut fake, events) = connect();
        tokio_test::assert_ok!(engine.handle_message("U1", "plato", sent_payload()).await);
        fake.next_request().await;

        let forged = r#"{"user_id": "U1", "text": "plato", "timestamp": "1.5", "channel_id": "CGENERAL", "channel_kind": "channel"}"#;
        fake.emit(&format!(r#"{{"event": "correct_answer", "payload": {}}}"#, forged)).await;
        fake.emit(&format!(
            r#"{{"event": "post_reply", "text": "hello", "payload": {}}}"#,
            forged
        ))
        .await;
        fake.emit(&format!(r#"{{"event": "error", "text": "no", "payload": {}}}"#, PAYLOAD)).await;
        fake.emit(r#"{"event": "pre_format", "request_id": 5, "text": "x"}"#).await;

        fake.next_request().await;
        assert_eq!(events.log(), vec!["error U1 no"]);
    }

    #[tokio::test]
    async fn test_display_name_query_answered() {
        let (_engine, _reader, mut fake, _events) = connect();

        fake.emit(r#"{"event": "display_name_query", "request_id": 11, "user_id": "U7"}"#).await;

        assert_eq!(
            fake.next_request().await,
            EngineRequest::DisplayName {
                request_id: 11,
                display_name: "name-U7".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_non_utf8_line_does_not_end_link() {
        let (_engine, reader, mut fake, events) = connect();

        fake.events
            .get_mut()
            .write_all(b"\xff\xfe garbage\n")
            .await
            .unwrap();
        fake.emit(r#"{"event": "post_message", "text": "still alive"}"#).await;
        fake.emit(r#"{"event": "pre_format", "request_id": 2, "text": "x"}"#).await;

        fake.next_request().await;
        assert_eq!(events.log(), vec!["post still alive"]);
        assert!(!reader.is_finished());
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut codec = EngineLines::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&vec![b'x'; MAX_LINE_LENGTH + 1]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(EngineLine::Invalid("line too long"))
        );

        buf.extend_from_slice(b"xxx\nok\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(EngineLine::Text("ok".to_string()))
        );
    }

    #[tokio::test]
    async fn test_question_with_text_value_posted() {
        let (_engine, _reader, mut fake, events) = connect();

        fake.emit(
            r#"{"event": "post_question", "question": {"winning_answer": "Plato", "year": "1999", "category": "Philosophy", "value": "$200", "question": "Who wrote The Republic?"}}"#,
        )
        .await;
        fake.emit(r#"{"event": "pre_format", "request_id": 4, "text": "x"}"#).await;

        fake.next_request().await;
        assert_eq!(events.log(), vec!["question Plato"]);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let (_engine, _reader, mut fake, events) = connect();

        fake.emit("this is not json").await;
        fake.emit(r#"{"event": "unknown_event"}"#).await;
        fake.emit(r#"{"event": "post_message", "text": "still alive"}"#).await;
        fake.emit(r#"{"event": "pre_format", "request_id": 1, "text": "x"}"#).await;

        fake.next_request().await;
        assert_eq!(events.log(), vec!["post still alive"]);
    }

    #[tokio::test]
    async fn test_reader_finishes_when_engine_closes() {
        let (engine, reader, fake, _events) = connect();
        drop(fake);

        tokio_test::assert_ok!(reader.await.unwrap());
        // Writer may still be draining; sending must not panic either way
        let _ = engine.handle_message(
            "U1",
            "late",
            CanonicalMessage::new("U1", "late", "2.0", "C1", ChannelKind::Channel),
        )
        .await;
    }
}
