//! Socket Mode connection.
//!
//! Keeps a WebSocket open to Slack, acknowledges every envelope and
//! forwards them to the dispatcher. Connections are refreshed when Slack
//! asks (`disconnect` frames) and re-established with backoff on failure.

use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::common::error::SlackResult;
use crate::slack::event::SocketEnvelope;
use crate::slack::web::SlackWebClient;

/// Why a session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Slack asked us to reconnect, or closed the socket.
    Reconnect,
    /// Shutdown was requested or nobody is listening for envelopes.
    Stop,
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5 * 60);

/// Create an exponential backoff iterator for reconnection.
/// 5s initial, 5min max, factor 1.5, with jitter, unlimited retries.
fn socket_backoff() -> ExponentialBackoff {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_factor(1.5)
        .with_jitter()
        .without_max_times()
        .build()
}

/// Delays between reconnect attempts.
struct ReconnectDelay {
    backoff: ExponentialBackoff,
}

impl ReconnectDelay {
    fn new() -> Self {
        Self {
            backoff: socket_backoff(),
        }
    }

    /// Start over from the shortest delay.
    fn connected(&mut self) {
        self.backoff = socket_backoff();
    }

    fn next_delay(&mut self) -> Duration {
        self.backoff.next().unwrap_or(MAX_RECONNECT_DELAY)
    }
}

/// Socket Mode client.
pub struct SocketModeClient {
    web: Arc<SlackWebClient>,
}

impl SocketModeClient {
    pub fn new(web: Arc<SlackWebClient>) -> Self {
        Self { web }
    }

    /// Run until shutdown, reconnecting as needed.
    pub async fn run(
        &self,
        envelope_tx: mpsc::UnboundedSender<SocketEnvelope>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut reconnect = ReconnectDelay::new();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal detected, stopping Socket Mode client");
                break;
            }

            match self.connect().await {
                Ok(socket) => {
                    // Reset backoff on successful connection
                    reconnect.connected();
                    match self.session(socket, &envelope_tx, &mut shutdown_rx).await {
                        Ok(SessionEnd::Stop) => break,
                        Ok(SessionEnd::Reconnect) => {
                            info!("Socket Mode session ended, reconnecting");
                            continue;
                        }
                        Err(e) => error!("Socket Mode connection lost: {}", e),
                    }
                }
                Err(e) => error!("Socket Mode connection failed: {}", e),
            }

            let delay = reconnect.next_delay();
            info!("Reconnecting in {:.1} seconds...", delay.as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received during backoff");
                        break;
                    }
                }
            }
        }

        info!("Socket Mode client stopped");
    }

    async fn connect(&self) -> SlackResult<SocketStream> {
        let url = self.web.open_connection().await?;
        let (socket, _) = connect_async(url.as_str()).await?;
        info!("Socket Mode connection established");
        Ok(socket)
    }

    async fn session(
        &self,
        mut socket: SocketStream,
        envelope_tx: &mpsc::UnboundedSender<SocketEnvelope>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SlackResult<SessionEnd> {
        loop {
            tokio::select! {
                frame = socket.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(close))) => {
                            info!("Socket closed by Slack: {:?}", close);
                            return Ok(SessionEnd::Reconnect);
                        }
                        // Ping/pong is answered by tungstenite
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Reconnect),
                    };

                    let frame: Value = match serde_json::from_str(text.as_str()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Ignoring non-JSON Socket Mode frame: {}", e);
                            continue;
                        }
                    };

                    if let Some(ack) = acknowledgement(&frame) {
                        socket.send(Message::Text(ack.into())).await?;
                    }

                    match route_frame(frame) {
                        FrameAction::Forward(envelope) => {
                            if envelope_tx.send(envelope).is_err() {
                                warn!("Dispatcher is gone, closing Socket Mode session");
                                return Ok(SessionEnd::Stop);
                            }
                        }
                        FrameAction::Reconnect => return Ok(SessionEnd::Reconnect),
                        FrameAction::Ignore => {}
                    }
                }

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Closing Socket Mode connection");
                        if let Err(e) = socket.close(None).await {
                            debug!("Error closing socket: {}", e);
                        }
                        return Ok(SessionEnd::Stop);
                    }
                }
            }
        }
    }
}

/// What to do with a decoded frame.
#[derive(Debug)]
enum FrameAction {
    Forward(SocketEnvelope),
    Reconnect,
    Ignore,
}

/// Ack body for frames that carry an envelope id.
fn acknowledgement(frame: &Value) -> Option<String> {
    let envelope_id = frame.get("envelope_id")?.as_str()?;
    Some(json!({ "envelope_id": envelope_id }).to_string())
}

fn route_frame(frame: Value) -> FrameAction {
    let envelope: SocketEnvelope = match serde_json::from_value(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Ignoring undecodable Socket Mode frame: {}", e);
            return FrameAction::Ignore;
        }
    };

    match envelope.kind.as_str() {
        "hello" => {
            info!("Socket Mode ready");
            FrameAction::Ignore
        }
        "disconnect" => {
            info!(
                "Slack requested reconnect: {}",
                envelope.reason.as_deref().unwrap_or("no reason given")
            );
            FrameAction::Reconnect
        }
        _ => FrameAction::Forward(envelope),
    }
}
