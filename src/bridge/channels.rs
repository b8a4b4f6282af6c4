//! Bridge channel management.
//!
//! Groups the channels that connect the Socket Mode client, the
//! dispatcher and shutdown coordination.

use tokio::sync::{mpsc, watch};

use crate::slack::event::SocketEnvelope;

/// Channels for the Socket Mode client.
pub struct SocketChannels {
    /// Sender for acknowledged envelopes (Slack -> dispatcher).
    pub envelope_tx: mpsc::UnboundedSender<SocketEnvelope>,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels for the dispatcher.
pub struct DispatchChannels {
    /// Receiver for envelopes from Socket Mode.
    pub envelope_rx: mpsc::UnboundedReceiver<SocketEnvelope>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels the connector runs on.
pub struct ChannelBundle {
    pub socket: SocketChannels,
    pub dispatch: DispatchChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (envelope_tx, envelope_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            socket: SocketChannels {
                envelope_tx,
                shutdown_rx,
            },
            dispatch: DispatchChannels { envelope_rx },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
