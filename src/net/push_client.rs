//! Push-channel client: one websocket, reconnected forever on a fixed delay.
//!
//! The `PushClient` owns the websocket lifecycle in a single tokio task:
//! connect, decode inbound envelopes, publish connection status, and
//! reconnect after every close. Parsed events go to exactly one subscriber
//! over an unbounded channel, in arrival order.
//!
//! LIFECYCLE
//! =========
//! 1. Status → `Connecting`, open the socket
//! 2. Open → `Connected`; every text/binary message is parsed and forwarded
//! 3. Close, transport error or failed connect → `Disconnected`
//! 4. Sleep the reconnect delay, then back to 1
//!
//! A new socket is only opened after the previous stream has been dropped,
//! so at most one connection exists at any time. The delay never grows and
//! there is no retry cap: the REST fetch stays the source of truth and this
//! channel is best effort.
//!
//! ERROR HANDLING
//! ==============
//! Malformed messages are logged and dropped. Transport errors are logged and
//! end the session, which feeds the reconnect loop. Nothing is surfaced to
//! the subscriber except well-formed events.

#[cfg(test)]
#[path = "push_client_test.rs"]
mod push_client_test;

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::types::PushEvent;
use crate::config::ClientConfig;
use crate::state::catalog::ConnectionStatus;

/// Errors observed on the push channel. Logged, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket transport failed: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("malformed push message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Receiving half of the event channel handed to the single subscriber.
pub type EventStream = mpsc::UnboundedReceiver<PushEvent>;

/// How one connection session ended.
#[derive(Debug)]
enum SessionEnd {
    /// Teardown was requested or nobody is listening any more.
    Shutdown,
    /// The peer closed the stream.
    Closed,
    Failed(PushError),
}

/// Handle to the background push-channel task.
///
/// Dropping the handle has the same effect as [`PushClient::close`] without
/// waiting for the task to finish.
pub struct PushClient {
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PushClient {
    /// Start the connection loop against `url`.
    #[must_use]
    pub fn spawn(url: impl Into<String>, reconnect_delay: Duration) -> (Self, EventStream) {
        let url = url.into();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_push_loop(url, reconnect_delay, status_tx, events_tx, shutdown_rx));

        let client = Self { status: status_rx, shutdown: Some(shutdown_tx), task: Some(task) };
        (client, events_rx)
    }

    /// Start the connection loop using the configured address and delay.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> (Self, EventStream) {
        Self::spawn(config.ws_url.clone(), config.reconnect_delay)
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// A receiver that observes every status transition.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Cancel any pending reconnect, close the live socket, and wait for the
    /// background task to exit. No events are delivered afterwards.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "push client task ended abnormally");
            }
        }
    }
}

/// Connection loop with a fixed reconnect delay.
async fn run_push_loop(
    url: String,
    reconnect_delay: Duration,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<PushEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let delay_ms = u64::try_from(reconnect_delay.as_millis()).unwrap_or(u64::MAX);

    loop {
        status.send_replace(ConnectionStatus::Connecting);
        let end = connect_and_run(&url, &status, &events, &mut shutdown).await;
        status.send_replace(ConnectionStatus::Disconnected);

        match end {
            SessionEnd::Shutdown => {
                info!(%url, "push channel shut down");
                return;
            }
            SessionEnd::Closed => info!(%url, "push channel disconnected"),
            SessionEnd::Failed(e) => warn!(%url, error = %e, "push channel error"),
        }

        debug!(%url, delay_ms, "push channel reconnect scheduled");
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!(%url, "push channel shut down");
                return;
            }
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// Open one socket and pump messages until it ends.
async fn connect_and_run(
    url: &str,
    status: &watch::Sender<ConnectionStatus>,
    events: &mpsc::UnboundedSender<PushEvent>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let connected = tokio::select! {
        biased;
        _ = &mut *shutdown => return SessionEnd::Shutdown,
        result = connect_async(url) => result,
    };
    let mut stream = match connected {
        Ok((stream, _)) => stream,
        Err(e) => return SessionEnd::Failed(PushError::Connect(Box::new(e))),
    };

    status.send_replace(ConnectionStatus::Connected);
    info!(%url, "push channel connected");

    loop {
        let message = tokio::select! {
            biased;
            _ = &mut *shutdown => {
                if let Err(e) = stream.close(None).await {
                    debug!(error = %e, "push channel close handshake failed");
                }
                return SessionEnd::Shutdown;
            }
            message = stream.next() => message,
        };

        let delivered = match message {
            None => return SessionEnd::Closed,
            Some(Ok(Message::Text(text))) => deliver(text.as_str().as_bytes(), events),
            Some(Ok(Message::Binary(bytes))) => deliver(&bytes, events),
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "push channel close frame received");
                true
            }
            Some(Ok(_)) => true,
            Some(Err(e)) => return SessionEnd::Failed(PushError::Transport(Box::new(e))),
        };

        if !delivered {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "push channel close handshake failed");
            }
            return SessionEnd::Shutdown;
        }
    }
}

/// Parse and forward one message. Returns `false` once the subscriber is gone.
fn deliver(payload: &[u8], events: &mpsc::UnboundedSender<PushEvent>) -> bool {
    match PushEvent::parse(payload) {
        Ok(event) => {
            debug!(kind = event.kind(), "push event received");
            if events.send(event).is_err() {
                info!("push subscriber dropped");
                return false;
            }
        }
        Err(e) => {
            warn!(error = %PushError::Malformed(e), bytes = payload.len(), "discarding push message");
        }
    }
    true
}
