//! WebSocket transport: one task per connection, events over a channel

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Identifies one socket instance; events from older instances are stale
pub type ConnectionId = u64;

/// What happened on a socket
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// Handshake finished, frames may flow
    Opened,
    /// Inbound text frame
    Frame(String),
    /// Socket closed (by either side)
    Closed { code: Option<u16>, reason: String },
    /// Connect or I/O failure; the socket is gone
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub conn: ConnectionId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(conn: ConnectionId, kind: TransportEventKind) -> Self {
        Self { conn, kind }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection task has stopped")]
    Gone,
}

/// Handle to a live (or pending) socket
pub trait Link: Send {
    /// Queue a text frame; never blocks
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Ask the socket to close; safe to call more than once
    fn close(&self);
}

/// Opens sockets. Events for every socket it opens arrive on one channel,
/// tagged with the [`ConnectionId`] passed to `open`.
pub trait Connector: Send {
    fn open(&self, conn: ConnectionId, url: &str) -> Box<dyn Link>;
}

#[derive(Debug)]
enum LinkCommand {
    Text(String),
    Close,
}

/// [`Link`] backed by a tokio-tungstenite connection task
pub struct WsLink {
    commands: mpsc::UnboundedSender<LinkCommand>,
}

impl Link for WsLink {
    fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.commands
            .send(LinkCommand::Text(text))
            .map_err(|_| TransportError::Gone)
    }

    fn close(&self) {
        let _ = self.commands.send(LinkCommand::Close);
    }
}

/// [`Connector`] that dials real WebSocket servers (`ws://` or `wss://`).
///
/// Must be used from within a tokio runtime.
pub struct WsConnector {
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WsConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (Self { events }, events_rx)
    }
}

impl Connector for WsConnector {
    fn open(&self, conn: ConnectionId, url: &str) -> Box<dyn Link> {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(
            conn,
            url.to_string(),
            commands_rx,
            self.events.clone(),
        ));
        Box::new(WsLink { commands })
    }
}

/// Drive one socket until it closes or fails
async fn run_connection(
    conn: ConnectionId,
    url: String,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |kind| {
        let _ = events.send(TransportEvent::new(conn, kind));
    };

    let socket = match connect_async(url.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            error!(conn, url = %url, error = %e, "WebSocket connect failed");
            emit(TransportEventKind::Failed(e.to_string()));
            return;
        }
    };

    info!(conn, url = %url, "WebSocket connected");
    emit(TransportEventKind::Opened);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(conn, error = %e, "WebSocket send failed");
                        emit(TransportEventKind::Failed(e.to_string()));
                        break;
                    }
                }
                Some(LinkCommand::Close) | None => {
                    debug!(conn, "Closing WebSocket locally");
                    let _ = sink.close().await;
                    emit(TransportEventKind::Closed {
                        code: None,
                        reason: "closed locally".to_string(),
                    });
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => emit(TransportEventKind::Frame(text)),
                Some(Ok(Message::Binary(_))) => {
                    warn!(conn, "Received binary message, ignoring");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    info!(conn, ?code, reason = %reason, "Server closed WebSocket");
                    emit(TransportEventKind::Closed { code, reason });
                    break;
                }
                Some(Err(e)) => {
                    error!(conn, error = %e, "WebSocket error");
                    emit(TransportEventKind::Failed(e.to_string()));
                    break;
                }
                None => {
                    emit(TransportEventKind::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }
}

/// In-memory transport used by unit tests
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct LinkLog {
        pub sent: Vec<String>,
        pub closed: bool,
    }

    /// Records every socket it opens and every frame sent on them
    #[derive(Clone, Default)]
    pub struct RecordingConnector {
        pub opened: Arc<Mutex<Vec<(ConnectionId, String, Arc<Mutex<LinkLog>>)>>>,
    }

    impl RecordingConnector {
        pub fn open_count(&self) -> usize {
            self.opened.lock().len()
        }

        pub fn last_conn(&self) -> ConnectionId {
            self.opened.lock().last().map(|(conn, _, _)| *conn).unwrap_or_default()
        }

        /// Frames sent on the most recent socket
        pub fn sent(&self) -> Vec<String> {
            self.opened
                .lock()
                .last()
                .map(|(_, _, log)| log.lock().sent.clone())
                .unwrap_or_default()
        }

        pub fn last_closed(&self) -> bool {
            self.opened
                .lock()
                .last()
                .map(|(_, _, log)| log.lock().closed)
                .unwrap_or(false)
        }
    }

    struct RecordingLink {
        log: Arc<Mutex<LinkLog>>,
    }

    impl Link for RecordingLink {
        fn send_text(&self, text: String) -> Result<(), TransportError> {
            let mut log = self.log.lock();
            if log.closed {
                return Err(TransportError::Gone);
            }
            log.sent.push(text);
            Ok(())
        }

        fn close(&self) {
            self.log.lock().closed = true;
        }
    }

    impl Connector for RecordingConnector {
        fn open(&self, conn: ConnectionId, url: &str) -> Box<dyn Link> {
            let log = Arc::new(Mutex::new(LinkLog::default()));
            self.opened.lock().push((conn, url.to_string(), log.clone()));
            Box::new(RecordingLink { log })
        }
    }
}
