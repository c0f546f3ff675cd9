//! Session manager: one logical connection per room, its lifecycle, and
//! resumption of a previous identity

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::store::{DurableIdentity, IdentityStore, StoredIdentity};
use crate::util::time::Millis;

use super::codec::{self, CodecError};
use super::protocol::{ClientMsg, PlayerId, ReconnectRequest, ServerEvent, Welcome};
use super::transport::{ConnectionId, Connector, Link, TransportEvent, TransportEventKind};

/// Delay between the socket opening and the resume request
pub const RESUME_SEND_DELAY_MS: Millis = 100;

/// How long to wait for an answer to the resume request
pub const RESUME_TIMEOUT_MS: Millis = 3000;

/// Color used until the server assigns one
pub const DEFAULT_COLOR: &str = "#ff4444";

/// Room used when the URL carries no `room` parameter
pub const DEFAULT_ROOM: &str = "default";

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// Socket requested, handshake pending
    Connecting,
    /// Socket live
    Open,
    /// Socket live, waiting for the server to answer a resume request
    Reconnecting,
    /// Torn down; a fresh `connect` is required
    Closed,
}

impl ConnectionState {
    /// Socket is up, possibly still settling a resume request
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Reconnecting)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// The caller closed it
    Requested,
    /// The socket closed underneath us
    Remote { code: Option<u16>, reason: String },
    /// Connect or I/O failure
    Failed(String),
}

/// Everything the session reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Socket handshake completed
    Opened,
    /// Server assigned (or handed back) our identity
    IdentityAssigned {
        player_id: PlayerId,
        color: String,
        name: String,
        resumed: bool,
    },
    /// Resume request went unanswered; continuing with the current identity
    ResumeAbandoned,
    /// A decoded server message for downstream reducers
    Server(ServerEvent),
    /// Session torn down by the socket
    Closed(CloseReason),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("url targets room `{found}` but this session belongs to room `{expected}`")]
    RoomMismatch { expected: String, found: String },
}

/// A resume request waiting for its send time
#[derive(Debug)]
struct PendingResume {
    identity: DurableIdentity,
    send_at: Millis,
}

/// This client's single logical connection for a room.
///
/// The session is the only writer of the lifecycle state and the local
/// identity. It never spawns timers: deadlines are checked in [`Session::poll`]
/// against the caller's clock, so tearing the session down cancels them.
pub struct Session {
    room: String,
    state: ConnectionState,
    local_player_id: Option<PlayerId>,
    color: String,
    display_name: String,

    store: Arc<dyn IdentityStore>,
    connector: Box<dyn Connector>,
    link: Option<Box<dyn Link>>,
    conn: Option<ConnectionId>,
    last_conn: ConnectionId,
    torn_down: bool,

    outbox: VecDeque<ClientMsg>,
    resume_candidate: Option<DurableIdentity>,
    pending_resume: Option<PendingResume>,
    resume_deadline: Option<Millis>,
}

impl Session {
    pub fn new(
        room: impl Into<String>,
        store: Arc<dyn IdentityStore>,
        connector: Box<dyn Connector>,
    ) -> Self {
        Self {
            room: room.into(),
            state: ConnectionState::Idle,
            local_player_id: None,
            color: DEFAULT_COLOR.to_string(),
            display_name: String::new(),
            store,
            connector,
            link: None,
            conn: None,
            last_conn: 0,
            torn_down: false,
            outbox: VecDeque::new(),
            resume_candidate: None,
            pending_resume: None,
            resume_deadline: None,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_live()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state == ConnectionState::Reconnecting
    }

    pub fn local_player_id(&self) -> Option<&str> {
        self.local_player_id.as_deref()
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Messages waiting for the socket to open
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    /// Open the socket for this room.
    ///
    /// Returns `Ok(false)` without touching anything if a connection is
    /// already connecting or live.
    pub fn connect(&mut self, url: &str) -> Result<bool, SessionError> {
        let found = room_from_url(url);
        if found != self.room {
            return Err(SessionError::RoomMismatch {
                expected: self.room.clone(),
                found,
            });
        }

        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting
        ) {
            warn!(
                room = %self.room,
                state = ?self.state,
                "Connection already exists or in progress, skipping"
            );
            return Ok(false);
        }

        debug_assert!(self.link.is_none(), "idle or closed session still holds a link");

        self.resume_candidate = match self.store.load(&self.room) {
            Ok(stored) => stored.map(|s| s.durable()),
            Err(e) => {
                warn!(room = %self.room, error = %e, "Failed to read stored identity");
                None
            }
        };

        self.last_conn += 1;
        let conn = self.last_conn;
        info!(room = %self.room, conn, url = %url, "Opening connection");

        self.link = Some(self.connector.open(conn, url));
        self.conn = Some(conn);
        self.torn_down = false;
        self.state = ConnectionState::Connecting;
        Ok(true)
    }

    /// Send a message, or queue it until the session is `Open`.
    ///
    /// While a resume request is outstanding the socket is up but the
    /// identity is not settled, so messages wait for it as well.
    pub fn send(&mut self, msg: ClientMsg) {
        if self.state == ConnectionState::Open {
            self.transmit(&msg);
        } else {
            self.outbox.push_back(msg);
        }
    }

    /// Apply one transport event
    pub fn handle_transport(&mut self, event: TransportEvent, now: Millis) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if self.conn != Some(event.conn) {
            debug!(room = %self.room, conn = event.conn, "Ignoring event from stale connection");
            return events;
        }

        match event.kind {
            TransportEventKind::Opened => self.on_open(now, &mut events),
            TransportEventKind::Frame(text) => match codec::decode(&text) {
                Ok(server_event) => self.on_server_event(server_event, &mut events),
                Err(e) => self.on_malformed(&e),
            },
            TransportEventKind::Closed { code, reason } => {
                info!(room = %self.room, ?code, reason = %reason, "Connection closed");
                if self.teardown() {
                    events.push(SessionEvent::Closed(CloseReason::Remote { code, reason }));
                }
            }
            TransportEventKind::Failed(message) => {
                error!(room = %self.room, error = %message, "Connection failed");
                if self.teardown() {
                    events.push(SessionEvent::Closed(CloseReason::Failed(message)));
                }
            }
        }

        events
    }

    /// Fire due deadlines: the delayed resume request and its timeout
    pub fn poll(&mut self, now: Millis) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.state != ConnectionState::Reconnecting {
            return events;
        }

        if self.pending_resume.as_ref().is_some_and(|p| now >= p.send_at) {
            if let Some(resume) = self.pending_resume.take() {
                info!(
                    room = %self.room,
                    player_id = %resume.identity.previous_player_id,
                    "Attempting to reconnect as previous player"
                );
                self.transmit(&ClientMsg::Reconnect(ReconnectRequest {
                    previous_player_id: resume.identity.previous_player_id,
                    previous_name: resume.identity.previous_name,
                }));
                self.resume_deadline = Some(now + RESUME_TIMEOUT_MS);
            }
        }

        if self.resume_deadline.is_some_and(|deadline| now >= deadline) {
            info!(room = %self.room, "Reconnection timeout, continuing as new player");
            self.resume_deadline = None;
            self.state = ConnectionState::Open;
            self.flush_outbox();
            events.push(SessionEvent::ResumeAbandoned);
        }

        events
    }

    /// Tear the connection down. Returns false if there was nothing to tear
    /// down (never connected, or already closed).
    pub fn close(&mut self) -> bool {
        let closed = self.teardown();
        if closed {
            info!(room = %self.room, "Session closed by caller");
        }
        closed
    }

    fn on_open(&mut self, now: Millis, events: &mut Vec<SessionEvent>) {
        if self.state != ConnectionState::Connecting {
            debug!(room = %self.room, state = ?self.state, "Duplicate open notification");
            return;
        }

        info!(room = %self.room, "Connected to server");
        self.state = ConnectionState::Open;
        events.push(SessionEvent::Opened);

        match self.resume_candidate.take() {
            Some(identity) => {
                self.pending_resume = Some(PendingResume {
                    identity,
                    send_at: now + RESUME_SEND_DELAY_MS,
                });
                self.state = ConnectionState::Reconnecting;
            }
            None => self.flush_outbox(),
        }
    }

    fn on_server_event(&mut self, event: ServerEvent, events: &mut Vec<SessionEvent>) {
        match &event {
            ServerEvent::Init(welcome) => {
                events.push(self.adopt_identity(welcome, false));
            }
            ServerEvent::Reconnected(resumed) => {
                events.push(self.adopt_identity(&resumed.welcome, true));
            }
            ServerEvent::Other { kind, .. } => {
                debug!(room = %self.room, kind = %kind, "Passing through unrecognized message");
            }
            _ => {}
        }
        events.push(SessionEvent::Server(event));
    }

    fn on_malformed(&self, error: &CodecError) {
        warn!(room = %self.room, error = %error, "Dropping malformed message");
    }

    fn adopt_identity(&mut self, welcome: &Welcome, resumed: bool) -> SessionEvent {
        info!(
            room = %self.room,
            player_id = %welcome.your_id,
            resumed,
            "Identity assigned"
        );

        self.local_player_id = Some(welcome.your_id.clone());
        self.color = welcome.your_color.clone();
        self.display_name = welcome.your_name.clone();

        self.resume_deadline = None;
        // A resume request not yet sent keeps us reconnecting until it is answered
        if self.state == ConnectionState::Reconnecting && self.pending_resume.is_none() {
            self.state = ConnectionState::Open;
            self.flush_outbox();
        }

        let record = StoredIdentity::new(
            welcome.your_id.clone(),
            welcome.your_name.clone(),
            welcome.your_color.clone(),
            self.room.clone(),
        );
        if let Err(e) = self.store.save(&record) {
            warn!(room = %self.room, error = %e, "Failed to store identity");
        }

        SessionEvent::IdentityAssigned {
            player_id: welcome.your_id.clone(),
            color: welcome.your_color.clone(),
            name: welcome.your_name.clone(),
            resumed,
        }
    }

    /// Drain queued messages in order; only called on entering `Open`
    fn flush_outbox(&mut self) {
        debug_assert_eq!(self.state, ConnectionState::Open);
        while let Some(msg) = self.outbox.pop_front() {
            self.transmit(&msg);
        }
    }

    fn transmit(&self, msg: &ClientMsg) {
        let Some(link) = &self.link else {
            return;
        };
        match codec::encode(msg) {
            Ok(text) => {
                if let Err(e) = link.send_text(text) {
                    warn!(room = %self.room, error = %e, "Error sending message");
                }
            }
            Err(e) => error!(room = %self.room, error = %e, "Failed to encode message"),
        }
    }

    /// Runs at most once per connection instance
    fn teardown(&mut self) -> bool {
        if self.torn_down || self.conn.is_none() {
            return false;
        }
        self.torn_down = true;

        self.pending_resume = None;
        self.resume_deadline = None;
        self.resume_candidate = None;

        if let Some(link) = self.link.take() {
            link.close();
        }
        self.conn = None;
        self.state = ConnectionState::Closed;
        true
    }
}

/// Room id carried in the `room` query parameter
pub fn room_from_url(url: &str) -> String {
    url.split_once('?')
        .and_then(|(_, query)| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "room")
                .map(|(_, value)| value.to_string())
        })
        .filter(|room| !room.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string())
}
