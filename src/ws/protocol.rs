//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::vec3::Vec3;

/// Player identifiers are opaque strings assigned by the server
pub type PlayerId = String;

/// Messages sent from client to server.
///
/// Serialized as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Local vehicle transform broadcast
    UpdatePosition(PositionUpdate),

    /// Ask the server to hand back a previous identity
    Reconnect(ReconnectRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub position: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectRequest {
    pub previous_player_id: PlayerId,
    pub previous_name: String,
}

/// A peer as described by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlayer {
    pub id: PlayerId,
    /// `None` until the server has reported where the peer is
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub name: String,
    /// Only present when the server reports it
    #[serde(default)]
    pub velocity: Option<Vec3>,
}

/// Body of `init` and `reconnected`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub your_id: PlayerId,
    #[serde(default)]
    pub your_color: String,
    #[serde(default)]
    pub your_name: String,
    /// `null` and missing are both treated as an empty roster
    #[serde(default)]
    pub all_players: Option<Vec<RemotePlayer>>,
}

impl Welcome {
    pub fn players(&self) -> &[RemotePlayer] {
        self.all_players.as_deref().unwrap_or_default()
    }
}

/// Body of `reconnected`: the welcome plus the last transform the server kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resumed {
    #[serde(flatten)]
    pub welcome: Welcome,
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Vec3>,
}

/// Body of `playerUpdate`. Absent fields leave the cached value alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Vec3>,
}

/// Body of `playerDisconnected`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    pub id: PlayerId,
}

/// Messages sent from server to client, after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Fresh identity and current roster
    Init(Welcome),

    /// Previous identity handed back
    Reconnected(Resumed),

    /// Peer joined the room
    NewPlayer(RemotePlayer),

    /// Peer moved
    PlayerUpdate {
        player_id: PlayerId,
        update: TransformUpdate,
    },

    /// Peer left the room
    PlayerDisconnected(Departure),

    /// Any message type this client does not model
    Other {
        kind: String,
        payload: serde_json::Value,
    },
}

impl ServerEvent {
    /// Wire tag of this event
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::Init(_) => "init",
            ServerEvent::Reconnected(_) => "reconnected",
            ServerEvent::NewPlayer(_) => "newPlayer",
            ServerEvent::PlayerUpdate { .. } => "playerUpdate",
            ServerEvent::PlayerDisconnected(_) => "playerDisconnected",
            ServerEvent::Other { kind, .. } => kind,
        }
    }
}
