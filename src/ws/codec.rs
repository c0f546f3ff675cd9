//! Encoding and decoding of wire messages

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::protocol::{ClientMsg, Departure, RemotePlayer, Resumed, ServerEvent, Welcome};

/// Errors produced while turning frames into events or back
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no string `type` field")]
    MissingType,

    #[error("malformed `{kind}` message: {source}")]
    Body {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("`playerUpdate` message has no `playerId`")]
    MissingPlayerId,
}

/// Envelope shared by every server message
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(rename = "playerId", default)]
    player_id: Option<String>,
}

/// Serialize an outbound message to a text frame
pub fn encode(msg: &ClientMsg) -> Result<String, CodecError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decode an inbound text frame.
///
/// Unknown `type` values are not errors; they come back as
/// [`ServerEvent::Other`] carrying the whole message.
pub fn decode(text: &str) -> Result<ServerEvent, CodecError> {
    let raw: Value = serde_json::from_str(text)?;
    if !raw.is_object() {
        return Err(CodecError::NotAnObject);
    }
    if !raw.get("type").is_some_and(Value::is_string) {
        return Err(CodecError::MissingType);
    }

    let envelope = Envelope::deserialize(&raw)?;
    let event = match envelope.kind.as_str() {
        "init" => ServerEvent::Init(body::<Welcome>("init", envelope.data)?),
        "reconnected" => ServerEvent::Reconnected(body::<Resumed>("reconnected", envelope.data)?),
        "newPlayer" => ServerEvent::NewPlayer(body::<RemotePlayer>("newPlayer", envelope.data)?),
        "playerUpdate" => ServerEvent::PlayerUpdate {
            player_id: envelope.player_id.ok_or(CodecError::MissingPlayerId)?,
            update: body("playerUpdate", envelope.data)?,
        },
        "playerDisconnected" => {
            ServerEvent::PlayerDisconnected(body::<Departure>("playerDisconnected", envelope.data)?)
        }
        _ => ServerEvent::Other {
            kind: envelope.kind,
            payload: raw,
        },
    };
    Ok(event)
}

fn body<T: DeserializeOwned>(kind: &'static str, data: Value) -> Result<T, CodecError> {
    serde_json::from_value(data).map_err(|source| CodecError::Body { kind, source })
}
