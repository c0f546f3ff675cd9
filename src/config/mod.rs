//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;

use crate::util::time::DEFAULT_TICK_RATE;

const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8080/ws";
const DEFAULT_ROOM_ID: &str = "default";
const DEFAULT_IDENTITY_DIR: &str = ".flying-car/identities";
const DEFAULT_MASTER_VOLUME: f32 = 0.3;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Backend WebSocket endpoint, without the room query
    pub ws_url: String,
    /// Room to join
    pub room_id: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Where per-room identity files live
    pub identity_dir: PathBuf,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Hold a fixed input so the headless client moves on its own
    pub autopilot: bool,
    /// 0..=1
    pub master_volume: f32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; every variable is optional
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ws_url = lookup("BACKEND_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                key: "BACKEND_WS_URL",
                value: ws_url,
            });
        }

        let room_id = lookup("ROOM_ID")
            .filter(|room| !room.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_ID.to_string());
        if room_id.contains(['&', '?', '#', '=', ' ']) {
            return Err(ConfigError::Invalid {
                key: "ROOM_ID",
                value: room_id,
            });
        }

        let tick_rate = match lookup("TICK_RATE") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|rate| (1..=240).contains(rate))
                .ok_or(ConfigError::Invalid {
                    key: "TICK_RATE",
                    value: raw,
                })?,
            None => DEFAULT_TICK_RATE,
        };

        let autopilot = match lookup("AUTOPILOT") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                key: "AUTOPILOT",
                value: raw,
            })?,
            None => false,
        };

        let master_volume = match lookup("MASTER_VOLUME") {
            Some(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or(ConfigError::Invalid {
                    key: "MASTER_VOLUME",
                    value: raw,
                })?,
            None => DEFAULT_MASTER_VOLUME,
        };

        Ok(Self {
            ws_url,
            room_id,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            identity_dir: lookup("IDENTITY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_DIR)),
            tick_rate,
            autopilot,
            master_volume,
        })
    }

    /// Endpoint for this room: `<ws_url>?room=<room_id>`
    pub fn room_url(&self) -> String {
        let separator = if self.ws_url.contains('?') { '&' } else { '?' };
        format!("{}{}room={}", self.ws_url, separator, self.room_id)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
}
