//! Parameters handed to the audio layer

use super::vec3::Vec3;

const ENGINE_BASE_HZ: f32 = 80.0;
const ENGINE_MAX_HZ: f32 = 200.0;
const ENGINE_HZ_PER_SPEED: f32 = 30.0;
const ENGINE_MAX_VOLUME: f32 = 0.8;
const THRUSTER_MIN_VERTICAL_SPEED: f32 = 0.1;

/// Continuous engine sound target for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineCue {
    pub frequency_hz: f32,
    pub volume: f32,
    pub thruster_active: bool,
}

impl EngineCue {
    /// Engine pitch follows ground speed; thrusters run while climbing or diving
    pub fn from_motion(velocity: &Vec3, is_flying: bool, master_volume: f32) -> Self {
        let speed = velocity.horizontal_length();
        let frequency_hz =
            (ENGINE_BASE_HZ + speed * ENGINE_HZ_PER_SPEED).clamp(ENGINE_BASE_HZ, ENGINE_MAX_HZ);
        let volume = (master_volume * 0.3 + speed * 0.1).min(ENGINE_MAX_VOLUME);

        Self {
            frequency_hz,
            volume,
            thruster_active: is_flying && velocity.y.abs() > THRUSTER_MIN_VERTICAL_SPEED,
        }
    }
}

/// One-shot sounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCue {
    /// We joined, or a peer joined
    Connect,
    /// A peer left
    Disconnect,
    /// Hard hit, intensity 0..=1
    Crash { intensity: f32 },
    /// Glancing contact
    Scrape,
}
