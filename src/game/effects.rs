//! Short-lived crash particle effects

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::util::time::Millis;

use super::vec3::Vec3;

/// Lifetime of every effect instance
pub const EFFECT_DURATION_MS: Millis = 2000;

const GRAVITY: f32 = 9.8;
const AIR_DRAG: f32 = 0.95;

/// Spark colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparkColor {
    Orange,
    Yellow,
}

impl SparkColor {
    pub fn hex(self) -> &'static str {
        match self {
            SparkColor::Orange => "#ff6b00",
            SparkColor::Yellow => "#ffdd00",
        }
    }
}

/// One spark
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// 1.0 at spawn, invisible at or below zero
    pub life: f32,
    /// Life lost per tick
    pub decay: f32,
    pub size: f32,
    pub color: SparkColor,
}

impl ParticleState {
    pub fn is_visible(&self) -> bool {
        self.life > 0.0
    }

    /// Rendered scale: base size shrinking with life
    pub fn scale(&self) -> f32 {
        self.size * self.life.max(0.0)
    }
}

/// A burst of sparks with a fixed lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInstance {
    pub id: Uuid,
    pub particles: Vec<ParticleState>,
    pub start_time: Millis,
    pub duration: Millis,
}

impl EffectInstance {
    pub fn is_expired(&self, now: Millis) -> bool {
        now.saturating_sub(self.start_time) >= self.duration
    }
}

/// Owns the lifecycle of every live effect
pub struct EffectScheduler {
    effects: Vec<EffectInstance>,
    rng: ChaCha8Rng,
}

impl EffectScheduler {
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    /// Deterministic sparks, for replays and tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            effects: Vec::new(),
            rng,
        }
    }

    /// Live effects, oldest first
    pub fn effects(&self) -> &[EffectInstance] {
        &self.effects
    }

    /// Emit a burst at `position`; `intensity` is 0..=1
    pub fn spawn(&mut self, position: Vec3, intensity: f32, now: Millis) -> Uuid {
        let intensity = intensity.clamp(0.0, 1.0);
        let count = (5.0 + intensity * 10.0).floor() as usize;
        let rng = &mut self.rng;

        let particles = (0..count)
            .map(|_| ParticleState {
                position: Vec3::new(
                    position.x + (rng.gen::<f32>() - 0.5) * 2.0,
                    position.y + rng.gen::<f32>() * 2.0,
                    position.z + (rng.gen::<f32>() - 0.5) * 2.0,
                ),
                velocity: Vec3::new(
                    (rng.gen::<f32>() - 0.5) * intensity * 4.0,
                    rng.gen::<f32>() * intensity * 3.0,
                    (rng.gen::<f32>() - 0.5) * intensity * 4.0,
                ),
                life: 1.0,
                decay: rng.gen_range(0.02..=0.05),
                size: 0.1 + rng.gen::<f32>() * 0.2 * intensity,
                color: if rng.gen_bool(0.5) {
                    SparkColor::Orange
                } else {
                    SparkColor::Yellow
                },
            })
            .collect();

        let id = Uuid::new_v4();
        self.effects.push(EffectInstance {
            id,
            particles,
            start_time: now,
            duration: EFFECT_DURATION_MS,
        });
        id
    }

    /// Advance every visible particle and drop expired effects
    pub fn update(&mut self, delta: f32, now: Millis) {
        self.effects.retain(|effect| !effect.is_expired(now));

        for particle in self
            .effects
            .iter_mut()
            .flat_map(|effect| effect.particles.iter_mut())
            .filter(|p| p.is_visible())
        {
            particle.position.add_scaled(&particle.velocity, delta);
            particle.velocity.y -= GRAVITY * delta;
            particle.velocity.x *= AIR_DRAG;
            particle.velocity.z *= AIR_DRAG;
            particle.life -= particle.decay;
        }
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

impl Default for EffectScheduler {
    fn default() -> Self {
        Self::new()
    }
}
