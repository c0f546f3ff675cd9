//! Flight physics for the local vehicle

use crate::util::time::Millis;

use super::vec3::Vec3;

/// Where a vehicle spawns (and respawns when the server lost its height)
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// How long a collision impulse keeps pushing before it is reset
pub const IMPULSE_WINDOW_MS: Millis = 200;

/// Flight constants
#[derive(Debug, Clone, Copy)]
pub struct FlightStats {
    /// Forward/reverse thrust (units per second)
    pub speed: f32,
    /// Vertical thrust (units per second)
    pub fly_speed: f32,
    /// Yaw rate (radians per second)
    pub rotation_speed: f32,
    /// Velocity multiplier applied once per tick
    pub drag: f32,
    /// Impulse gain, multiplied with delta
    pub impulse_gain: f32,
    /// Lowest allowed height
    pub ground_floor: f32,
    /// Largest roll while turning (radians)
    pub max_bank: f32,
    /// Roll ramp rate while turning (radians per second)
    pub bank_rate: f32,
    /// Roll multiplier per tick when not turning
    pub bank_recovery: f32,
    /// Optional clamp for frame hitches. Off by default: the integrator is
    /// frame-rate dependent and clamping changes its behavior.
    pub max_delta: Option<f32>,
}

impl Default for FlightStats {
    fn default() -> Self {
        Self {
            speed: 8.0,
            fly_speed: 5.0,
            rotation_speed: 2.0,
            drag: 0.95,
            impulse_gain: 10.0,
            ground_floor: 0.5,
            max_bank: 0.3,
            bank_rate: 2.0,
            bank_recovery: 0.9,
            max_delta: None,
        }
    }
}

/// Directional inputs held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveInput {
    pub forward: bool,
    pub reverse: bool,
    pub left: bool,
    pub right: bool,
    pub ascend: bool,
    pub descend: bool,
}

impl DriveInput {
    /// Any vertical thruster engaged
    pub fn is_flying(&self) -> bool {
        self.ascend || self.descend
    }
}

/// Local vehicle transform and velocity. Only the integrator writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub position: Vec3,
    /// Euler angles; `y` is yaw, `z` is roll
    pub rotation: Vec3,
    pub velocity: Vec3,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: SPAWN_POSITION,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }
}

/// Collision push, added to velocity every tick until it expires
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Impulse {
    vector: Vec3,
    expires_at: Option<Millis>,
}

impl Impulse {
    /// Current push
    pub fn vector(&self) -> Vec3 {
        self.vector
    }

    pub fn is_active(&self) -> bool {
        !self.vector.is_zero()
    }

    /// Add a knockback and restart the decay window
    pub fn merge(&mut self, knockback: &Vec3, now: Millis) {
        self.vector.add_assign(knockback);
        self.expires_at = Some(now + IMPULSE_WINDOW_MS);
    }

    /// Reset to zero once the window has passed
    pub fn expire(&mut self, now: Millis) {
        if self.expires_at.is_some_and(|at| now >= at) {
            *self = Self::default();
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Physics system for the local vehicle
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the vehicle one tick of `delta` seconds.
    ///
    /// Velocity is already delta-scaled when it accumulates thrust, so the
    /// position step adds it directly, and drag is a flat per-tick factor.
    pub fn step(
        state: &mut VehicleState,
        input: &DriveInput,
        impulse: &Vec3,
        delta: f32,
        stats: &FlightStats,
    ) {
        let delta = match stats.max_delta {
            Some(max) => delta.min(max),
            None => delta,
        };
        let yaw = state.rotation.y;
        let velocity = &mut state.velocity;

        // Thrust along the heading at the start of the tick
        let thrust = stats.speed * delta;
        if input.forward {
            velocity.z -= yaw.cos() * thrust;
            velocity.x -= yaw.sin() * thrust;
        }
        if input.reverse {
            velocity.z += yaw.cos() * thrust;
            velocity.x += yaw.sin() * thrust;
        }

        if input.left {
            state.rotation.y += stats.rotation_speed * delta;
        }
        if input.right {
            state.rotation.y -= stats.rotation_speed * delta;
        }

        if input.ascend {
            velocity.y += stats.fly_speed * delta;
        }
        if input.descend {
            velocity.y -= stats.fly_speed * delta;
        }

        if !impulse.is_zero() {
            velocity.add_scaled(impulse, delta * stats.impulse_gain);
        }

        velocity.scale_assign(stats.drag);

        state.position.add_assign(velocity);
        state.position.y = state.position.y.max(stats.ground_floor);

        // Banking
        let roll = &mut state.rotation.z;
        if input.left {
            *roll = (*roll + stats.bank_rate * delta).min(stats.max_bank);
        } else if input.right {
            *roll = (*roll - stats.bank_rate * delta).max(-stats.max_bank);
        } else {
            *roll *= stats.bank_recovery;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn forward_thrust_follows_yaw_then_drag() {
        let stats = FlightStats::default();
        let mut state = VehicleState::default();
        let input = DriveInput {
            forward: true,
            ..Default::default()
        };

        PhysicsSystem::step(&mut state, &input, &Vec3::ZERO, 0.1, &stats);

        // yaw 0: straight down -z, 8 * 0.1 = 0.8, then * 0.95
        assert!(approx(state.velocity.z, -0.76));
        assert!(approx(state.velocity.x, 0.0));
        assert!(approx(state.position.z, -0.76));
        assert!(approx(state.position.y, 1.0));
    }

    #[test]
    fn thrust_uses_heading_before_this_ticks_turn() {
        let stats = FlightStats::default();
        let mut state = VehicleState::default();
        state.rotation.y = std::f32::consts::FRAC_PI_2;
        let input = DriveInput {
            forward: true,
            left: true,
            ..Default::default()
        };

        PhysicsSystem::step(&mut state, &input, &Vec3::ZERO, 0.1, &stats);

        assert!(approx(state.velocity.x, -0.76));
        assert!(state.velocity.z.abs() < 1e-5);
        assert!(approx(state.rotation.y, std::f32::consts::FRAC_PI_2 + 0.2));
    }

    #[test]
    fn idle_velocity_decays_strictly_toward_rest() {
        let stats = FlightStats::default();
        let mut state = VehicleState {
            position: Vec3::new(0.0, 10.0, 0.0),
            rotation: Vec3::ZERO,
            velocity: Vec3::new(1.0, 0.5, -2.0),
        };

        let mut previous = state.velocity.length();
        for _ in 0..200 {
            PhysicsSystem::step(&mut state, &DriveInput::default(), &Vec3::ZERO, DT, &stats);
            let speed = state.velocity.length();
            assert!(speed < previous);
            previous = speed;
        }
        assert!(previous < 1e-3);
    }

    #[test]
    fn never_sinks_below_the_ground_floor() {
        let stats = FlightStats::default();
        let mut state = VehicleState::default();
        let input = DriveInput {
            descend: true,
            forward: true,
            ..Default::default()
        };

        for _ in 0..600 {
            PhysicsSystem::step(&mut state, &input, &Vec3::new(0.0, -50.0, 0.0), 0.5, &stats);
            assert!(state.position.y >= 0.5);
        }
    }

    #[test]
    fn impulse_is_scaled_by_delta_and_gain() {
        let stats = FlightStats::default();
        let mut state = VehicleState::default();

        PhysicsSystem::step(
            &mut state,
            &DriveInput::default(),
            &Vec3::new(1.5, 0.0, 0.0),
            0.02,
            &stats,
        );

        // 1.5 * 0.02 * 10 = 0.3, then drag
        assert!(approx(state.velocity.x, 0.285));
    }

    #[test]
    fn banking_ramps_to_limit_and_recovers() {
        let stats = FlightStats::default();
        let mut state = VehicleState::default();
        let left = DriveInput {
            left: true,
            ..Default::default()
        };

        for _ in 0..60 {
            PhysicsSystem::step(&mut state, &left, &Vec3::ZERO, DT, &stats);
        }
        assert!(approx(state.rotation.z, 0.3));

        PhysicsSystem::step(&mut state, &DriveInput::default(), &Vec3::ZERO, DT, &stats);
        assert!(approx(state.rotation.z, 0.27));

        let right = DriveInput {
            right: true,
            ..Default::default()
        };
        for _ in 0..120 {
            PhysicsSystem::step(&mut state, &right, &Vec3::ZERO, DT, &stats);
        }
        assert!(approx(state.rotation.z, -0.3));
    }

    #[test]
    fn max_delta_clamps_hitches_when_enabled() {
        let stats = FlightStats {
            max_delta: Some(0.1),
            ..Default::default()
        };
        let mut state = VehicleState::default();
        let input = DriveInput {
            ascend: true,
            ..Default::default()
        };
        PhysicsSystem::step(&mut state, &input, &Vec3::ZERO, 5.0, &stats);
        assert!(approx(state.velocity.y, 5.0 * 0.1 * 0.95));
    }

    #[test]
    fn impulse_expires_after_its_window() {
        let mut impulse = Impulse::default();
        impulse.merge(&Vec3::new(1.0, 0.0, 0.0), 1_000);
        impulse.merge(&Vec3::new(0.5, 0.5, 0.0), 1_100);
        assert_eq!(impulse.vector(), Vec3::new(1.5, 0.5, 0.0));

        impulse.expire(1_299);
        assert!(impulse.is_active());
        impulse.expire(1_300);
        assert!(!impulse.is_active());
    }
}
