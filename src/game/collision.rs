//! Vehicle-to-vehicle collision detection and impulse response

use std::collections::HashMap;

use tracing::{debug, info};

use crate::util::time::Millis;
use crate::ws::protocol::{PlayerId, RemotePlayer};

use super::vec3::Vec3;

/// Collision tuning
#[derive(Debug, Clone, Copy)]
pub struct CollisionStats {
    /// Centre distance below which two cars touch
    pub radius: f32,
    /// Minimum gap between two events for the same peer
    pub cooldown_ms: Millis,
    /// Relative speed cap
    pub max_force: f32,
    /// Force above which a hit counts as a crash
    pub major_threshold: f32,
    /// Force mapping to full crash intensity
    pub intensity_scale: f32,
    /// Knockback per unit of force
    pub bounce_factor: f32,
    /// Knockback floor
    pub min_bounce: f32,
    /// Vertical knockback damping
    pub vertical_damping: f32,
}

impl Default for CollisionStats {
    fn default() -> Self {
        Self {
            radius: 2.5,
            cooldown_ms: 1000,
            max_force: 5.0,
            major_threshold: 2.0,
            intensity_scale: 3.0,
            bounce_factor: 0.3,
            min_bounce: 1.5,
            vertical_damping: 0.5,
        }
    }
}

/// One detected collision with a peer
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    pub other_player: RemotePlayer,
    /// Unit vector from the peer toward us
    pub direction: Vec3,
    /// Relative speed, capped
    pub force: f32,
    /// Push to merge into our impulse
    pub knockback: Vec3,
    pub is_major_crash: bool,
    /// 0..=1
    pub crash_intensity: f32,
    pub distance: f32,
}

/// Scans local-vs-remote proximity each tick
#[derive(Debug, Default)]
pub struct CollisionEngine {
    stats: CollisionStats,
    last_hit: HashMap<PlayerId, Millis>,
}

impl CollisionEngine {
    pub fn new(stats: CollisionStats) -> Self {
        Self {
            stats,
            last_hit: HashMap::new(),
        }
    }

    /// Check the local vehicle against every peer.
    ///
    /// Linear in the number of peers; fine for room-sized player counts.
    pub fn scan<'a>(
        &mut self,
        position: &Vec3,
        velocity: &Vec3,
        peers: impl IntoIterator<Item = &'a RemotePlayer>,
        now: Millis,
    ) -> Vec<CollisionEvent> {
        let mut events = Vec::new();

        for peer in peers {
            // Peers the server has not placed yet cannot be hit
            let Some(peer_position) = peer.position else {
                continue;
            };
            let distance = position.distance(&peer_position);
            if distance >= self.stats.radius || !self.cooled_down(&peer.id, now) {
                continue;
            }
            self.last_hit.insert(peer.id.clone(), now);

            let event = self.resolve(position, velocity, peer, &peer_position, distance);
            if event.is_major_crash {
                info!(
                    peer = %peer.id,
                    force = event.force,
                    "Major crash"
                );
            } else {
                debug!(peer = %peer.id, force = event.force, "Minor collision");
            }
            events.push(event);
        }

        events
    }

    /// Drop the cooldown of a peer that left
    pub fn forget(&mut self, peer: &str) {
        self.last_hit.remove(peer);
    }

    /// Drop all cooldowns (session teardown)
    pub fn reset(&mut self) {
        self.last_hit.clear();
    }

    fn cooled_down(&self, peer: &str, now: Millis) -> bool {
        match self.last_hit.get(peer) {
            Some(&at) => now.saturating_sub(at) > self.stats.cooldown_ms,
            None => true,
        }
    }

    fn resolve(
        &self,
        position: &Vec3,
        velocity: &Vec3,
        peer: &RemotePlayer,
        peer_position: &Vec3,
        distance: f32,
    ) -> CollisionEvent {
        let stats = &self.stats;

        // Coincident centres have no direction; push straight up
        let direction = position.sub(peer_position).normalized().unwrap_or(Vec3::UP);

        let peer_velocity = peer.velocity.unwrap_or(Vec3::ZERO);
        let force = velocity.sub(&peer_velocity).length().min(stats.max_force);

        let is_major_crash = force > stats.major_threshold;
        let crash_intensity = (force / stats.intensity_scale).min(1.0);

        let bounce = (force * stats.bounce_factor).max(stats.min_bounce);
        let knockback = Vec3::new(
            direction.x * bounce,
            direction.y.abs() * bounce * stats.vertical_damping,
            direction.z * bounce,
        );

        CollisionEvent {
            other_player: peer.clone(),
            direction,
            force,
            knockback,
            is_major_crash,
            crash_intensity,
            distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, position: Vec3, velocity: Option<Vec3>) -> RemotePlayer {
        RemotePlayer {
            id: id.into(),
            position: Some(position),
            rotation: Vec3::ZERO,
            color: "red".into(),
            name: id.into(),
            velocity,
        }
    }

    #[test]
    fn head_on_hit_at_relative_speed_four() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(1.0, 1.0, 0.0), None);

        let events = engine.scan(
            &Vec3::new(0.0, 1.0, 0.0),
            &Vec3::new(-4.0, 0.0, 0.0),
            [&other],
            0,
        );

        assert_eq!(events.len(), 1);
        let hit = &events[0];
        assert!((hit.distance - 1.0).abs() < 1e-6);
        assert!((hit.force - 4.0).abs() < 1e-6);
        assert!(hit.is_major_crash);
        assert!((hit.crash_intensity - 1.0).abs() < 1e-6);
        assert_eq!(hit.direction, Vec3::new(-1.0, 0.0, 0.0));
        assert!((hit.knockback.length() - 1.5).abs() < 1e-6);
        assert!((hit.knockback.x + 1.5).abs() < 1e-6);
    }

    #[test]
    fn slow_scrape_is_minor_with_floor_knockback() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(0.0, 1.0, 2.0), Some(Vec3::new(0.0, 0.0, 0.5)));

        let events = engine.scan(&Vec3::new(0.0, 1.0, 0.0), &Vec3::new(0.0, 0.0, 1.5), [&other], 0);

        let hit = &events[0];
        assert!((hit.force - 1.0).abs() < 1e-6);
        assert!(!hit.is_major_crash);
        assert!((hit.crash_intensity - 1.0 / 3.0).abs() < 1e-6);
        assert!((hit.knockback.z + 1.5).abs() < 1e-6);
    }

    #[test]
    fn force_is_capped() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(1.0, 0.0, 0.0), Some(Vec3::new(20.0, 0.0, 0.0)));
        let events = engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 0);
        assert_eq!(events[0].force, 5.0);
        assert!((events[0].knockback.length() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn knockback_never_points_down() {
        let mut engine = CollisionEngine::default();
        // Peer above us: direction points down
        let other = peer("b", Vec3::new(0.0, 2.0, 0.0), None);
        let events = engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 0);
        assert_eq!(events[0].direction, Vec3::new(0.0, -1.0, 0.0));
        assert!((events[0].knockback.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn coincident_positions_use_the_fallback_direction() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(3.0, 1.0, 3.0), None);
        let events = engine.scan(&Vec3::new(3.0, 1.0, 3.0), &Vec3::ZERO, [&other], 0);
        assert_eq!(events[0].direction, Vec3::UP);
        assert!(events[0].knockback.x.is_finite());
        assert_eq!(events[0].distance, 0.0);
    }

    #[test]
    fn unplaced_peers_are_skipped() {
        let mut engine = CollisionEngine::default();
        let mut ghost = peer("g", Vec3::ZERO, None);
        ghost.position = None;
        assert!(engine
            .scan(&Vec3::new(0.0, 1.0, 0.0), &Vec3::ZERO, [&ghost], 0)
            .is_empty());
    }

    #[test]
    fn out_of_range_peers_are_ignored() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(2.5, 0.0, 0.0), None);
        assert!(engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 0).is_empty());
    }

    #[test]
    fn at_most_one_event_per_peer_per_cooldown_window() {
        let mut engine = CollisionEngine::default();
        let a = peer("a", Vec3::new(1.0, 0.0, 0.0), None);
        let b = peer("b", Vec3::new(-1.0, 0.0, 0.0), None);

        let mut hits: HashMap<String, Vec<Millis>> = HashMap::new();
        for now in (0..5_000).step_by(16) {
            for event in engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&a, &b], now) {
                hits.entry(event.other_player.id).or_default().push(now);
            }
        }

        for times in hits.values() {
            assert!(times.len() >= 4);
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] > 1000);
            }
        }
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn forgetting_a_peer_clears_its_cooldown() {
        let mut engine = CollisionEngine::default();
        let other = peer("b", Vec3::new(1.0, 0.0, 0.0), None);
        assert_eq!(engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 0).len(), 1);
        assert!(engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 500).is_empty());

        engine.forget("b");
        assert_eq!(engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 600).len(), 1);

        engine.reset();
        assert_eq!(engine.scan(&Vec3::ZERO, &Vec3::ZERO, [&other], 700).len(), 1);
    }
}
