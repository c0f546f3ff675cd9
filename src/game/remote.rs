//! Last-known state of every peer in the room

use std::collections::HashMap;

use tracing::debug;

use crate::ws::protocol::{PlayerId, RemotePlayer, ServerEvent};

use super::vec3::Vec3;

/// Fraction of the gap closed per frame when smoothing peer transforms
pub const SMOOTHING_FACTOR: f32 = 0.1;

/// What a reduced event did to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    /// Whole roster replaced
    Seeded { peers: usize },
    Joined(PlayerId),
    Moved(PlayerId),
    Left(PlayerId),
    /// Event did not touch the cache
    Unchanged,
}

/// Peer id → last-known state. Mutated only by [`RemoteCache::apply`].
#[derive(Debug, Default)]
pub struct RemoteCache {
    players: HashMap<PlayerId, RemotePlayer>,
}

impl RemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view keyed by peer id
    pub fn players(&self) -> &HashMap<PlayerId, RemotePlayer> {
        &self.players
    }

    pub fn get(&self, id: &str) -> Option<&RemotePlayer> {
        self.players.get(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Reduce one inbound event. `local_id` is never stored as a peer.
    pub fn apply(&mut self, event: &ServerEvent, local_id: Option<&str>) -> CacheChange {
        let is_local = |id: &str| local_id == Some(id);

        match event {
            ServerEvent::Init(welcome) => self.seed(welcome.players(), &welcome.your_id),
            ServerEvent::Reconnected(resumed) => {
                self.seed(resumed.welcome.players(), &resumed.welcome.your_id)
            }
            ServerEvent::NewPlayer(player) => {
                if is_local(&player.id) {
                    return CacheChange::Unchanged;
                }
                self.players.insert(player.id.clone(), player.clone());
                CacheChange::Joined(player.id.clone())
            }
            ServerEvent::PlayerUpdate { player_id, update } => {
                match self.players.get_mut(player_id) {
                    Some(player) => {
                        if let Some(position) = update.position {
                            player.position = Some(position);
                        }
                        if let Some(rotation) = update.rotation {
                            player.rotation = rotation;
                        }
                        CacheChange::Moved(player_id.clone())
                    }
                    None => {
                        debug!(player_id = %player_id, "Update for unknown player, ignoring");
                        CacheChange::Unchanged
                    }
                }
            }
            ServerEvent::PlayerDisconnected(departure) => {
                match self.players.remove(&departure.id) {
                    Some(_) => CacheChange::Left(departure.id.clone()),
                    None => CacheChange::Unchanged,
                }
            }
            ServerEvent::Other { .. } => CacheChange::Unchanged,
        }
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    fn seed(&mut self, roster: &[RemotePlayer], local_id: &str) -> CacheChange {
        self.players = roster
            .iter()
            .filter(|p| p.id != local_id)
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        CacheChange::Seeded {
            peers: self.players.len(),
        }
    }
}

/// Transform shown for a peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Eases displayed peer transforms toward the cache between network updates
#[derive(Debug, Default)]
pub struct RemoteSmoother {
    shown: HashMap<PlayerId, DisplayTransform>,
}

impl RemoteSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step every placed peer one frame toward its cached transform
    pub fn advance(&mut self, cache: &RemoteCache) {
        self.shown.retain(|id, _| cache.get(id).is_some());

        for (id, player) in cache.players() {
            let Some(target) = player.position else {
                continue;
            };
            let shown = self
                .shown
                .entry(id.clone())
                .or_insert_with(|| DisplayTransform {
                    position: target,
                    rotation: player.rotation,
                });
            shown.position.approach(&target, SMOOTHING_FACTOR);
            shown.rotation.approach(&player.rotation, SMOOTHING_FACTOR);
        }
    }

    pub fn get(&self, id: &str) -> Option<&DisplayTransform> {
        self.shown.get(id)
    }

    pub fn clear(&mut self) {
        self.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Departure, TransformUpdate, Welcome};
    use std::collections::HashSet;

    fn player(id: &str, x: f32) -> RemotePlayer {
        RemotePlayer {
            id: id.into(),
            position: Some(Vec3::new(x, 1.0, 0.0)),
            rotation: Vec3::ZERO,
            color: "#00ff00".into(),
            name: id.to_uppercase(),
            velocity: None,
        }
    }

    fn update(id: &str, x: f32) -> ServerEvent {
        ServerEvent::PlayerUpdate {
            player_id: id.into(),
            update: TransformUpdate {
                position: Some(Vec3::new(x, 2.0, 0.0)),
                rotation: Some(Vec3::new(0.0, 1.0, 0.0)),
            },
        }
    }

    fn gone(id: &str) -> ServerEvent {
        ServerEvent::PlayerDisconnected(Departure { id: id.into() })
    }

    #[test]
    fn update_for_unknown_peer_is_not_an_insert() {
        let mut cache = RemoteCache::new();
        assert_eq!(cache.apply(&update("ghost", 1.0), Some("me")), CacheChange::Unchanged);
        assert!(cache.is_empty());
    }

    #[test]
    fn update_merges_transform_only() {
        let mut cache = RemoteCache::new();
        cache.apply(&ServerEvent::NewPlayer(player("b", 0.0)), Some("me"));
        assert_eq!(cache.apply(&update("b", 5.0), Some("me")), CacheChange::Moved("b".into()));

        let b = cache.get("b").unwrap();
        assert_eq!(b.position, Some(Vec3::new(5.0, 2.0, 0.0)));
        assert_eq!(b.rotation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(b.name, "B");
        assert_eq!(b.color, "#00ff00");
    }

    #[test]
    fn update_without_position_keeps_the_cached_one() {
        let mut cache = RemoteCache::new();
        cache.apply(&ServerEvent::NewPlayer(player("b", 3.0)), Some("me"));

        let rotate_only = ServerEvent::PlayerUpdate {
            player_id: "b".into(),
            update: TransformUpdate {
                position: None,
                rotation: Some(Vec3::new(0.0, 2.0, 0.0)),
            },
        };
        assert_eq!(cache.apply(&rotate_only, Some("me")), CacheChange::Moved("b".into()));

        let b = cache.get("b").unwrap();
        assert_eq!(b.position, Some(Vec3::new(3.0, 1.0, 0.0)));
        assert_eq!(b.rotation, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn unplaced_peers_are_not_smoothed_until_they_report_a_position() {
        let mut cache = RemoteCache::new();
        let mut smoother = RemoteSmoother::new();
        let mut ghost = player("g", 0.0);
        ghost.position = None;
        cache.apply(&ServerEvent::NewPlayer(ghost), None);

        smoother.advance(&cache);
        assert!(smoother.get("g").is_none());

        cache.apply(&update("g", 6.0), None);
        smoother.advance(&cache);
        assert_eq!(smoother.get("g").unwrap().position, Vec3::new(6.0, 2.0, 0.0));
    }

    #[test]
    fn disconnected_peers_never_linger() {
        let mut cache = RemoteCache::new();
        let script = vec![
            ServerEvent::NewPlayer(player("a", 0.0)),
            ServerEvent::NewPlayer(player("b", 1.0)),
            update("a", 3.0),
            gone("a"),
            update("a", 4.0),
            gone("c"),
            ServerEvent::NewPlayer(player("c", 2.0)),
            gone("b"),
            update("b", 9.0),
        ];

        let mut expected: HashSet<String> = HashSet::new();
        for event in &script {
            match event {
                ServerEvent::NewPlayer(p) => {
                    expected.insert(p.id.clone());
                }
                ServerEvent::PlayerDisconnected(d) => {
                    expected.remove(&d.id);
                }
                _ => {}
            }
            cache.apply(event, Some("me"));
            let actual: HashSet<String> = cache.players().keys().cloned().collect();
            assert_eq!(actual, expected);
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn welcome_replaces_roster_and_skips_self() {
        let mut cache = RemoteCache::new();
        cache.apply(&ServerEvent::NewPlayer(player("stale", 0.0)), None);

        let welcome = Welcome {
            your_id: "me".into(),
            your_color: "red".into(),
            your_name: "Me".into(),
            all_players: Some(vec![player("me", 0.0), player("a", 1.0), player("b", 2.0)]),
        };
        assert_eq!(
            cache.apply(&ServerEvent::Init(welcome), None),
            CacheChange::Seeded { peers: 2 }
        );
        assert!(cache.get("stale").is_none());
        assert!(cache.get("me").is_none());

        assert_eq!(
            cache.apply(&ServerEvent::NewPlayer(player("me", 0.0)), Some("me")),
            CacheChange::Unchanged
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn smoother_eases_toward_target_and_forgets_departed() {
        let mut cache = RemoteCache::new();
        let mut smoother = RemoteSmoother::new();
        cache.apply(&ServerEvent::NewPlayer(player("b", 0.0)), None);
        smoother.advance(&cache);
        assert_eq!(smoother.get("b").unwrap().position, Vec3::new(0.0, 1.0, 0.0));

        cache.apply(&update("b", 10.0), None);
        smoother.advance(&cache);
        let shown = smoother.get("b").unwrap();
        assert!((shown.position.x - 1.0).abs() < 1e-5);
        assert!((shown.position.y - 1.1).abs() < 1e-5);

        cache.apply(&gone("b"), None);
        smoother.advance(&cache);
        assert!(smoother.get("b").is_none());
    }
}
