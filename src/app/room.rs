//! Room controller: wires the session, the peer cache and the local
//! simulation together for one room

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::game::collision::{CollisionEngine, CollisionEvent, CollisionStats};
use crate::game::cues::{AudioCue, EngineCue};
use crate::game::effects::{EffectInstance, EffectScheduler};
use crate::game::physics::{
    DriveInput, FlightStats, Impulse, PhysicsSystem, VehicleState, SPAWN_POSITION,
};
use crate::game::remote::{CacheChange, RemoteCache, RemoteSmoother};
use crate::game::vec3::Vec3;
use crate::store::IdentityStore;
use crate::util::rate_limit::OutboundThrottle;
use crate::util::time::Millis;
use crate::ws::protocol::{ClientMsg, PlayerId, PositionUpdate, Resumed, ServerEvent};
use crate::ws::session::{CloseReason, ConnectionState, Session, SessionError, SessionEvent};
use crate::ws::transport::{Connector, TransportEvent};

/// Everything the host has to react to
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Socket is up
    Connected,
    IdentityAssigned {
        player_id: PlayerId,
        color: String,
        name: String,
        resumed: bool,
    },
    ResumeAbandoned,
    Collision(CollisionEvent),
    Cue(AudioCue),
    /// Server message this client has no reducer for
    Custom { kind: String, payload: Value },
    Disconnected { reason: CloseReason },
}

/// Connection summary for UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub is_reconnecting: bool,
    pub player_id: Option<PlayerId>,
}

/// One vehicle as the renderer draws it
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleView {
    pub id: PlayerId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub color: String,
    pub is_local: bool,
}

/// Client state for one room
pub struct RoomController {
    url: String,
    session: Session,

    cache: RemoteCache,
    smoother: RemoteSmoother,

    vehicle: VehicleState,
    flight: FlightStats,
    impulse: Impulse,
    is_flying: bool,

    collisions: CollisionEngine,
    effects: EffectScheduler,
    throttle: OutboundThrottle,
    master_volume: f32,

    announced: bool,
    events: Vec<RoomEvent>,
}

impl RoomController {
    pub fn new(
        config: &Config,
        store: Arc<dyn IdentityStore>,
        connector: Box<dyn Connector>,
    ) -> Self {
        Self {
            url: config.room_url(),
            session: Session::new(config.room_id.clone(), store, connector),
            cache: RemoteCache::new(),
            smoother: RemoteSmoother::new(),
            vehicle: VehicleState::default(),
            flight: FlightStats::default(),
            impulse: Impulse::default(),
            is_flying: false,
            collisions: CollisionEngine::new(CollisionStats::default()),
            effects: EffectScheduler::new(),
            throttle: OutboundThrottle::new(),
            master_volume: config.master_volume,
            announced: false,
            events: Vec::new(),
        }
    }

    /// Swap the spark RNG for a seeded one
    pub fn with_effects(mut self, effects: EffectScheduler) -> Self {
        self.effects = effects;
        self
    }

    /// Connect to the room. `Ok(false)` if already connecting or live.
    pub fn enter(&mut self) -> Result<bool, SessionError> {
        self.session.connect(&self.url)
    }

    /// Close the connection and drop room state
    pub fn leave(&mut self) {
        if self.session.close() {
            self.reset_world();
            self.events.push(RoomEvent::Disconnected {
                reason: CloseReason::Requested,
            });
        }
    }

    /// Feed one event from the transport
    pub fn on_transport(&mut self, event: TransportEvent, now: Millis) {
        for session_event in self.session.handle_transport(event, now) {
            self.apply(session_event);
        }
    }

    /// Advance one frame of `delta` seconds
    pub fn tick(&mut self, delta: f32, input: &DriveInput, now: Millis) {
        for session_event in self.session.poll(now) {
            self.apply(session_event);
        }

        if self.session.local_player_id().is_none() {
            return;
        }

        self.impulse.expire(now);
        PhysicsSystem::step(
            &mut self.vehicle,
            input,
            &self.impulse.vector(),
            delta,
            &self.flight,
        );
        self.is_flying = input.is_flying();

        let hits = self.collisions.scan(
            &self.vehicle.position,
            &self.vehicle.velocity,
            self.cache.players().values(),
            now,
        );
        for hit in hits {
            self.impulse.merge(&hit.knockback, now);
            self.effects
                .spawn(self.vehicle.position, hit.crash_intensity, now);

            let cue = if hit.is_major_crash {
                AudioCue::Crash {
                    intensity: hit.crash_intensity,
                }
            } else {
                AudioCue::Scrape
            };
            self.events.push(RoomEvent::Cue(cue));
            self.events.push(RoomEvent::Collision(hit));
        }

        self.effects.update(delta, now);
        self.smoother.advance(&self.cache);

        if self.session.state() == ConnectionState::Open && self.throttle.try_acquire_at(now) {
            self.session.send(ClientMsg::UpdatePosition(PositionUpdate {
                position: self.vehicle.position,
                rotation: self.vehicle.rotation,
            }));
        }
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            is_connected: self.session.is_connected(),
            is_reconnecting: self.session.is_reconnecting(),
            player_id: self.session.local_player_id().map(str::to_string),
        }
    }

    /// Local vehicle first, then every placed peer at its smoothed transform
    pub fn vehicle_views(&self) -> Vec<VehicleView> {
        let mut views = Vec::with_capacity(self.cache.len() + 1);

        if let Some(id) = self.session.local_player_id() {
            views.push(VehicleView {
                id: id.to_string(),
                position: self.vehicle.position,
                rotation: self.vehicle.rotation,
                color: self.session.color().to_string(),
                is_local: true,
            });
        }

        for (id, player) in self.cache.players() {
            let (position, rotation) = match (self.smoother.get(id), player.position) {
                (Some(shown), _) => (shown.position, shown.rotation),
                (None, Some(position)) => (position, player.rotation),
                (None, None) => continue,
            };
            views.push(VehicleView {
                id: id.clone(),
                position,
                rotation,
                color: player.color.clone(),
                is_local: false,
            });
        }

        views
    }

    pub fn effects(&self) -> &[EffectInstance] {
        self.effects.effects()
    }

    pub fn engine_cue(&self) -> EngineCue {
        EngineCue::from_motion(&self.vehicle.velocity, self.is_flying, self.master_volume)
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn peers(&self) -> &RemoteCache {
        &self.cache
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => self.events.push(RoomEvent::Connected),
            SessionEvent::IdentityAssigned {
                player_id,
                color,
                name,
                resumed,
            } => {
                if !self.announced {
                    self.announced = true;
                    self.events.push(RoomEvent::Cue(AudioCue::Connect));
                }
                self.events.push(RoomEvent::IdentityAssigned {
                    player_id,
                    color,
                    name,
                    resumed,
                });
            }
            SessionEvent::ResumeAbandoned => self.events.push(RoomEvent::ResumeAbandoned),
            SessionEvent::Server(server_event) => self.apply_server(server_event),
            SessionEvent::Closed(reason) => {
                self.reset_world();
                self.events.push(RoomEvent::Disconnected { reason });
            }
        }
    }

    fn apply_server(&mut self, event: ServerEvent) {
        match self.cache.apply(&event, self.session.local_player_id()) {
            CacheChange::Joined(id) => {
                debug!(peer = %id, "Peer joined");
                self.events.push(RoomEvent::Cue(AudioCue::Connect));
            }
            CacheChange::Left(id) => {
                debug!(peer = %id, "Peer left");
                self.collisions.forget(&id);
                self.events.push(RoomEvent::Cue(AudioCue::Disconnect));
            }
            CacheChange::Seeded { peers } => {
                info!(room = %self.session.room(), peers, "Roster received");
            }
            CacheChange::Moved(_) | CacheChange::Unchanged => {}
        }

        match event {
            ServerEvent::Reconnected(resumed) => self.restore(&resumed),
            ServerEvent::Other { kind, payload } => {
                self.events.push(RoomEvent::Custom { kind, payload });
            }
            _ => {}
        }
    }

    /// Put the vehicle back where the server last saw it
    fn restore(&mut self, resumed: &Resumed) {
        if let Some(mut position) = resumed.position {
            // A zero height means the server never received a real transform
            if position.y <= 0.0 {
                position.y = SPAWN_POSITION.y;
            }
            self.vehicle.position = position;
            self.vehicle.velocity = Vec3::ZERO;
            info!(x = position.x, y = position.y, z = position.z, "Restored previous position");
        }
        if let Some(rotation) = resumed.rotation {
            self.vehicle.rotation = rotation;
        }
    }

    fn reset_world(&mut self) {
        self.cache.clear();
        self.smoother.clear();
        self.collisions.reset();
        self.impulse.clear();
        self.effects.clear();
        self.announced = false;
    }
}
