//! Client-side simulation modules

pub mod collision;
pub mod cues;
pub mod effects;
pub mod physics;
pub mod remote;
pub mod vec3;

pub use collision::{CollisionEngine, CollisionEvent, CollisionStats};
pub use cues::{AudioCue, EngineCue};
pub use effects::{EffectInstance, EffectScheduler, ParticleState};
pub use physics::{DriveInput, FlightStats, Impulse, PhysicsSystem, VehicleState};
pub use remote::{CacheChange, RemoteCache, RemoteSmoother};
pub use vec3::Vec3;
