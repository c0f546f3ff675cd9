//! Persistence for the player's durable identity

pub mod identity;

pub use identity::{
    DurableIdentity, FileIdentityStore, IdentityStore, MemoryIdentityStore, StoreError,
    StoredIdentity,
};
