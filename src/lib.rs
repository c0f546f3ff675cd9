//! Flying car client - multiplayer session, flight simulation and collision
//! handling for one room of the flying car game

pub mod app;
pub mod config;
pub mod game;
pub mod store;
pub mod util;
pub mod ws;
