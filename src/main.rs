//! Flying Car Client - headless multiplayer client
//!
//! Joins one room, keeps the session alive and runs the flight simulation
//! at a fixed tick rate. Room events are logged; with `AUTOPILOT` set the
//! car flies a slow circle so other players can see it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flying_car_client::app::{RoomController, RoomEvent};
use flying_car_client::config::Config;
use flying_car_client::game::{AudioCue, DriveInput};
use flying_car_client::store::FileIdentityStore;
use flying_car_client::util::time::{init_client_time, monotonic_millis, FrameTimer};
use flying_car_client::ws::WsConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize client time tracking
    init_client_time();

    info!("Starting Flying Car Client");
    info!("Room endpoint: {}", config.room_url());

    let store = Arc::new(FileIdentityStore::new(config.identity_dir.clone()));
    let (connector, mut transport_events) = WsConnector::new();
    let mut room = RoomController::new(&config, store, Box::new(connector));

    room.enter()?;

    let input = if config.autopilot {
        DriveInput {
            forward: true,
            left: true,
            ..Default::default()
        }
    } else {
        DriveInput::default()
    };

    let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(config.tick_rate)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frame_timer = FrameTimer::new();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                room.tick(frame_timer.lap_secs(), &input, monotonic_millis());
            }
            Some(event) = transport_events.recv() => {
                room.on_transport(event, monotonic_millis());
            }
            _ = &mut shutdown => break,
        }

        let mut disconnected = false;
        for event in room.drain_events() {
            disconnected |= matches!(event, RoomEvent::Disconnected { .. });
            log_room_event(&event);
        }
        if disconnected {
            break;
        }
    }

    room.leave();
    for event in room.drain_events() {
        log_room_event(&event);
    }

    info!("Client shutdown complete");
    Ok(())
}

fn log_room_event(event: &RoomEvent) {
    match event {
        RoomEvent::Connected => info!("Connected to server"),
        RoomEvent::IdentityAssigned {
            player_id,
            color,
            name,
            resumed,
        } => info!(player_id = %player_id, color = %color, name = %name, resumed, "Playing"),
        RoomEvent::ResumeAbandoned => info!("Previous identity not restored, playing as new"),
        RoomEvent::Collision(hit) => info!(
            peer = %hit.other_player.id,
            force = hit.force,
            major = hit.is_major_crash,
            "Collision"
        ),
        RoomEvent::Cue(AudioCue::Crash { intensity }) => debug!(intensity, "Crash sound"),
        RoomEvent::Cue(cue) => debug!(?cue, "Sound cue"),
        RoomEvent::Custom { kind, .. } => debug!(kind = %kind, "Unhandled server message"),
        RoomEvent::Disconnected { reason } => warn!(?reason, "Disconnected"),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
