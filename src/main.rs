//! ds-core - console driver station client

use ds_core::{Config, DriverStation, Error, Event, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("ds-core v0.1.0 starting...");

    // Get config path from args or default
    let config_path = env::args().nth(1).unwrap_or_else(|| "ds.toml".to_string());

    let config = if Path::new(&config_path).exists() {
        log::info!("Using config: {}", config_path);
        Config::load(&config_path)?
    } else {
        log::info!("No config file at {}, using defaults", config_path);
        Config::default()
    };

    let mut station = DriverStation::new(&config)?;

    log::info!(
        "Team {}: robot at {}, radio at {}",
        station.team(),
        station.robot_address(),
        station.radio_address()
    );

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let events = station.events();
    let tick_interval = Duration::from_millis(config.station.tick_interval_ms);

    log::info!("ds-core running. Press Ctrl-C to stop.");

    // Main loop: one control cycle per tick interval
    while running.load(Ordering::Relaxed) {
        station.tick();

        while let Ok(event) = events.try_recv() {
            match event {
                Event::VoltageChanged(v) => log::debug!("Robot voltage: {:.2} V", v),
                Event::CodeChanged(present) => {
                    log::info!("Robot code {}", if present { "present" } else { "absent" });
                }
                Event::ControlModeChanged(mode) => log::info!("Robot control mode: {:?}", mode),
                Event::LibVersionChanged(v) => log::info!("Library version: {}", v),
                Event::PcmVersionChanged(v) => log::info!("PCM firmware: {}", v),
                Event::PdpVersionChanged(v) => log::info!("PDP firmware: {}", v),
                Event::FmsPacket(data) => log::debug!("FMS packet ({} bytes)", data.len()),
                Event::RadioPacket(data) => log::debug!("Radio packet ({} bytes)", data.len()),
            }
        }

        std::thread::sleep(tick_interval);
    }

    log::info!("ds-core stopped");
    Ok(())
}
