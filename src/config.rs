// Defaults, topics, command line
use std::time::Duration;

use clap::Parser;

use crate::error::Result;
use crate::kinematics::{DriveGeometry, TRACK_WIDTH, WHEEL_RADIUS};
use crate::table::PLAYERS_PER_TEAM;

// Transmit loop frequency
pub const LOOP_HZ: u32 = 60;

// How long shutdown waits for the loop to finish its tick
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// FIRASim command listener
pub const SIM_ADDRESS: &str = "127.0.0.1";
pub const SIM_PORT: u16 = 20011;

// Backbone (port 0 = zenoh peer discovery)
pub const BACKBONE_ADDRESS: &str = "127.0.0.1";
pub const BACKBONE_PORT: u16 = 0;

// Zenoh topics
pub const TOPIC_CMD: &str = "armorial/actuator/cmd"; // commands from the backbone

/// Actuator VSS: relays backbone commands to FIRASim
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Address the application sends commands to
    #[arg(default_value = SIM_ADDRESS)]
    pub address: String,

    /// Port the application sends commands to
    #[arg(default_value_t = SIM_PORT, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Transmit loop frequency (Hz)
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u32).range(1..))]
    pub frequency: u32,

    /// Backbone address
    #[arg(long, default_value = BACKBONE_ADDRESS)]
    pub backbone_address: String,

    /// Backbone port (0 uses peer discovery)
    #[arg(long, default_value_t = BACKBONE_PORT)]
    pub backbone_port: u16,

    /// Robots per team
    #[arg(long, default_value_t = PLAYERS_PER_TEAM, value_parser = parse_players)]
    pub players: usize,

    /// Distance between the wheels (m)
    #[arg(long, default_value_t = TRACK_WIDTH)]
    pub track_width: f64,

    /// Wheel radius (m)
    #[arg(long, default_value_t = WHEEL_RADIUS)]
    pub wheel_radius: f64,

    /// Topic carrying backbone commands
    #[arg(long, default_value = TOPIC_CMD)]
    pub topic: String,
}

fn parse_players(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("at least one robot per team is required".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    /// Checks clap cannot express on its own
    pub fn geometry(&self) -> Result<DriveGeometry> {
        DriveGeometry::new(self.track_width, self.wheel_radius)
    }
}
