// Crate-level error type

use crate::backbone::BackboneError;

/// Errors surfaced by the actuator core
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Invalid team index {0} (expected 0 or 1)")]
    InvalidTeam(usize),

    #[error("Invalid robot index {robot} (team has {players} players)")]
    InvalidRobot { robot: usize, players: usize },

    #[error("Invalid loop frequency: {0} Hz")]
    InvalidFrequency(u32),

    #[error("Invalid simulator port: {0}")]
    InvalidPort(u16),

    #[error("Invalid drive geometry: track width {track_width}, wheel radius {wheel_radius}")]
    InvalidGeometry { track_width: f64, wheel_radius: f64 },

    #[error("Could not resolve simulator address {0}")]
    Unresolved(String),

    #[error("Backbone error: {0}")]
    Backbone(#[from] BackboneError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, ActuatorError>;
