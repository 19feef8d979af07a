// Actuator bridge between a VSS decision backbone and the FIRASim simulator

pub mod actuator;
pub mod backbone;
pub mod config;
pub mod error;
pub mod kinematics;
pub mod link;
pub mod messages;
pub mod runtime;
pub mod scheduler;
pub mod table;
pub mod wire;

pub use actuator::{Actuation, Actuator, CommandHandle};
pub use backbone::{Backbone, BackboneError, ZenohBackbone};
pub use error::{ActuatorError, Result};
pub use kinematics::{DriveGeometry, WheelSpeeds};
pub use scheduler::StopHandle;
pub use table::{CommandTable, RobotCommand, WheelCommand};
