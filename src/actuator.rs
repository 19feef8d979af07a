// Actuator facade: the table, the link and the loop behind one owner

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, trace};

use crate::backbone::Backbone;
use crate::error::Result;
use crate::kinematics::{DriveGeometry, WheelSpeeds};
use crate::link::Link;
use crate::scheduler::{Scheduler, StopHandle};
use crate::table::{CommandTable, RobotCommand};

/// Commands a decision system can issue to a robot
///
/// Ball-handling hooks are accepted but have no effect in simulation.
pub trait Actuation {
    fn set_speed(&self, team: usize, robot: usize, v: f64, w: f64) -> Result<WheelSpeeds>;
    fn set_wheel_speeds(&self, team: usize, robot: usize, left: f64, right: f64) -> Result<()>;
    fn kick(&self, team: usize, robot: usize, power: f32);
    fn chip_kick(&self, team: usize, robot: usize, power: f32);
    fn kick_on_touch(&self, team: usize, robot: usize, enable: bool, power: f32);
    fn chip_kick_on_touch(&self, team: usize, robot: usize, enable: bool, power: f32);
    fn hold_ball(&self, team: usize, robot: usize, enable: bool);
}

/// Cloneable writer into the command table, safe to share across tasks
#[derive(Clone)]
pub struct CommandHandle {
    table: Arc<CommandTable>,
}

impl CommandHandle {
    /// Snapshot of one robot's staged command
    pub fn get(&self, team: usize, robot: usize) -> Result<RobotCommand> {
        self.table.get(team, robot)
    }
}

impl Actuation for CommandHandle {
    fn set_speed(&self, team: usize, robot: usize, v: f64, w: f64) -> Result<WheelSpeeds> {
        self.table.set_speed(team, robot, v, w)
    }

    fn set_wheel_speeds(&self, team: usize, robot: usize, left: f64, right: f64) -> Result<()> {
        self.table
            .set_wheel_speeds(team, robot, WheelSpeeds::new(left, right))
    }

    fn kick(&self, team: usize, robot: usize, power: f32) {
        trace!("kick ignored: team={}, robot={}, power={}", team, robot, power);
    }

    fn chip_kick(&self, team: usize, robot: usize, power: f32) {
        trace!("chip kick ignored: team={}, robot={}, power={}", team, robot, power);
    }

    fn kick_on_touch(&self, team: usize, robot: usize, enable: bool, power: f32) {
        trace!(
            "kick on touch ignored: team={}, robot={}, enable={}, power={}",
            team, robot, enable, power
        );
    }

    fn chip_kick_on_touch(&self, team: usize, robot: usize, enable: bool, power: f32) {
        trace!(
            "chip kick on touch ignored: team={}, robot={}, enable={}, power={}",
            team, robot, enable, power
        );
    }

    fn hold_ball(&self, team: usize, robot: usize, enable: bool) {
        trace!("hold ball ignored: team={}, robot={}, enable={}", team, robot, enable);
    }
}

pub struct Actuator<B> {
    table: Arc<CommandTable>,
    link: Arc<Link<B>>,
    scheduler: Scheduler,
}

impl<B: Backbone> Actuator<B> {
    pub fn new(backbone: B, players_per_team: usize, geometry: DriveGeometry) -> Self {
        Self {
            table: Arc::new(CommandTable::new(players_per_team, geometry)),
            link: Arc::new(Link::new(backbone)),
            scheduler: Scheduler::new(),
        }
    }

    pub fn handle(&self) -> CommandHandle {
        CommandHandle {
            table: Arc::clone(&self.table),
        }
    }

    pub fn backbone(&self) -> &B {
        self.link.backbone()
    }

    /// Connect the backbone, then the simulator socket
    pub async fn connect(
        &self,
        backbone_address: &str,
        backbone_port: u16,
        sim_address: &str,
        sim_port: u16,
    ) -> Result<SocketAddr> {
        self.link
            .connect(backbone_address, backbone_port, sim_address, sim_port)
            .await
    }

    pub async fn disconnect(&self) {
        self.link.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn set_loop_frequency(&self, hz: u32) -> Result<()> {
        self.scheduler.state().set_frequency(hz)
    }

    pub fn loop_period(&self) -> Duration {
        self.scheduler.state().period()
    }

    pub fn start(&mut self) -> Result<()> {
        self.scheduler
            .start(Arc::clone(&self.table), Arc::clone(&self.link))
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Stops the loop from a task that does not own the actuator
    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stop the loop, wait for its current tick, then release the link
    pub async fn shutdown(&mut self, limit: Duration) {
        info!("Shutting down actuator");
        self.scheduler.join(limit).await;
        self.link.disconnect().await;
    }
}
