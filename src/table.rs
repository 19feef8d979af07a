// Per-robot command staging
//
// A fixed 2 x N grid of the latest wheel command for every robot, each with a
// dirty flag. Writers mark slots dirty; the scheduler drains them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ActuatorError, Result};
use crate::kinematics::{DriveGeometry, WheelSpeeds};

/// Number of teams on the field
pub const TEAMS: usize = 2;

/// Default robots per team
pub const PLAYERS_PER_TEAM: usize = 3;

/// Latest command for one robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotCommand {
    id: u32,
    yellow_team: bool,
    wheels: WheelSpeeds,
    dirty: bool,
}

impl RobotCommand {
    fn new(team: usize, robot: usize) -> Self {
        Self {
            id: robot as u32,
            yellow_team: team == 0, // team 0 is the primary (yellow) team
            wheels: WheelSpeeds::zero(),
            dirty: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn yellow_team(&self) -> bool {
        self.yellow_team
    }

    pub fn wheels(&self) -> WheelSpeeds {
        self.wheels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// A drained command, ready to go on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub id: u32,
    pub yellow_team: bool,
    pub wheel_left: f64,
    pub wheel_right: f64,
}

impl WheelCommand {
    pub fn team(&self) -> usize {
        if self.yellow_team { 0 } else { 1 }
    }
}

pub struct CommandTable {
    players: usize,
    geometry: DriveGeometry,
    // team-major: slot (team, robot) lives at team * players + robot
    slots: Mutex<Vec<RobotCommand>>,
}

impl CommandTable {
    pub fn new(players: usize, geometry: DriveGeometry) -> Self {
        let slots = (0..TEAMS)
            .flat_map(|team| (0..players).map(move |robot| RobotCommand::new(team, robot)))
            .collect();
        Self {
            players,
            geometry,
            slots: Mutex::new(slots),
        }
    }

    fn index(&self, team: usize, robot: usize) -> Result<usize> {
        if team >= TEAMS {
            return Err(ActuatorError::InvalidTeam(team));
        }
        if robot >= self.players {
            return Err(ActuatorError::InvalidRobot {
                robot,
                players: self.players,
            });
        }
        Ok(team * self.players + robot)
    }

    // Slots hold plain values, so a panicked writer cannot leave them half-built
    fn lock(&self) -> MutexGuard<'_, Vec<RobotCommand>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the wheel speeds for a desired body velocity and mark the slot dirty
    pub fn set_speed(&self, team: usize, robot: usize, v: f64, w: f64) -> Result<WheelSpeeds> {
        let wheels = self.geometry.wheel_speeds(v, w);
        self.set_wheel_speeds(team, robot, wheels)?;
        Ok(wheels)
    }

    /// Store raw wheel speeds, bypassing kinematics
    pub fn set_wheel_speeds(&self, team: usize, robot: usize, wheels: WheelSpeeds) -> Result<()> {
        let idx = self.index(team, robot)?;
        let mut slots = self.lock();
        let slot = &mut slots[idx];
        slot.wheels = wheels;
        slot.dirty = true;
        Ok(())
    }

    /// Snapshot of one slot
    pub fn get(&self, team: usize, robot: usize) -> Result<RobotCommand> {
        let idx = self.index(team, robot)?;
        Ok(self.lock()[idx])
    }

    /// Take every dirty slot and clear its flag, in table order
    pub fn drain_dirty(&self) -> Vec<WheelCommand> {
        let mut slots = self.lock();
        slots
            .iter_mut()
            .filter(|slot| slot.dirty)
            .map(|slot| {
                slot.dirty = false;
                WheelCommand {
                    id: slot.id,
                    yellow_team: slot.yellow_team,
                    wheel_left: slot.wheels.left,
                    wheel_right: slot.wheels.right,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn table() -> CommandTable {
        CommandTable::new(PLAYERS_PER_TEAM, DriveGeometry::new(0.066, 0.016).unwrap())
    }

    #[test]
    fn test_initial_state() {
        let table = table();
        for team in 0..TEAMS {
            for robot in 0..PLAYERS_PER_TEAM {
                let slot = table.get(team, robot).unwrap();
                assert_eq!(slot.id(), robot as u32);
                assert_eq!(slot.yellow_team(), team == 0);
                assert_eq!(slot.wheels(), WheelSpeeds::zero());
                assert!(!slot.is_dirty());
            }
        }
        assert!(table.drain_dirty().is_empty());
    }

    #[test]
    fn test_set_then_drain_yields_one_entry() {
        let table = table();
        let wheels = table.set_speed(0, 1, 1.0, 0.0).unwrap();
        assert!((wheels.left - 62.5).abs() < 1e-9);

        let drained = table.drain_dirty();
        assert_eq!(drained.len(), 1);
        let cmd = drained[0];
        assert_eq!(cmd.id, 1);
        assert!(cmd.yellow_team);
        assert_eq!(cmd.team(), 0);
        assert!((cmd.wheel_left - 62.5).abs() < 1e-9);
        assert!((cmd.wheel_right - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_second_drain_is_empty() {
        let table = table();
        table.set_speed(1, 2, 0.4, 1.0).unwrap();
        assert_eq!(table.drain_dirty().len(), 1);
        assert!(table.drain_dirty().is_empty());
    }

    #[test]
    fn test_latest_write_wins_within_a_drain() {
        let table = table();
        table.set_speed(0, 0, 1.0, 0.0).unwrap();
        table.set_speed(0, 0, 0.5, 0.0).unwrap();
        let drained = table.drain_dirty();
        assert_eq!(drained.len(), 1);
        assert!((drained[0].wheel_left - 31.25).abs() < 1e-9);
    }

    #[test]
    fn test_drain_order_is_table_order() {
        let table = table();
        table.set_speed(1, 0, 0.1, 0.0).unwrap();
        table.set_speed(0, 2, 0.1, 0.0).unwrap();
        table.set_speed(0, 0, 0.1, 0.0).unwrap();

        let order: Vec<(usize, u32)> = table.drain_dirty().iter().map(|c| (c.team(), c.id)).collect();
        assert_eq!(order, vec![(0, 0), (0, 2), (1, 0)]);
    }

    #[test]
    fn test_raw_wheel_speeds_stored_verbatim() {
        let table = table();
        table.set_wheel_speeds(1, 0, WheelSpeeds::new(3.0, -4.0)).unwrap();
        let drained = table.drain_dirty();
        assert_eq!(drained[0].wheel_left, 3.0);
        assert_eq!(drained[0].wheel_right, -4.0);
        assert!(!drained[0].yellow_team);
    }

    #[test]
    fn test_out_of_range_rejected_without_mutation() {
        let table = table();
        assert!(matches!(
            table.set_speed(2, 0, 1.0, 0.0),
            Err(ActuatorError::InvalidTeam(2))
        ));
        assert!(matches!(
            table.set_speed(0, PLAYERS_PER_TEAM, 1.0, 0.0),
            Err(ActuatorError::InvalidRobot { robot: 3, players: 3 })
        ));
        assert!(table.drain_dirty().is_empty());
    }

    #[test]
    fn test_concurrent_writers_never_lose_a_slot() {
        let table = Arc::new(table());
        let writers: Vec<_> = (0..TEAMS * PLAYERS_PER_TEAM)
            .map(|n| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..200 {
                        table
                            .set_speed(n / PLAYERS_PER_TEAM, n % PLAYERS_PER_TEAM, i as f64, 0.0)
                            .unwrap();
                    }
                })
            })
            .collect();

        let mut seen = 0;
        for _ in 0..50 {
            seen += table.drain_dirty().len();
        }
        for writer in writers {
            writer.join().unwrap();
        }
        // Every slot's final write is visible in some drain
        seen += table.drain_dirty().len();
        assert!(seen >= TEAMS * PLAYERS_PER_TEAM);

        for team in 0..TEAMS {
            for robot in 0..PLAYERS_PER_TEAM {
                let slot = table.get(team, robot).unwrap();
                assert!(!slot.is_dirty());
                assert!((slot.wheels().left - 199.0 / 0.016).abs() < 1e-6);
            }
        }
    }
}
