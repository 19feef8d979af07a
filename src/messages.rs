// Message types carried on the backbone command topic

use serde::{Deserialize, Serialize};

use crate::actuator::Actuation;
use crate::error::Result;

// Command from the decision system -> actuator
// Tagged by "type" so one topic carries every actuation hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackboneCommand {
    /// Body velocity: `v` in m/s, `w` in rad/s
    Speed { team: usize, robot: usize, v: f64, w: f64 },
    /// Raw wheel speeds, no kinematics applied
    Wheels { team: usize, robot: usize, left: f64, right: f64 },
    Kick { team: usize, robot: usize, power: f32 },
    ChipKick { team: usize, robot: usize, power: f32 },
    KickOnTouch { team: usize, robot: usize, enable: bool, power: f32 },
    ChipKickOnTouch { team: usize, robot: usize, enable: bool, power: f32 },
    HoldBall { team: usize, robot: usize, enable: bool },
}

impl BackboneCommand {
    /// Hand the command to an actuation target
    pub fn apply<A: Actuation>(&self, target: &A) -> Result<()> {
        match *self {
            Self::Speed { team, robot, v, w } => target.set_speed(team, robot, v, w).map(|_| ()),
            Self::Wheels {
                team,
                robot,
                left,
                right,
            } => target.set_wheel_speeds(team, robot, left, right),
            Self::Kick { team, robot, power } => {
                target.kick(team, robot, power);
                Ok(())
            }
            Self::ChipKick { team, robot, power } => {
                target.chip_kick(team, robot, power);
                Ok(())
            }
            Self::KickOnTouch {
                team,
                robot,
                enable,
                power,
            } => {
                target.kick_on_touch(team, robot, enable, power);
                Ok(())
            }
            Self::ChipKickOnTouch {
                team,
                robot,
                enable,
                power,
            } => {
                target.chip_kick_on_touch(team, robot, enable, power);
                Ok(())
            }
            Self::HoldBall {
                team,
                robot,
                enable,
            } => {
                target.hold_ball(team, robot, enable);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Actuator;
    use crate::error::ActuatorError;
    use crate::kinematics::DriveGeometry;
    use crate::link::tests::FakeBackbone;

    #[test]
    fn test_parse_speed() {
        let cmd: BackboneCommand =
            serde_json::from_str(r#"{"type":"speed","team":0,"robot":1,"v":1.0,"w":0.0}"#).unwrap();
        assert_eq!(
            cmd,
            BackboneCommand::Speed {
                team: 0,
                robot: 1,
                v: 1.0,
                w: 0.0
            }
        );
    }

    #[test]
    fn test_parse_ball_hooks() {
        let cmd: BackboneCommand = serde_json::from_str(
            r#"{"type":"chip_kick_on_touch","team":1,"robot":2,"enable":true,"power":3.5}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            BackboneCommand::ChipKickOnTouch { team: 1, robot: 2, enable: true, .. }
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(
            serde_json::from_str::<BackboneCommand>(r#"{"type":"dribble","team":0,"robot":0}"#)
                .is_err()
        );
    }

    #[test]
    fn test_apply_stages_commands() {
        let actuator = Actuator::new(FakeBackbone::default(), 3, DriveGeometry::new(0.066, 0.016).unwrap());
        let handle = actuator.handle();

        BackboneCommand::Speed { team: 0, robot: 1, v: 1.0, w: 0.0 }
            .apply(&handle)
            .unwrap();
        BackboneCommand::HoldBall { team: 1, robot: 0, enable: true }
            .apply(&handle)
            .unwrap();

        let staged = handle.get(0, 1).unwrap();
        assert!(staged.is_dirty());
        assert!((staged.wheels().right - 62.5).abs() < 1e-9);
        assert!(!handle.get(1, 0).unwrap().is_dirty());

        let err = BackboneCommand::Wheels { team: 0, robot: 5, left: 1.0, right: 1.0 }
            .apply(&handle)
            .unwrap_err();
        assert!(matches!(err, ActuatorError::InvalidRobot { robot: 5, .. }));
    }
}
