// Drive commands issued by planners/teleop -> runtime
//
// Each variant carries only the fields that mean something for it. The
// accessors below are for callers that only hold a command generically (logging,
// bridges); the control loop matches on the enum directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command tag, used for transition detection and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Estop,
    Motor,
    Vel,
    #[serde(rename = "ANGVEL")]
    AngVel,
    #[serde(rename = "LINVEL")]
    LinVel,
    Heading,
    #[serde(rename = "HEADING_LINVEL")]
    HeadingLinVel,
    MoveTo,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Estop => "ESTOP",
            CommandKind::Motor => "MOTOR",
            CommandKind::Vel => "VEL",
            CommandKind::AngVel => "ANGVEL",
            CommandKind::LinVel => "LINVEL",
            CommandKind::Heading => "HEADING",
            CommandKind::HeadingLinVel => "HEADING_LINVEL",
            CommandKind::MoveTo => "MOVE_TO",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a command may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandField {
    Left,
    Right,
    AngularVelocity,
    LinearVelocity,
    Heading,
    X,
    Y,
    Theta,
}

impl fmt::Display for CommandField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandField::Left => "left",
            CommandField::Right => "right",
            CommandField::AngularVelocity => "angular_velocity",
            CommandField::LinearVelocity => "linear_velocity",
            CommandField::Heading => "heading",
            CommandField::X => "x",
            CommandField::Y => "y",
            CommandField::Theta => "theta",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("{kind} command has no `{field}` field")]
    FieldNotValid {
        kind: CommandKind,
        field: CommandField,
    },
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// A single motion intent. Constructed once per issuance and never mutated.
///
/// Wire format is JSON tagged by `"type"`, e.g.
/// `{"type":"HEADING_LINVEL","heading":1.57,"linear_velocity":0.2}`.
/// A field that belongs to another tag is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub enum DriveCommand {
    #[default]
    Estop,
    /// Raw wheel throttle, nominally in [-1.0, 1.0]
    Motor { left: f64, right: f64 },
    /// rad/s and m/s
    Vel {
        angular_velocity: f64,
        linear_velocity: f64,
    },
    #[serde(rename = "ANGVEL")]
    AngVel { angular_velocity: f64 },
    #[serde(rename = "LINVEL")]
    LinVel { linear_velocity: f64 },
    /// Absolute heading in radians, any range
    Heading { heading: f64 },
    #[serde(rename = "HEADING_LINVEL")]
    HeadingLinVel { heading: f64, linear_velocity: f64 },
    MoveTo { x: f64, y: f64, theta: f64 },
}

impl From<Option<DriveCommand>> for DriveCommand {
    /// An absent command is a stop, never "keep doing whatever we were doing"
    fn from(cmd: Option<DriveCommand>) -> Self {
        cmd.unwrap_or(DriveCommand::Estop)
    }
}

impl DriveCommand {
    pub fn estop() -> Self {
        DriveCommand::Estop
    }

    pub fn motor(left: f64, right: f64) -> Self {
        DriveCommand::Motor { left, right }
    }

    pub fn vel(angular_velocity: f64, linear_velocity: f64) -> Self {
        DriveCommand::Vel {
            angular_velocity,
            linear_velocity,
        }
    }

    pub fn ang_vel(angular_velocity: f64) -> Self {
        DriveCommand::AngVel { angular_velocity }
    }

    pub fn lin_vel(linear_velocity: f64) -> Self {
        DriveCommand::LinVel { linear_velocity }
    }

    pub fn heading(heading: f64) -> Self {
        DriveCommand::Heading { heading }
    }

    pub fn heading_lin_vel(heading: f64, linear_velocity: f64) -> Self {
        DriveCommand::HeadingLinVel {
            heading,
            linear_velocity,
        }
    }

    pub fn move_to(x: f64, y: f64, theta: f64) -> Self {
        DriveCommand::MoveTo { x, y, theta }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            DriveCommand::Estop => CommandKind::Estop,
            DriveCommand::Motor { .. } => CommandKind::Motor,
            DriveCommand::Vel { .. } => CommandKind::Vel,
            DriveCommand::AngVel { .. } => CommandKind::AngVel,
            DriveCommand::LinVel { .. } => CommandKind::LinVel,
            DriveCommand::Heading { .. } => CommandKind::Heading,
            DriveCommand::HeadingLinVel { .. } => CommandKind::HeadingLinVel,
            DriveCommand::MoveTo { .. } => CommandKind::MoveTo,
        }
    }

    fn invalid<T>(&self, field: CommandField) -> Result<T> {
        Err(CommandError::FieldNotValid {
            kind: self.kind(),
            field,
        })
    }

    /// Left throttle (MOTOR only)
    pub fn left(&self) -> Result<f64> {
        match *self {
            DriveCommand::Motor { left, .. } => Ok(left),
            _ => self.invalid(CommandField::Left),
        }
    }

    /// Right throttle (MOTOR only)
    pub fn right(&self) -> Result<f64> {
        match *self {
            DriveCommand::Motor { right, .. } => Ok(right),
            _ => self.invalid(CommandField::Right),
        }
    }

    /// Angular velocity target (VEL, ANGVEL)
    pub fn angular_velocity(&self) -> Result<f64> {
        match *self {
            DriveCommand::Vel {
                angular_velocity, ..
            }
            | DriveCommand::AngVel { angular_velocity } => Ok(angular_velocity),
            _ => self.invalid(CommandField::AngularVelocity),
        }
    }

    /// Linear velocity target (VEL, LINVEL, HEADING_LINVEL)
    ///
    /// ANGVEL is rejected: it carries no linear payload.
    pub fn linear_velocity(&self) -> Result<f64> {
        match *self {
            DriveCommand::Vel {
                linear_velocity, ..
            }
            | DriveCommand::LinVel { linear_velocity }
            | DriveCommand::HeadingLinVel {
                linear_velocity, ..
            } => Ok(linear_velocity),
            _ => self.invalid(CommandField::LinearVelocity),
        }
    }

    /// Heading target (HEADING, HEADING_LINVEL)
    pub fn heading_target(&self) -> Result<f64> {
        match *self {
            DriveCommand::Heading { heading } | DriveCommand::HeadingLinVel { heading, .. } => {
                Ok(heading)
            }
            _ => self.invalid(CommandField::Heading),
        }
    }

    pub fn x(&self) -> Result<f64> {
        match *self {
            DriveCommand::MoveTo { x, .. } => Ok(x),
            _ => self.invalid(CommandField::X),
        }
    }

    pub fn y(&self) -> Result<f64> {
        match *self {
            DriveCommand::MoveTo { y, .. } => Ok(y),
            _ => self.invalid(CommandField::Y),
        }
    }

    pub fn theta(&self) -> Result<f64> {
        match *self {
            DriveCommand::MoveTo { theta, .. } => Ok(theta),
            _ => self.invalid(CommandField::Theta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [CommandKind; 8] = [
        CommandKind::Estop,
        CommandKind::Motor,
        CommandKind::Vel,
        CommandKind::AngVel,
        CommandKind::LinVel,
        CommandKind::Heading,
        CommandKind::HeadingLinVel,
        CommandKind::MoveTo,
    ];

    const ALL_FIELDS: [CommandField; 8] = [
        CommandField::Left,
        CommandField::Right,
        CommandField::AngularVelocity,
        CommandField::LinearVelocity,
        CommandField::Heading,
        CommandField::X,
        CommandField::Y,
        CommandField::Theta,
    ];

    fn read(cmd: &DriveCommand, field: CommandField) -> Result<f64> {
        match field {
            CommandField::Left => cmd.left(),
            CommandField::Right => cmd.right(),
            CommandField::AngularVelocity => cmd.angular_velocity(),
            CommandField::LinearVelocity => cmd.linear_velocity(),
            CommandField::Heading => cmd.heading_target(),
            CommandField::X => cmd.x(),
            CommandField::Y => cmd.y(),
            CommandField::Theta => cmd.theta(),
        }
    }

    /// One sample command per tag, with the (field, value) pairs it owns
    fn samples() -> Vec<(DriveCommand, Vec<(CommandField, f64)>)> {
        use CommandField::*;
        vec![
            (DriveCommand::estop(), vec![]),
            (DriveCommand::motor(0.25, -0.5), vec![(Left, 0.25), (Right, -0.5)]),
            (
                DriveCommand::vel(0.3, 0.7),
                vec![(AngularVelocity, 0.3), (LinearVelocity, 0.7)],
            ),
            (DriveCommand::ang_vel(-1.2), vec![(AngularVelocity, -1.2)]),
            (DriveCommand::lin_vel(0.4), vec![(LinearVelocity, 0.4)]),
            (DriveCommand::heading(1.5), vec![(Heading, 1.5)]),
            (
                DriveCommand::heading_lin_vel(-2.0, 0.1),
                vec![(Heading, -2.0), (LinearVelocity, 0.1)],
            ),
            (
                DriveCommand::move_to(1.0, 2.0, 3.0),
                vec![(X, 1.0), (Y, 2.0), (Theta, 3.0)],
            ),
        ]
    }

    #[test]
    fn test_samples_cover_every_kind() {
        let kinds: Vec<CommandKind> = samples().iter().map(|(c, _)| c.kind()).collect();
        assert_eq!(kinds, ALL_KINDS.to_vec());
    }

    #[test]
    fn test_owned_fields_read_back() {
        for (cmd, owned) in samples() {
            for (field, value) in owned {
                assert_eq!(read(&cmd, field), Ok(value), "{} {}", cmd.kind(), field);
            }
        }
    }

    #[test]
    fn test_foreign_fields_are_rejected() {
        for (cmd, owned) in samples() {
            for field in ALL_FIELDS {
                if owned.iter().any(|(f, _)| *f == field) {
                    continue;
                }
                assert_eq!(
                    read(&cmd, field),
                    Err(CommandError::FieldNotValid {
                        kind: cmd.kind(),
                        field
                    }),
                    "{} should reject {}",
                    cmd.kind(),
                    field
                );
            }
        }
    }

    #[test]
    fn test_angvel_has_no_linear_velocity() {
        assert!(DriveCommand::ang_vel(1.0).linear_velocity().is_err());
    }

    #[test]
    fn test_absent_command_is_estop() {
        assert_eq!(DriveCommand::from(None), DriveCommand::Estop);
        assert_eq!(
            DriveCommand::from(Some(DriveCommand::lin_vel(0.2))),
            DriveCommand::lin_vel(0.2)
        );
    }

    #[test]
    fn test_wire_format() {
        let cmd: DriveCommand =
            serde_json::from_str(r#"{"type":"HEADING_LINVEL","heading":1.0,"linear_velocity":0.5}"#)
                .unwrap();
        assert_eq!(cmd, DriveCommand::heading_lin_vel(1.0, 0.5));

        let cmd: DriveCommand = serde_json::from_str(r#"{"type":"ANGVEL","angular_velocity":0.3}"#).unwrap();
        assert_eq!(cmd, DriveCommand::ang_vel(0.3));

        let cmd: DriveCommand = serde_json::from_str(r#"{"type":"ESTOP"}"#).unwrap();
        assert_eq!(cmd, DriveCommand::Estop);

        assert!(serde_json::from_str::<DriveCommand>(r#"{"type":"MOTOR","left":0.1}"#).is_err());

        let null: Option<DriveCommand> = serde_json::from_str("null").unwrap();
        assert_eq!(DriveCommand::from(null), DriveCommand::Estop);
    }

    #[test]
    fn test_fields_from_another_tag_are_rejected_on_the_wire() {
        for json in [
            r#"{"type":"ANGVEL","angular_velocity":0.3,"linear_velocity":5.0}"#,
            r#"{"type":"LINVEL","linear_velocity":0.3,"heading":1.0}"#,
            r#"{"type":"HEADING","heading":1.0,"angular_velocity":0.2}"#,
            r#"{"type":"MOTOR","left":0.1,"right":0.1,"x":1.0}"#,
        ] {
            assert!(serde_json::from_str::<DriveCommand>(json).is_err(), "{}", json);
        }
    }

    #[test]
    fn test_error_message_names_kind_and_field() {
        let err = DriveCommand::estop().left().unwrap_err();
        assert_eq!(err.to_string(), "ESTOP command has no `left` field");
    }
}
