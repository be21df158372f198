use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The three motor ports on the NXT brick.
///
/// Port validity is enforced by the type system; strings only enter through
/// [`Motor::from_str`], which is the single place an unknown port can be
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motor {
    A,
    B,
    C,
}

impl Motor {
    /// All ports in fixed order, used by stop-all sweeps.
    pub const ALL: [Motor; 3] = [Motor::A, Motor::B, Motor::C];

    /// The joint name this motor publishes under (e.g., "a_motor_joint").
    pub fn joint_name(self) -> &'static str {
        match self {
            Motor::A => "a_motor_joint",
            Motor::B => "b_motor_joint",
            Motor::C => "c_motor_joint",
        }
    }

    /// Lowercase port letter, as written in config files.
    pub fn port_letter(self) -> char {
        match self {
            Motor::A => 'a',
            Motor::B => 'b',
            Motor::C => 'c',
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port_letter())
    }
}

impl FromStr for Motor {
    type Err = NxtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "A" => Ok(Motor::A),
            "b" | "B" => Ok(Motor::B),
            "c" | "C" => Ok(Motor::C),
            other => Err(NxtError::InvalidMotor {
                name: other.to_string(),
            }),
        }
    }
}

/// Effort command for a single motor joint.
///
/// `effort` is a normalized drive level; the gateway publishes `0.0` to stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointCommand {
    /// Joint name on the wire, e.g. "b_motor_joint".
    pub name: String,
    pub effort: f64,
}

impl JointCommand {
    pub fn new(motor: Motor, effort: f64) -> Self {
        Self {
            name: motor.joint_name().to_string(),
            effort,
        }
    }

    /// Zero-effort command for `motor`.
    pub fn stop(motor: Motor) -> Self {
        Self::new(motor, 0.0)
    }
}

/// Touch sensor reading: pressed or released.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub contact: bool,
}

/// Ultrasonic range reading in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub range: f64,
}

/// Color sensor reading.
///
/// The light-intensity sensor reuses this shape with only `intensity`
/// populated, matching the upstream nxt message set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub intensity: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        intensity: 0.0,
    };
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Colors the NXT color sensor reports as canonical rgb triples.
///
/// Anything outside the six-entry table is `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedColor {
    Black,
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Invalid,
}

/// Canonical rgb encoding per named color. Exact match only.
const COLOR_TABLE: [((f64, f64, f64), NamedColor); 6] = [
    ((0.0, 0.0, 0.0), NamedColor::Black),
    ((1.0, 1.0, 1.0), NamedColor::White),
    ((1.0, 0.0, 0.0), NamedColor::Red),
    ((0.0, 1.0, 0.0), NamedColor::Green),
    ((0.0, 0.0, 1.0), NamedColor::Blue),
    ((1.0, 1.0, 0.0), NamedColor::Yellow),
];

impl NamedColor {
    /// Classify a sensor triple against the canonical table.
    pub fn classify(r: f64, g: f64, b: f64) -> NamedColor {
        for (rgb, named) in COLOR_TABLE {
            if rgb == (r, g, b) {
                return named;
            }
        }
        NamedColor::Invalid
    }
}

impl From<Color> for NamedColor {
    fn from(c: Color) -> Self {
        NamedColor::classify(c.r, c.g, c.b)
    }
}

/// Unified event wrapper routed over the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "nxtbot-middleware::rosbridge"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
///
/// `Intensity` and `Color` share the wire shape; they differ only in which
/// topic carried them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    JointCommand(JointCommand),
    Contact(Contact),
    Range(Range),
    Intensity(Color),
    Color(Color),
}

/// Global error type spanning motor validation, motion control, and transport.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum NxtError {
    #[error("Invalid motor '{name}': valid ports are a, b, c")]
    InvalidMotor { name: String },

    #[error("Motion interrupted before the timed pulse completed")]
    MotionInterrupted,

    #[error("Transport not ready after {0:?}")]
    InitializationTimeout(Duration),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Bus Channel Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_parses_all_ports_case_insensitive() {
        assert_eq!("a".parse::<Motor>().unwrap(), Motor::A);
        assert_eq!("B".parse::<Motor>().unwrap(), Motor::B);
        assert_eq!("c".parse::<Motor>().unwrap(), Motor::C);
    }

    #[test]
    fn motor_parse_rejects_unknown_port_and_names_valid_ones() {
        let err = "x".parse::<Motor>().unwrap_err();
        assert!(matches!(err, NxtError::InvalidMotor { ref name } if name == "x"));
        assert!(err.to_string().contains("valid ports are a, b, c"));
    }

    #[test]
    fn motor_joint_names_follow_port_letter() {
        assert_eq!(Motor::A.joint_name(), "a_motor_joint");
        assert_eq!(Motor::B.joint_name(), "b_motor_joint");
        assert_eq!(Motor::C.joint_name(), "c_motor_joint");
    }

    #[test]
    fn joint_command_roundtrip() {
        let cmd = JointCommand::new(Motor::B, -1.0);
        let json = serde_json::to_string(&cmd).unwrap();
        let back: JointCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "b_motor_joint");
        assert!((back.effort - (-1.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_command_has_zero_effort() {
        let cmd = JointCommand::stop(Motor::C);
        assert_eq!(cmd.name, "c_motor_joint");
        assert_eq!(cmd.effort, 0.0);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "nxtbot-middleware::rosbridge",
            EventPayload::Range(Range { range: 0.42 }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
        match back.payload {
            EventPayload::Range(r) => assert!((r.range - 0.42).abs() < f64::EPSILON),
            _ => panic!("unexpected payload variant"),
        }
    }

    #[test]
    fn classify_covers_the_canonical_table() {
        assert_eq!(NamedColor::classify(0.0, 0.0, 0.0), NamedColor::Black);
        assert_eq!(NamedColor::classify(1.0, 1.0, 1.0), NamedColor::White);
        assert_eq!(NamedColor::classify(1.0, 0.0, 0.0), NamedColor::Red);
        assert_eq!(NamedColor::classify(0.0, 1.0, 0.0), NamedColor::Green);
        assert_eq!(NamedColor::classify(0.0, 0.0, 1.0), NamedColor::Blue);
        assert_eq!(NamedColor::classify(1.0, 1.0, 0.0), NamedColor::Yellow);
    }

    #[test]
    fn classify_rejects_non_canonical_triples() {
        assert_eq!(NamedColor::classify(0.5, 0.5, 0.5), NamedColor::Invalid);
        assert_eq!(NamedColor::classify(1.0, 0.5, 0.0), NamedColor::Invalid);
        assert_eq!(NamedColor::classify(-1.0, 0.0, 0.0), NamedColor::Invalid);
    }

    #[test]
    fn named_color_from_color_sample() {
        let sample = Color {
            r: 0.0,
            g: 0.0,
            b: 1.0,
            intensity: 0.7,
        };
        assert_eq!(NamedColor::from(sample), NamedColor::Blue);
    }

    #[test]
    fn nxt_error_display() {
        let err = NxtError::InvalidMotor {
            name: "q".to_string(),
        };
        assert!(err.to_string().contains("'q'"));

        let err2 = NxtError::InitializationTimeout(Duration::from_secs(10));
        assert!(err2.to_string().contains("not ready"));
    }
}
