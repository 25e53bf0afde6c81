// Message types published by the runtime

use serde::{Deserialize, Serialize};

/// Wheel throttle frame sent on the drive channel, runtime -> base
///
/// Values are clamped to [-1.0, 1.0] before they get here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveActuation {
    pub left: f64,
    pub right: f64,
    /// Monotonic nanoseconds since the runtime started
    pub stamp_nanos: u64,
}

impl DriveActuation {
    pub fn new(left: f64, right: f64, stamp_nanos: u64) -> Self {
        Self {
            left,
            right,
            stamp_nanos,
        }
    }

    pub fn throttle(&self) -> (f64, f64) {
        (self.left, self.right)
    }
}

/// Health status published by runtime, once per tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    /// No pose yet, or the tick ran open loop without feedback
    NoPose,
    /// Command watchdog expired, base stopped
    CmdStale,
    /// The tick faulted and was turned into an estop
    Fault,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_wire_names() {
        assert_eq!(serde_json::to_string(&RuntimeHealth::NoPose).unwrap(), "\"no_pose\"");
        assert_eq!(serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(), "\"cmd_stale\"");
    }

    #[test]
    fn test_actuation_json() {
        let frame = DriveActuation::new(1.0, -0.5, 42);
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"left":1.0,"right":-0.5,"stamp_nanos":42}"#);
    }
}
