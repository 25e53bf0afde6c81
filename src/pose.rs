// Robot pose feedback from the external localization source
//
// Samples arrive as JSON on the pose topic and are kept as the latest
// snapshot. Validation (orientation length, finite values) happens when the
// control loop reads yaw or forward speed, so a bad sample only faults the
// tick that uses it. Payloads that do not decode at all are stored as a fault
// so they are never mistaken for a missing fix.

use arc_swap::ArcSwapOption;
use nalgebra::{Quaternion, Rotation2, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoseError {
    #[error("orientation must be a quaternion [x, y, z, w], got {len} values")]
    BadOrientation { len: usize },

    #[error("pose contains a non-finite {what}")]
    NonFinite { what: &'static str },

    #[error("malformed pose payload: {reason}")]
    Malformed { reason: String },
}

pub type Result<T> = std::result::Result<T, PoseError>;

/// One localization snapshot (world frame)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    /// Position in meters [x, y, z]
    pub position: [f64; 3],
    /// Orientation quaternion [x, y, z, w]
    #[serde(default)]
    pub orientation: Vec<f64>,
    /// World-frame linear velocity in m/s
    pub linear_velocity: [f64; 3],
    /// Angular rate in rad/s, z is yaw rate
    pub angular_velocity: [f64; 3],
    /// Monotonic timestamp from the localization source
    pub stamp_nanos: u64,
}

impl PoseSample {
    /// Build a planar sample from yaw, for simulators and tests
    pub fn planar(
        x: f64,
        y: f64,
        yaw: f64,
        velocity: [f64; 2],
        yaw_rate: f64,
        stamp_nanos: u64,
    ) -> Self {
        let half = yaw / 2.0;
        Self {
            position: [x, y, 0.0],
            orientation: vec![0.0, 0.0, half.sin(), half.cos()],
            linear_velocity: [velocity[0], velocity[1], 0.0],
            angular_velocity: [0.0, 0.0, yaw_rate],
            stamp_nanos,
        }
    }

    /// Yaw in radians, (-pi, pi]
    pub fn yaw(&self) -> Result<f64> {
        let [x, y, z, w] = match self.orientation.as_slice() {
            &[x, y, z, w] => [x, y, z, w],
            other => return Err(PoseError::BadOrientation { len: other.len() }),
        };
        let q = Quaternion::new(w, x, y, z);
        if !q.coords.iter().all(|c| c.is_finite()) || q.norm() == 0.0 {
            return Err(PoseError::NonFinite { what: "orientation" });
        }

        let (_roll, _pitch, yaw) = UnitQuaternion::from_quaternion(q).euler_angles();
        Ok(yaw)
    }

    /// Yaw rate in rad/s
    pub fn yaw_rate(&self) -> Result<f64> {
        let rate = self.angular_velocity[2];
        if !rate.is_finite() {
            return Err(PoseError::NonFinite {
                what: "angular velocity",
            });
        }
        Ok(rate)
    }

    /// Forward speed in m/s: world velocity rotated into the body frame by -yaw
    pub fn forward_speed(&self) -> Result<f64> {
        let v = Vector2::new(self.linear_velocity[0], self.linear_velocity[1]);
        if !v.iter().all(|c| c.is_finite()) {
            return Err(PoseError::NonFinite {
                what: "linear velocity",
            });
        }

        let body = Rotation2::new(-self.yaw()?) * v;
        Ok(body.x)
    }

    /// Time from `earlier` to this sample, zero if the stamps go backwards
    pub fn elapsed_since(&self, earlier_nanos: u64) -> Duration {
        Duration::from_nanos(self.stamp_nanos.saturating_sub(earlier_nanos))
    }
}

/// Source of the most recent pose.
///
/// `None` means localization has not produced a fix yet. `Some(Err(_))` means
/// the latest payload was unusable, which is a fault rather than an absence.
pub trait PoseSource {
    fn current_pose(&self) -> Option<Result<PoseSample>>;
}

/// Latest-value pose store shared between the pose subscriber and the loop
#[derive(Debug, Clone, Default)]
pub struct LatestPose {
    inner: Arc<ArcSwapOption<Result<PoseSample>>>,
}

impl LatestPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, pose: PoseSample) {
        self.inner.store(Some(Arc::new(Ok(pose))));
    }

    /// Decode a JSON payload and store it. An undecodable payload replaces
    /// the previous sample with a fault.
    pub fn store_payload(&self, payload: &[u8]) -> Result<()> {
        let reading = serde_json::from_slice::<PoseSample>(payload).map_err(|e| {
            PoseError::Malformed {
                reason: e.to_string(),
            }
        });
        let outcome = reading.as_ref().map(|_| ()).map_err(Clone::clone);
        self.inner.store(Some(Arc::new(reading)));
        outcome
    }
}

impl PoseSource for LatestPose {
    fn current_pose(&self) -> Option<Result<PoseSample>> {
        self.inner.load_full().map(|p| (*p).clone())
    }
}
