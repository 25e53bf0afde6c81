// Velocity layer: closes angular/linear velocity loops on top of the raw motors
//
// In velocity mode the PID outputs are stacked onto the throttle the raw
// layer is already holding, so the throttle integrates the corrections tick
// by tick. Outside velocity mode raw throttle passes straight through.

use std::time::Duration;
use tracing::warn;

use super::pid::PidController;
use super::raw::RawMotors;
use crate::pose::{self, PoseSample};
use crate::transport::DriveSink;

/// What the velocity layer did on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Raw throttle passed through
    OpenLoop,
    /// Velocity mode, corrections applied
    ClosedLoop,
    /// Velocity mode but no pose, held throttle sent unchanged
    NoPose,
    /// Correction failed, base stopped for this tick
    Faulted,
}

pub struct VelocityLayer<S> {
    raw: RawMotors<S>,
    angular_pid: PidController,
    linear_pid: PidController,
    enabled: bool,
    angular_target: f64,
    linear_target: f64,
}

impl<S: DriveSink> VelocityLayer<S> {
    pub fn new(raw: RawMotors<S>, angular_pid: PidController, linear_pid: PidController) -> Self {
        Self {
            raw,
            angular_pid,
            linear_pid,
            enabled: false,
            angular_target: 0.0,
            linear_target: 0.0,
        }
    }

    /// Leaves velocity mode with both targets zeroed
    pub fn estop(&mut self) {
        self.leave_velocity_mode();
        self.raw.estop();
    }

    /// Open-loop throttle, leaves velocity mode
    pub fn set_motors(&mut self, left: f64, right: f64) {
        self.leave_velocity_mode();
        self.raw.set_motors(left, right);
    }

    /// Target yaw rate in rad/s
    pub fn set_angular_velocity(&mut self, av: f64) {
        self.enter_velocity_mode();
        self.angular_target = av;
    }

    /// Target forward speed in m/s
    pub fn set_linear_velocity(&mut self, lv: f64) {
        self.enter_velocity_mode();
        self.linear_target = lv;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn angular_target(&self) -> f64 {
        self.angular_target
    }

    pub fn linear_target(&self) -> f64 {
        self.linear_target
    }

    pub fn raw(&self) -> &RawMotors<S> {
        &self.raw
    }

    pub fn set_wheels_enabled(&mut self, left: bool, right: bool) {
        self.raw.set_enabled(left, right);
    }

    pub fn angular_pid(&self) -> &PidController {
        &self.angular_pid
    }

    pub fn linear_pid(&self) -> &PidController {
        &self.linear_pid
    }

    /// Apply feedback (if in velocity mode and a pose is available), then
    /// transmit. Always transmits exactly one frame.
    pub fn update(&mut self, pose: Option<&PoseSample>, elapsed: Duration) -> LoopState {
        let state = match (self.enabled, pose) {
            (false, _) => LoopState::OpenLoop,
            (true, None) => LoopState::NoPose,
            (true, Some(pose)) => match self.correct(pose, elapsed) {
                Ok(()) => LoopState::ClosedLoop,
                Err(e) => {
                    warn!("Velocity control fault, stopping: {}", e);
                    self.leave_velocity_mode();
                    self.raw.set_motors(0.0, 0.0);
                    LoopState::Faulted
                }
            },
        };

        self.raw.update();
        state
    }

    fn enter_velocity_mode(&mut self) {
        if !self.enabled {
            self.angular_pid.clear_integral();
            self.linear_pid.clear_integral();
            self.enabled = true;
        }
    }

    // Targets never outlive velocity mode
    fn leave_velocity_mode(&mut self) {
        self.enabled = false;
        self.angular_target = 0.0;
        self.linear_target = 0.0;
    }

    fn correct(&mut self, pose: &PoseSample, elapsed: Duration) -> pose::Result<()> {
        // Read everything first so a bad sample leaves the PIDs untouched
        let yaw_rate = pose.yaw_rate()?;
        let forward = pose.forward_speed()?;
        let dt = elapsed.as_secs_f64();

        let aout = self.angular_pid.compute(dt, self.angular_target, yaw_rate);
        let lout = self.linear_pid.compute(dt, self.linear_target, forward);

        // Positive yaw rate is counter-clockwise: slow the left wheel, speed up the right
        let left = self.raw.left() - aout + lout;
        let right = self.raw.right() + aout + lout;
        self.raw.set_motors(left, right);
        Ok(())
    }
}
