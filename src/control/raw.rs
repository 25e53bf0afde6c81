// Raw motor layer: holds the wheel throttle pair and transmits it every tick

use std::time::Instant;
use tracing::{debug, warn};

use crate::messages::DriveActuation;
use crate::transport::DriveSink;

/// Throttle limit on either wheel
pub const MAX_THROTTLE: f64 = 1.0;

pub struct RawMotors<S> {
    sink: S,
    origin: Instant,
    left: f64,
    right: f64,
    left_enabled: bool,
    right_enabled: bool,
}

impl<S: DriveSink> RawMotors<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            origin: Instant::now(),
            left: 0.0,
            right: 0.0,
            left_enabled: true,
            right_enabled: true,
        }
    }

    /// Hold a new throttle pair; sent on the next `update`
    pub fn set_motors(&mut self, left: f64, right: f64) {
        self.left = left;
        self.right = right;
    }

    /// Zero the throttle and send it right away
    pub fn estop(&mut self) {
        self.set_motors(0.0, 0.0);
        self.transmit();
    }

    /// Held left throttle, before clamping
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Held right throttle, before clamping
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Disabled wheels always transmit zero
    pub fn set_enabled(&mut self, left: bool, right: bool) {
        self.left_enabled = left;
        self.right_enabled = right;
    }

    pub fn enabled(&self) -> (bool, bool) {
        (self.left_enabled, self.right_enabled)
    }

    /// Clamp and transmit the held throttle. Called once per tick.
    pub fn update(&mut self) {
        self.transmit();
    }

    fn clamp(value: f64, enabled: bool) -> f64 {
        // NaN would pass through clamp()
        if !enabled || value.is_nan() {
            0.0
        } else {
            value.clamp(-MAX_THROTTLE, MAX_THROTTLE)
        }
    }

    fn transmit(&mut self) {
        let frame = DriveActuation::new(
            Self::clamp(self.left, self.left_enabled),
            Self::clamp(self.right, self.right_enabled),
            self.origin.elapsed().as_nanos() as u64,
        );
        debug!("Drive: left={:.3}, right={:.3}", frame.left, frame.right);

        if let Err(e) = self.sink.transmit(frame) {
            warn!("Failed to transmit drive frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingSink;

    #[test]
    fn test_set_motors_does_not_transmit() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        raw.set_motors(0.2, 0.3);
        assert_eq!(sink.len(), 0);
        raw.update();
        assert_eq!(sink.last(), Some((0.2, 0.3)));
    }

    #[test]
    fn test_update_clamps_but_keeps_held_values() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        raw.set_motors(2.0, -3.0);
        raw.update();

        assert_eq!(sink.last(), Some((1.0, -1.0)));
        assert_eq!((raw.left(), raw.right()), (2.0, -3.0));
    }

    #[test]
    fn test_estop_transmits_immediately() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        raw.set_motors(0.5, 0.5);
        raw.estop();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.last(), Some((0.0, 0.0)));
        assert_eq!((raw.left(), raw.right()), (0.0, 0.0));
    }

    #[test]
    fn test_disabled_wheel_sends_zero() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        raw.set_enabled(true, false);
        raw.set_motors(0.4, 0.4);
        raw.update();
        assert_eq!(sink.last(), Some((0.4, 0.0)));
    }

    #[test]
    fn test_nan_throttle_is_sent_as_zero() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        raw.set_motors(f64::NAN, 0.1);
        raw.update();
        assert_eq!(sink.last(), Some((0.0, 0.1)));
    }

    #[test]
    fn test_stamps_are_monotonic() {
        let sink = RecordingSink::default();
        let mut raw = RawMotors::new(sink.clone());
        for _ in 0..3 {
            raw.update();
        }
        let frames = sink.frames();
        assert!(frames.windows(2).all(|w| w[0].stamp_nanos <= w[1].stamp_nanos));
    }
}
