// PID feedback controller
//
// Evaluated once per tick with an explicit dt. Gains are read from a shared
// handle so they can be hot-swapped by the gain store between ticks.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use super::gains::{gain_handle, GainHandle, PidGains};

/// Wrap an angle into [-pi, pi)
pub fn normalize_angle(angle: f64) -> f64 {
    let a = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can round up to TAU for tiny negative inputs
    if a >= PI { a - TAU } else { a }
}

/// A named PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    name: String,
    gains: GainHandle,

    /// Accumulated error * dt
    integral: f64,

    /// Error from the previous evaluation, for the derivative term
    prev_error: Option<f64>,
}

impl PidController {
    pub fn new(name: &str, gains: GainHandle) -> Self {
        Self {
            name: name.to_string(),
            gains,
            integral: 0.0,
            prev_error: None,
        }
    }

    /// Controller with its own private gains (tests, tools)
    pub fn with_gains(name: &str, gains: PidGains) -> Self {
        Self::new(name, gain_handle(gains))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gains(&self) -> PidGains {
        **self.gains.load()
    }

    /// Replace all three coefficients at once
    pub fn set_gains(&self, gains: PidGains) {
        self.gains.store(Arc::new(gains));
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Reset the integral and derivative history
    pub fn clear_integral(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    /// Standard PID on `target - measured`
    pub fn compute(&mut self, dt: f64, target: f64, measured: f64) -> f64 {
        self.step(dt, target - measured)
    }

    /// PID on the shortest angular distance from `measured` to `target`
    pub fn compute_wrapped(&mut self, dt: f64, target: f64, measured: f64) -> f64 {
        self.step(dt, normalize_angle(target - measured))
    }

    fn step(&mut self, dt: f64, error: f64) -> f64 {
        let gains = self.gains.load();

        // Without a time step there is nothing to integrate or differentiate,
        // so only the proportional term acts.
        let derivative = if dt > 0.0 {
            self.integral += error * dt;
            match self.prev_error {
                Some(prev) => (error - prev) / dt,
                None => 0.0,
            }
        } else {
            0.0
        };
        self.prev_error = Some(error);

        gains.kp * error + gains.ki * self.integral + gains.kd * derivative
    }
}
