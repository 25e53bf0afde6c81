// Cascaded drive control for the differential base
//
// Three stages, each testable on its own:
// - arbiter: latest command -> velocity/heading targets, mode cleanup
// - velocity: angular/linear velocity PIDs -> throttle corrections
// - raw: held throttle -> clamped frame on the drive channel

pub mod arbiter;
pub mod gains;
pub mod pid;
pub mod raw;
pub mod velocity;

pub use arbiter::{Arbiter, DriveEventHandle};
pub use gains::{GainRegistry, GainTable, GainsError, PidGains};
pub use pid::PidController;
pub use raw::RawMotors;
pub use velocity::{LoopState, VelocityLayer};

use crate::transport::DriveSink;

/// Build the full controller stack, registering each PID with the gain
/// registry so later gain updates reach it.
///
/// Controllers missing from `initial` start from the built-in defaults.
pub fn build_controller<S: DriveSink>(
    sink: S,
    registry: &mut GainRegistry,
    initial: &GainTable,
) -> Arbiter<S> {
    let defaults = GainTable::defaults();
    let mut controller = |name: &str| {
        let start = initial
            .get(name)
            .or_else(|| defaults.get(name))
            .unwrap_or_default();
        PidController::new(name, registry.register(name, start))
    };

    let angular = controller(gains::ANGULAR_VELOCITY);
    let linear = controller(gains::LINEAR_VELOCITY);
    let heading = controller(gains::HEADING);

    let velocity = VelocityLayer::new(RawMotors::new(sink), angular, linear);
    Arbiter::new(velocity, heading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DriveCommand;
    use crate::pose::PoseSample;
    use crate::transport::testing::RecordingSink;

    #[test]
    fn test_gain_update_reaches_running_controller() {
        let sink = RecordingSink::default();
        let mut registry = GainRegistry::new();
        let mut table = GainTable::default();
        table
            .controllers
            .insert(gains::HEADING.to_string(), PidGains::new(1.0, 0.0, 0.0));
        let mut arb = build_controller(sink, &mut registry, &table);

        assert_eq!(arb.heading_pid().gains(), PidGains::new(1.0, 0.0, 0.0));
        // Angular velocity fell back to the defaults
        assert_eq!(
            arb.velocity().angular_pid().gains(),
            GainTable::defaults().get(gains::ANGULAR_VELOCITY).unwrap()
        );

        arb.handle().send(DriveCommand::heading(0.5));
        arb.tick(Some(PoseSample::planar(0.0, 0.0, 0.0, [0.0, 0.0], 0.0, 0)));
        assert!((arb.velocity().angular_target() - 0.5).abs() < 1e-9);

        let mut update = GainTable::default();
        update
            .controllers
            .insert(gains::HEADING.to_string(), PidGains::new(2.0, 0.0, 0.0));
        assert_eq!(registry.apply(&update).unwrap(), 1);

        arb.tick(Some(PoseSample::planar(0.0, 0.0, 0.0, [0.0, 0.0], 0.0, 1)));
        assert!((arb.velocity().angular_target() - 1.0).abs() < 1e-9);
    }
}
