// Mode arbitration and heading hold
//
// Producers publish commands through a `DriveEventHandle` from any thread;
// only the latest one is ever seen. Each tick the arbiter dispatches that
// command into the velocity layer, applies the mode-transition cleanup rules,
// and drives the velocity layer's update.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::pid::{normalize_angle, PidController};
use super::velocity::{LoopState, VelocityLayer};
use crate::command::{CommandKind, DriveCommand};
use crate::messages::RuntimeHealth;
use crate::pose::{self, PoseError, PoseSample, PoseSource};
use crate::transport::DriveSink;

#[derive(Debug)]
struct StampedCommand {
    command: DriveCommand,
    received_at: Instant,
}

/// Cloneable publish side of the command slot
#[derive(Debug, Clone)]
pub struct DriveEventHandle {
    slot: Arc<ArcSwap<StampedCommand>>,
}

impl DriveEventHandle {
    fn new() -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(StampedCommand {
                command: DriveCommand::Estop,
                received_at: Instant::now(),
            })),
        }
    }

    /// Replace the current command. `None` stops the base.
    pub fn handle_drive_event(&self, command: Option<DriveCommand>) {
        self.slot.store(Arc::new(StampedCommand {
            command: DriveCommand::from(command),
            received_at: Instant::now(),
        }));
    }

    pub fn send(&self, command: DriveCommand) {
        self.handle_drive_event(Some(command));
    }

    pub fn current(&self) -> DriveCommand {
        self.slot.load().command
    }

    fn load(&self) -> (DriveCommand, Instant) {
        let stamped = self.slot.load();
        (stamped.command, stamped.received_at)
    }
}

fn holds_heading(kind: CommandKind) -> bool {
    matches!(kind, CommandKind::Heading | CommandKind::HeadingLinVel)
}

pub struct Arbiter<S> {
    velocity: VelocityLayer<S>,
    heading_pid: PidController,
    commands: DriveEventHandle,
    command_timeout: Option<Duration>,

    prev_kind: CommandKind,
    prev_heading: Option<f64>,
    last_pose_stamp: Option<u64>,
}

impl<S: DriveSink> Arbiter<S> {
    pub fn new(velocity: VelocityLayer<S>, heading_pid: PidController) -> Self {
        Self {
            velocity,
            heading_pid,
            commands: DriveEventHandle::new(),
            command_timeout: None,
            prev_kind: CommandKind::Estop,
            prev_heading: None,
            last_pose_stamp: None,
        }
    }

    /// Stop the base if the latest command is older than `timeout`
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Wheels left disabled transmit zero whatever the command
    pub fn with_wheels_enabled(mut self, left: bool, right: bool) -> Self {
        self.velocity.set_wheels_enabled(left, right);
        self
    }

    /// Handle for producers on other threads/tasks
    pub fn handle(&self) -> DriveEventHandle {
        self.commands.clone()
    }

    pub fn handle_drive_event(&self, command: Option<DriveCommand>) {
        self.commands.handle_drive_event(command);
    }

    pub fn velocity(&self) -> &VelocityLayer<S> {
        &self.velocity
    }

    pub fn heading_pid(&self) -> &PidController {
        &self.heading_pid
    }

    pub fn prev_kind(&self) -> CommandKind {
        self.prev_kind
    }

    pub fn tick(&mut self, pose: Option<PoseSample>) -> RuntimeHealth {
        self.tick_at(pose, Instant::now())
    }

    /// Run one tick on whatever `source` holds. A malformed reading stops the
    /// base for this tick; only a missing one falls back to the heartbeat.
    pub fn tick_from(&mut self, source: &impl PoseSource) -> RuntimeHealth {
        match source.current_pose().transpose() {
            Ok(pose) => self.tick(pose),
            Err(e) => {
                let kind = self.commands.current().kind();
                self.fault(kind, &e)
            }
        }
    }

    /// Run one control tick as of `now`
    pub fn tick_at(&mut self, pose: Option<PoseSample>, now: Instant) -> RuntimeHealth {
        let elapsed = match &pose {
            Some(p) => {
                let elapsed = self
                    .last_pose_stamp
                    .map_or(Duration::ZERO, |t| p.elapsed_since(t));
                self.last_pose_stamp = Some(p.stamp_nanos);
                elapsed
            }
            None => Duration::ZERO,
        };

        let (mut command, received_at) = self.commands.load();
        let stale = self
            .command_timeout
            .is_some_and(|t| now.saturating_duration_since(received_at) > t);
        if stale {
            if self.prev_kind != CommandKind::Estop {
                warn!("Command stale, stopping base");
            }
            command = DriveCommand::Estop;
        }

        match self.step(command, pose.as_ref(), elapsed) {
            Ok(_) if stale => RuntimeHealth::CmdStale,
            Ok(LoopState::Faulted) => RuntimeHealth::Fault,
            Ok(_) if pose.is_none() => RuntimeHealth::NoPose,
            Ok(_) => RuntimeHealth::Ok,
            Err(e) => self.fault(command.kind(), &e),
        }
    }

    fn fault(&mut self, kind: CommandKind, e: &PoseError) -> RuntimeHealth {
        warn!("{} tick fault, stopping: {}", kind, e);
        self.velocity.estop();
        // Re-enter the mode cleanly once the fault clears
        self.prev_kind = CommandKind::Estop;
        RuntimeHealth::Fault
    }

    /// Final estop on shutdown
    pub fn shutdown(&mut self) {
        info!("Control loop shutting down, stopping base");
        self.commands.handle_drive_event(None);
        self.velocity.estop();
    }

    fn step(
        &mut self,
        command: DriveCommand,
        pose: Option<&PoseSample>,
        elapsed: Duration,
    ) -> pose::Result<LoopState> {
        let kind = command.kind();
        if kind != self.prev_kind {
            info!("Drive mode {} -> {}", self.prev_kind, kind);
        }

        match command {
            DriveCommand::Estop => self.velocity.estop(),
            DriveCommand::Motor { left, right } => self.velocity.set_motors(left, right),
            DriveCommand::Vel {
                angular_velocity,
                linear_velocity,
            } => {
                self.velocity.set_angular_velocity(angular_velocity);
                self.velocity.set_linear_velocity(linear_velocity);
            }
            DriveCommand::LinVel { linear_velocity } => self.set_linear(linear_velocity),
            DriveCommand::AngVel { angular_velocity } => {
                if holds_heading(self.prev_kind) {
                    self.velocity.set_linear_velocity(0.0);
                }
                self.velocity.set_angular_velocity(angular_velocity);
            }
            DriveCommand::HeadingLinVel {
                heading,
                linear_velocity,
            } => {
                self.set_linear(linear_velocity);
                self.hold_heading(heading, pose, elapsed)?;
            }
            DriveCommand::Heading { heading } => self.hold_heading(heading, pose, elapsed)?,
            DriveCommand::MoveTo { .. } => {
                if kind != self.prev_kind {
                    warn!("MOVE_TO is not supported by the drive controller, stopping");
                }
                self.velocity.estop();
            }
        }

        self.prev_kind = kind;
        Ok(self.velocity.update(pose, elapsed))
    }

    /// LINVEL rule: drop residual heading-hold rotation, then set speed
    fn set_linear(&mut self, lv: f64) {
        if holds_heading(self.prev_kind) {
            self.velocity.set_angular_velocity(0.0);
        }
        self.velocity.set_linear_velocity(lv);
    }

    fn hold_heading(
        &mut self,
        heading: f64,
        pose: Option<&PoseSample>,
        elapsed: Duration,
    ) -> pose::Result<()> {
        if !holds_heading(self.prev_kind) || self.prev_heading != Some(heading) {
            self.heading_pid.clear_integral();
            self.prev_heading = Some(heading);
        }

        // Nothing to steer against yet
        let Some(pose) = pose else {
            return Ok(());
        };

        let target = normalize_angle(heading);
        let measured = normalize_angle(pose.yaw()?);
        let av = self
            .heading_pid
            .compute_wrapped(elapsed.as_secs_f64(), target, measured);
        self.velocity.set_angular_velocity(av);
        Ok(())
    }
}
