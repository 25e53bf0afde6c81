// Loop rate, topics, and command-line configuration
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// Control loop frequency (~33 ms period)
pub const LOOP_HZ: u64 = 30;

pub const LOOP_PERIOD: Duration = Duration::from_millis(1000 / LOOP_HZ);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "diffbot/cmd/drive"; // commands
pub const TOPIC_POSE: &str = "diffbot/state/pose"; // localization
pub const TOPIC_GAINS: &str = "diffbot/config/gains"; // gain updates
pub const TOPIC_RT_DRIVE: &str = "diffbot/rt/drive"; // wheel throttle
pub const TOPIC_HEALTH: &str = "diffbot/state/health"; // health status

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Differential-drive control runtime over zenoh")]
pub struct Args {
    /// TOML file with PID gains per controller
    #[arg(long)]
    pub gains: Option<PathBuf>,

    /// Stop the base if no command arrives for this long (0 disables)
    #[arg(long, default_value_t = 0)]
    pub cmd_timeout_ms: u64,

    /// Hold the left wheel at zero throttle (bench testing)
    #[arg(long)]
    pub disable_left_wheel: bool,

    /// Hold the right wheel at zero throttle (bench testing)
    #[arg(long)]
    pub disable_right_wheel: bool,
}

impl Args {
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.cmd_timeout_ms > 0).then(|| Duration::from_millis(self.cmd_timeout_ms))
    }
}
