// Keyboard teleop: W/S drive, A/D turn, 1-4 hold heading, R/F speed, Space stop, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use diffbot_zenoh_runtime::command::DriveCommand;
use diffbot_zenoh_runtime::config::TOPIC_CMD_DRIVE;
use std::f64::consts::{FRAC_PI_2, PI};
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f64; 3] = [0.1, 0.25, 0.5]; // m/s
const TURN_RATES: [f64; 3] = [0.3, 0.8, 1.5]; // rad/s
const HEADINGS: [f64; 4] = [0.0, FRAC_PI_2, PI, -FRAC_PI_2]; // rad
const INPUT_TIMEOUT_MS: u64 = 150; // Stop driving after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: W/S=drive, A/D=turn, 1-4=hold heading, R/F=speed, Space=stop, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the base stopped
    publisher.put(serde_json::to_string(&DriveCommand::Estop)?).await?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    let mut linear = 0.0;
    let mut angular = 0.0;
    let mut heading: Option<f64> = None;
    let mut stopped = true;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 33ms timeout (matches the runtime loop rate)
        if event::poll(Duration::from_millis(33))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        linear = SPEEDS[speed_idx];
                        stopped = false;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        linear = -SPEEDS[speed_idx];
                        stopped = false;
                        last_movement_input = Instant::now();
                    }

                    // Turning drops any heading hold
                    KeyCode::Char('a') if pressed => {
                        angular = TURN_RATES[speed_idx];
                        heading = None;
                        stopped = false;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        angular = -TURN_RATES[speed_idx];
                        heading = None;
                        stopped = false;
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char(c @ '1'..='4') if pressed => {
                        let idx = c as usize - '1' as usize;
                        heading = Some(HEADINGS[idx]);
                        stopped = false;
                        info!("Holding heading {:.2} rad", HEADINGS[idx]);
                    }

                    KeyCode::Char(' ') if pressed => {
                        linear = 0.0;
                        angular = 0.0;
                        heading = None;
                        stopped = true;
                    }

                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Release drive/turn if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            linear = 0.0;
            angular = 0.0;
        }

        let cmd = match (stopped, heading) {
            (true, _) => DriveCommand::Estop,
            (false, Some(h)) if linear == 0.0 => DriveCommand::heading(h),
            (false, Some(h)) => DriveCommand::heading_lin_vel(h, linear),
            (false, None) => DriveCommand::vel(angular, linear),
        };
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
