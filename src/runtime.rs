// 30 Hz drive control loop wired to zenoh
//
// Listener tasks feed the latest command, pose and gains into shared slots;
// the loop below runs the controller on a fixed tick and publishes every
// drive frame plus a health status. Ctrl-C stops the loop with a final estop.

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::command::DriveCommand;
use crate::config::{
    Args, LOOP_HZ, LOOP_PERIOD, TOPIC_CMD_DRIVE, TOPIC_GAINS, TOPIC_HEALTH, TOPIC_POSE,
    TOPIC_RT_DRIVE,
};
use crate::control::{build_controller, GainRegistry, GainTable};
use crate::messages::{DriveActuation, RuntimeHealth};
use crate::pose::LatestPose;
use crate::transport::ChannelSink;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decode a command payload. Anything unreadable becomes `None`, which the
/// controller treats as an estop.
pub fn parse_command(payload: &[u8]) -> Option<DriveCommand> {
    match serde_json::from_slice::<Option<DriveCommand>>(payload) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("Failed to parse command, stopping: {}", e);
            None
        }
    }
}

fn load_gains(args: &Args) -> Result<GainTable, BoxError> {
    let table = match &args.gains {
        Some(path) => {
            info!("Loading gains from {}", path.display());
            GainTable::load(path)?
        }
        None => GainTable::defaults(),
    };
    table.validate()?;
    Ok(table)
}

pub async fn run(args: Args) -> Result<(), BoxError> {
    let initial_gains = load_gains(&args)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_pose = session.declare_subscriber(TOPIC_POSE).await?;
    let sub_gains = session.declare_subscriber(TOPIC_GAINS).await?;
    let pub_drive = session.declare_publisher(TOPIC_RT_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let (sink, mut frames) = ChannelSink::new();
    let mut registry = GainRegistry::new();
    let mut controller = build_controller(sink, &mut registry, &initial_gains)
        .with_command_timeout(args.command_timeout())
        .with_wheels_enabled(!args.disable_left_wheel, !args.disable_right_wheel);
    let poses = LatestPose::new();

    // Commands: last write wins
    let commands = controller.handle();
    let latest_command = controller.handle();
    tokio::spawn(async move {
        while let Ok(sample) = sub_cmd.recv_async().await {
            let cmd = parse_command(&sample.payload().to_bytes());
            debug!("Received command: {:?}", cmd);
            commands.handle_drive_event(cmd);
        }
    });

    // Pose snapshots from localization
    let pose_store = poses.clone();
    tokio::spawn(async move {
        while let Ok(sample) = sub_pose.recv_async().await {
            if let Err(e) = pose_store.store_payload(&sample.payload().to_bytes()) {
                warn!("Bad pose payload, faulting until the next good sample: {}", e);
            }
        }
    });

    // Gain store change notifications
    tokio::spawn(async move {
        while let Ok(sample) = sub_gains.recv_async().await {
            let applied = GainTable::from_json_slice(&sample.payload().to_bytes())
                .and_then(|table| registry.apply(&table));
            match applied {
                Ok(n) => info!("Applied gain update to {} controller(s)", n),
                Err(e) => warn!("Rejected gain update, keeping previous gains: {}", e),
            }
        }
    });

    let mut tick = interval(LOOP_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Runtime started: {}Hz loop, command timeout {:?}",
        LOOP_HZ,
        args.command_timeout()
    );
    info!("Subscribed to: {}, {}, {}", TOPIC_CMD_DRIVE, TOPIC_POSE, TOPIC_GAINS);
    info!("Publishing to: {}, {}", TOPIC_RT_DRIVE, TOPIC_HEALTH);

    let mut last_health = None;
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let health = controller.tick_from(&poses);
                if last_health != Some(health) {
                    info!("Health: {:?} ({} command)", health, latest_command.current().kind());
                    last_health = Some(health);
                }

                publish_frames(&pub_drive, &mut frames).await;
                publish_health(&pub_health, health).await;
            }
            _ = &mut shutdown => {
                controller.shutdown();
                publish_frames(&pub_drive, &mut frames).await;
                break;
            }
        }
    }

    info!("Runtime stopped");
    Ok(())
}

/// Publish every frame the controller produced this tick.
/// Publish failures are logged; the loop keeps running.
async fn publish_frames(
    publisher: &zenoh::pubsub::Publisher<'_>,
    frames: &mut tokio::sync::mpsc::UnboundedReceiver<DriveActuation>,
) {
    while let Ok(frame) = frames.try_recv() {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode drive frame: {}", e);
                continue;
            }
        };
        if let Err(e) = publisher.put(json).await {
            warn!("Failed to publish drive frame: {}", e);
        }
    }
}

async fn publish_health(publisher: &zenoh::pubsub::Publisher<'_>, health: RuntimeHealth) {
    match serde_json::to_string(&health) {
        Ok(json) => {
            if let Err(e) = publisher.put(json).await {
                warn!("Failed to publish health: {}", e);
            }
        }
        Err(e) => warn!("Failed to encode health: {}", e),
    }
}
