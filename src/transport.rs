// Outbound drive transport
//
// The control loop hands finished frames to a `DriveSink`. In the runtime the
// sink is a channel drained by the zenoh publisher task, so transmitting never
// blocks the tick.

use tokio::sync::mpsc;

use crate::messages::DriveActuation;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("drive channel closed")]
    Closed,
}

pub trait DriveSink {
    fn transmit(&mut self, frame: DriveActuation) -> Result<(), TransportError>;
}

/// Sink that forwards frames to an async publisher
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DriveActuation>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DriveActuation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DriveSink for ChannelSink {
    fn transmit(&mut self, frame: DriveActuation) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every transmitted frame, shared with the test body
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        frames: Arc<Mutex<Vec<DriveActuation>>>,
    }

    impl RecordingSink {
        pub fn frames(&self) -> Vec<DriveActuation> {
            self.frames.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<(f64, f64)> {
            self.frames.lock().unwrap().last().map(|f| f.throttle())
        }

        pub fn len(&self) -> usize {
            self.frames.lock().unwrap().len()
        }
    }

    impl DriveSink for RecordingSink {
        fn transmit(&mut self, frame: DriveActuation) -> Result<(), TransportError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }
}
