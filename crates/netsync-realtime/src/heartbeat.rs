//! Heartbeat: keeps the realtime connection alive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::protocol::HeartbeatMessage;
use crate::transport::MessageSink;

pub struct Heartbeat {
    sink: Arc<dyn MessageSink>,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(sink: Arc<dyn MessageSink>, interval: Duration) -> Self {
        Self { sink, interval }
    }

    /// Send a heartbeat every interval until shutdown. A failed send is
    /// logged; the receive loop is what notices a dead connection.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?period, "heartbeat started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match serde_json::to_string(&HeartbeatMessage::new()) {
                        Ok(text) => match self.sink.send(text).await {
                            Ok(()) => debug!("heartbeat sent"),
                            Err(e) => warn!(error = %e, "failed to send heartbeat"),
                        },
                        Err(e) => warn!(error = %e, "failed to encode heartbeat"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("heartbeat stopped");
    }
}
