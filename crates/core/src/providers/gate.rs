use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum spacing between outbound requests, shared by every remote client.
///
/// The market-data and exchange-rate providers both throttle aggressively, so
/// all calls in the process go through one gate. `acquire` holds the lock while
/// sleeping: concurrent callers are released one at a time, each at least
/// `spacing` after the previous one.
#[derive(Debug)]
pub struct RequestGate {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestGate {
    /// Spacing used by the providers when nothing else is configured.
    pub const DEFAULT_SPACING: Duration = Duration::from_secs(3);

    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_call: Mutex::new(None),
        }
    }

    /// A gate ready to be handed to several clients.
    pub fn shared(spacing: Duration) -> Arc<Self> {
        Arc::new(Self::new(spacing))
    }

    /// A gate that never waits (tests, offline replays).
    pub fn unthrottled() -> Arc<Self> {
        Self::shared(Duration::ZERO)
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for our turn, then record the call.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.spacing {
                tokio::time::sleep(self.spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPACING)
    }
}
