use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::clock::Clock;
use crate::session::errors::StoreError;
use crate::session::ports::TokenRepository;

#[derive(Debug, Clone, Error)]
pub enum SweepError {
    #[error("Sweep timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Sweep failed: {0}")]
    Store(#[from] StoreError),
}

/// Periodically deletes refresh tokens whose expiry has passed.
pub struct TokenSweeper<TR>
where
    TR: TokenRepository,
{
    tokens: Arc<TR>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    timeout: Duration,
}

impl<TR> TokenSweeper<TR>
where
    TR: TokenRepository,
{
    /// # Arguments
    /// * `tokens` - Store to sweep
    /// * `clock` - Source of "now" for the expiry cut-off
    /// * `interval` - Time between sweeps
    /// * `timeout` - Upper bound for a single sweep
    pub fn new(tokens: Arc<TR>, clock: Arc<dyn Clock>, interval: Duration, timeout: Duration) -> Self {
        Self {
            tokens,
            clock,
            interval,
            timeout,
        }
    }

    /// Run one sweep.
    ///
    /// # Returns
    /// Number of tokens removed
    pub async fn sweep_once(&self) -> Result<u64, SweepError> {
        let now = self.clock.now();
        tokio::time::timeout(self.timeout, self.tokens.sweep_expired(now))
            .await
            .map_err(|_| SweepError::TimedOut(self.timeout))?
            .map_err(SweepError::from)
    }

    /// Sweep on every tick until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "Token sweeper started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Swept expired refresh tokens"),
                        Err(e) => tracing::warn!(error = %e, "Token sweep failed, retrying next tick"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Token sweeper stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
