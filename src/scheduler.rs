//! Periodic session re-validation
//!
//! While a token is present the scheduler calls
//! [`LocalAuthClient::get_me`] every interval, which also refreshes a stale
//! token. A supervisor task watches the store: whenever the session metadata
//! is replaced (its generation changes) the running ticker is cancelled and,
//! if the new metadata carries a token, a fresh one starts. At most one
//! ticker is active at a time.
//!
//! # Example
//!
//! ```no_run
//! use local_auth::{LocalAuthClient, LocalAuthOptions, RefreshScheduler};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LocalAuthClient::builder(LocalAuthOptions::default()).build()?;
//! let scheduler = RefreshScheduler::start(client.clone(), Duration::from_secs(60));
//!
//! // ... later
//! scheduler.stop();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::LocalAuthClient;

/// Handle to the background re-validation task
///
/// Dropping the handle stops the scheduler.
#[derive(Debug)]
pub struct RefreshScheduler {
    shutdown: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the scheduler on the current tokio runtime.
    ///
    /// A zero `interval` spawns nothing and returns an already stopped
    /// handle.
    #[must_use]
    pub fn start(client: LocalAuthClient, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();

        if interval.is_zero() {
            tracing::warn!("Refresh interval is zero, scheduler not started");
            shutdown.cancel();
            return Self {
                shutdown,
                supervisor: None,
            };
        }

        let supervisor = tokio::spawn(supervise(client, interval, shutdown.clone()));
        tracing::debug!(interval_ms = interval.as_millis(), "Refresh scheduler started");
        Self {
            shutdown,
            supervisor: Some(supervisor),
        }
    }

    /// Stop the scheduler and any running ticker
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Whether the scheduler has been stopped
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
            || self
                .supervisor
                .as_ref()
                .is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Restart the ticker whenever the session metadata is replaced
async fn supervise(client: LocalAuthClient, interval: Duration, shutdown: CancellationToken) {
    let mut changes = client.store().subscribe();
    let mut generation = None;
    let mut ticker: Option<CancellationToken> = None;

    loop {
        let snapshot = changes.borrow_and_update().clone();

        if generation != Some(snapshot.generation) {
            generation = Some(snapshot.generation);

            if let Some(running) = ticker.take() {
                running.cancel();
            }
            if snapshot.metadata.has_token() {
                let cancel = shutdown.child_token();
                tokio::spawn(tick(client.clone(), interval, cancel.clone()));
                ticker = Some(cancel);
            }
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(running) = ticker {
        running.cancel();
    }
    tracing::debug!("Refresh scheduler stopped");
}

/// Call `get_me` every `interval` until cancelled or signed out
async fn tick(client: LocalAuthClient, interval: Duration, cancel: CancellationToken) {
    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = timer.tick() => {}
        }

        if !client.store().has_token() {
            tracing::debug!("No token left, refresh ticker exiting");
            return;
        }

        // Not raced against cancellation: a refresh in flight must finish
        // saving before the ticker is replaced
        if let Err(e) = client.get_me().await {
            tracing::warn!(error = %e, "Scheduled session check failed");
        }
    }
}
