use tracing::{info, warn};

use crate::bot::{Bot, StopHandle};
use crate::config::ReconnectPolicy;
use crate::transport::Connector;
use crate::Result;

/// Restarts a [`Bot`] after transport failures.
///
/// Every restart is a full run with a fresh session and an empty cache.
/// Authentication, protocol and configuration failures end supervision, as
/// does a stop request. The failure counter resets whenever a run reached
/// the ready phase before failing.
pub struct Supervisor<C: Connector> {
    bot: Bot<C>,
    policy: ReconnectPolicy,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(bot: Bot<C>) -> Self {
        let policy = bot.config().reconnect.clone();
        Self { bot, policy }
    }

    pub fn bot(&self) -> &Bot<C> {
        &self.bot
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.bot.stop_handle()
    }

    pub fn into_inner(self) -> Bot<C> {
        self.bot
    }

    pub async fn run(&mut self) -> Result<()> {
        let stop = self.bot.stop_handle();
        let mut failures = 0u32;
        loop {
            let err = match self.bot.run().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if !err.is_transport() || !stop.is_running() {
                return Err(err);
            }

            if self.bot.reached_ready() {
                failures = 0;
            }
            failures += 1;
            if failures > self.policy.max_retries {
                warn!(
                    user = %self.bot.config().username,
                    failures,
                    error = %err,
                    "giving up after repeated transport failures"
                );
                return Err(err);
            }

            let delay = self.policy.backoff(failures);
            warn!(
                user = %self.bot.config().username,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "connection lost, reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop.stopped() => {
                    info!(user = %self.bot.config().username, "stopped while waiting to reconnect");
                    return Ok(());
                }
            }
        }
    }
}
