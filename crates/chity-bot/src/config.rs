use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduler::ACTION_COUNT;

/// Settings for one synthetic user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub host: String,
    pub port: u16,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Skip certificate and hostname verification on `wss://`.
    pub accept_invalid_certs: bool,

    pub username: String,
    pub displayname: String,
    pub password: String,
    /// Ask the service for a resumable session on login/register.
    pub request_session: bool,

    pub bootstrap_timeout_ms: u64,
    pub behavior: BehaviorConfig,
    pub reconnect: ReconnectPolicy,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            secure: true,
            accept_invalid_certs: true,
            username: "bot0".to_string(),
            displayname: "Bot 0".to_string(),
            password: "1234".to_string(),
            request_session: false,
            bootstrap_timeout_ms: 30_000,
            behavior: BehaviorConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl BotConfig {
    /// Credentials, display name and RNG seed for a numbered instance.
    ///
    /// A fixed seed is mixed with the instance number so that instances
    /// sharing one config still draw distinct action and delay sequences.
    pub fn for_instance(mut self, instance: u32) -> Self {
        self.username = format!("bot{}", instance);
        self.displayname = format!("Bot {}", instance);
        self.behavior.seed = self.behavior.seed.map(|seed| instance_seed(seed, instance));
        self
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }
}

fn instance_seed(seed: u64, instance: u32) -> u64 {
    seed ^ u64::from(instance).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Weights and pacing of the behavior scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Send message, request public groups, select group, create group.
    pub weights: [u32; ACTION_COUNT],
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fixed RNG seed. Entropy is used when absent.
    pub seed: Option<u64>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            weights: [500, 40, 40, 1],
            min_delay_ms: 0,
            max_delay_ms: 3_000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Consecutive transport failures tolerated before giving up.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}
