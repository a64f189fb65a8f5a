//! Test utilities: an in-process fake chat service on the channel transport.

#![allow(dead_code)]

pub mod fake_chat;
pub use fake_chat::{FakeChat, World};

use chity_bot::BotConfig;
use std::future::Future;
use std::time::Duration;

/// Config for a bot that only browses public groups, once a minute.
pub fn quiet_config(instance: u32) -> BotConfig {
    let mut config = BotConfig::default().for_instance(instance);
    config.behavior.weights = [0, 1, 0, 0];
    config.behavior.min_delay_ms = 60_000;
    config.behavior.max_delay_ms = 60_000;
    config.behavior.seed = Some(u64::from(instance));
    config.reconnect.initial_backoff_ms = 10;
    config.reconnect.max_backoff_ms = 50;
    config
}

/// Poll `check` until it returns true, panicking after five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}
