use anyhow::{Context, Result};
use chity_bot::BotConfig;
use std::path::{Path, PathBuf};

/// Default config file: platform config dir/chitybot/config.json
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chitybot").join("config.json"))
}

/// Load the shared bot settings.
///
/// An explicit path must exist. Without one, the default location is used
/// when present, and built-in defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<BotConfig> {
    match explicit {
        Some(path) => read(path),
        None => match default_path() {
            Some(path) if path.exists() => read(&path),
            _ => Ok(BotConfig::default()),
        },
    }
}

fn read(path: &Path) -> Result<BotConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Settings given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    /// Plain `ws://` instead of `wss://`
    pub insecure_ws: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut BotConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.insecure_ws {
            config.secure = false;
        }
    }

    /// Settings for one numbered instance, with its own RNG seed when the
    /// file fixes one. The password override wins over the file.
    pub fn instance(&self, base: &BotConfig, instance: u32) -> BotConfig {
        let mut config = base.clone().for_instance(instance);
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        config
    }
}
