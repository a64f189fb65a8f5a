//! Frame codec.
//!
//! Every frame is a flat JSON object with a string discriminator under `cmd`.
//! Older service builds used `type` for the same purpose, so decode accepts
//! either key; encode always writes `cmd`.

use serde_json::{Map, Value};

use crate::{Error, Result};

pub const CMD_KEY: &str = "cmd";
pub const LEGACY_CMD_KEY: &str = "type";

/// Command-specific fields of a frame, without the discriminator.
pub type Fields = Map<String, Value>;

/// A decoded frame: discriminator plus the remaining fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub cmd: String,
    pub fields: Fields,
}

impl Packet {
    pub fn new(cmd: impl Into<String>, fields: Fields) -> Self {
        Self {
            cmd: cmd.into(),
            fields,
        }
    }

    pub fn encode(&self) -> Result<String> {
        encode(&self.cmd, self.fields.clone())
    }
}

/// Encode a command and its fields into one outbound text frame.
///
/// A `cmd` entry already present in `fields` is overwritten.
pub fn encode(cmd: &str, mut fields: Fields) -> Result<String> {
    if cmd.is_empty() {
        return Err(Error::Protocol("cannot encode an empty command".to_string()));
    }
    fields.insert(CMD_KEY.to_string(), Value::String(cmd.to_string()));
    Ok(serde_json::to_string(&Value::Object(fields))?)
}

/// Decode one inbound text frame.
pub fn decode(frame: &str) -> Result<Packet> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| Error::Protocol(format!("frame is not valid JSON: {}", e)))?;
    let Value::Object(mut fields) = value else {
        return Err(Error::Protocol("frame is not a JSON object".to_string()));
    };

    let key = if fields.contains_key(CMD_KEY) {
        CMD_KEY
    } else if fields.contains_key(LEGACY_CMD_KEY) {
        LEGACY_CMD_KEY
    } else {
        return Err(Error::Protocol("frame has no discriminator".to_string()));
    };

    match fields.remove(key) {
        Some(Value::String(cmd)) if !cmd.is_empty() => Ok(Packet { cmd, fields }),
        Some(other) => Err(Error::Protocol(format!(
            "discriminator '{}' must be a non-empty string, got {}",
            key, other
        ))),
        None => Err(Error::Protocol("frame has no discriminator".to_string())),
    }
}
