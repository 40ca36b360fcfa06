//! Control messages sent to the controller by the pages it governs.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A control message, as `{"type": "..."}` JSON.
///
/// The upper-case aliases are the names older pages still send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Proceed past `waiting` without waiting for older pages to close.
    #[serde(rename = "force-activate", alias = "SKIP_WAITING")]
    ForceActivate,
    /// Delete the current version's store.
    #[serde(rename = "purge-cache", alias = "CLEAR_CACHE")]
    PurgeCache,
}

impl ControlMessage {
    /// Parse a message as a page posted it.
    ///
    /// Anything that isn't an object with a known `type` yields None.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        value.get("type")?.as_str()?.parse().ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlMessage::ForceActivate => "force-activate",
            ControlMessage::PurgeCache => "purge-cache",
        }
    }
}

/// Error for an unrecognized message type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control message type: {0}")]
pub struct UnknownMessage(pub String);

impl FromStr for ControlMessage {
    type Err = UnknownMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "force-activate" | "SKIP_WAITING" => Ok(ControlMessage::ForceActivate),
            "purge-cache" | "CLEAR_CACHE" => Ok(ControlMessage::PurgeCache),
            other => Err(UnknownMessage(other.to_string())),
        }
    }
}

impl std::fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
