//! Control messages posted by the host page.

use serde::{Deserialize, Serialize};

use crate::Error;

/// The only message the manager understands: `{ "type": "SKIP_WAITING" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a message posted as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for any other shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::InvalidInput(format!("unsupported control message: {e}")))
    }
}
