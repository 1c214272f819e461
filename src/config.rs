//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::{ProtocolError, ProtocolResult};

/// Tunables for a protocol engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
    /// Answer every received message (other than acknowledgements) with an
    /// `Acknowledge`
    pub auto_acknowledge: bool,
    /// Deadline applied to requests that do not pass their own; none waits
    /// until a response arrives or the engine is dropped
    pub default_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            event_capacity: 64,
            auto_acknowledge: true,
            default_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }

    /// Default request deadline
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }
}
