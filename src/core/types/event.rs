//! Events and channels for the real-time fabric

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event kinds broadcast through the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Provider status change
    ProviderStatus,
    /// A request was dispatched
    Request,
    /// A log line
    Log,
    /// Aggregated statistics snapshot
    StatsUpdate,
    /// Heartbeat
    Ping,
    /// Heartbeat reply
    Pong,
    /// Error notification
    Error,
}

/// Subscription channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Log events
    Logs,
    /// Statistics snapshots
    Stats,
    /// Provider lifecycle events
    Providers,
    /// Request events
    Requests,
    /// Fan-in of every channel
    All,
}

impl Channel {
    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Logs => "logs",
            Channel::Stats => "stats",
            Channel::Providers => "providers",
            Channel::Requests => "requests",
            Channel::All => "all",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logs" => Ok(Channel::Logs),
            "stats" => Ok(Channel::Stats),
            "providers" => Ok(Channel::Providers),
            "requests" => Ok(Channel::Requests),
            "all" => Ok(Channel::All),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}

/// One event on the fabric
///
/// Serialized as `{type, timestamp, data}` on the WebSocket surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
    /// Opaque payload
    pub data: serde_json::Value,
}

impl Event {
    /// Build an event with the current timestamp
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self { event_type, timestamp: Utc::now(), data }
    }

    /// Heartbeat event
    pub fn ping() -> Self {
        Self::new(EventType::Ping, serde_json::Value::Null)
    }

    /// Provider status event
    pub fn provider_status(name: &str, status: &str, health: f64) -> Self {
        Self::new(
            EventType::ProviderStatus,
            serde_json::json!({ "provider": name, "status": status, "health": health }),
        )
    }

    /// Request event
    pub fn request(provider: &str, model: &str, success: bool, latency_ms: u64) -> Self {
        Self::new(
            EventType::Request,
            serde_json::json!({
                "provider": provider,
                "model": model,
                "success": success,
                "latency_ms": latency_ms,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip() {
        for name in ["logs", "stats", "providers", "requests", "all"] {
            let channel: Channel = name.parse().unwrap();
            assert_eq!(channel.as_str(), name);
        }
    }

    #[test]
    fn test_invalid_channel_rejected() {
        assert!("metrics".parse::<Channel>().is_err());
        assert!("".parse::<Channel>().is_err());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::ping();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ping");
        assert!(value.get("timestamp").is_some());
    }
}
