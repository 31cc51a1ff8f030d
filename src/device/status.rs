//! Device status payload.

use serde::Serialize;
use serde_json::Value;

use crate::device::DeviceError;

/// The fields consumers care about, plus the full payload as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    /// e.g. "idle", "playing", "stopping gracefully".
    pub status_name: String,
    pub mode_name: Option<String>,
    pub current_playlist: Option<String>,
    pub current_sequence: Option<String>,
    pub current_song: Option<String>,
    pub seconds_played: Option<u64>,
    pub seconds_remaining: Option<u64>,
    pub volume: Option<u64>,
    pub payload: Value,
}

impl DeviceStatus {
    /// Validate a status response. It must be an object with a
    /// non-empty `status_name`; everything else is optional.
    pub fn from_json(payload: Value) -> Result<Self, DeviceError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| DeviceError::Malformed("status payload is not an object".into()))?;

        let status_name = obj
            .get("status_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DeviceError::Malformed("missing status_name".into()))?
            .to_string();

        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let current_playlist = obj
            .get("current_playlist")
            .and_then(|p| p.get("playlist"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mode_name = text("mode_name");
        let current_sequence = text("current_sequence");
        let current_song = text("current_song");
        let seconds_played = obj.get("seconds_played").and_then(lenient_u64);
        let seconds_remaining = obj.get("seconds_remaining").and_then(lenient_u64);
        let volume = obj.get("volume").and_then(lenient_u64);

        Ok(Self {
            status_name,
            mode_name,
            current_playlist,
            current_sequence,
            current_song,
            seconds_played,
            seconds_remaining,
            volume,
            payload,
        })
    }

    pub fn is_playing(&self) -> bool {
        self.status_name == "playing"
    }
}

/// Numbers sometimes arrive as strings.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
