use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global message ID counter for correlation
static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum alert text length, including room for a terminator on C receivers
pub const MAX_MSG_STR_LENGTH: usize = 200;

/// Maximum encoded datagram size (fits a single unfragmented UDP payload)
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Generate a unique message ID for correlation
pub fn generate_message_id() -> u64 {
    MESSAGE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A valve was judged faulty from its test point readings
    HardwareErrorValve,
}

/// One alert as carried on the wire to the monitoring station
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertMessage {
    /// Unique message ID for correlation and debugging
    pub id: u64,
    pub kind: AlertKind,
    /// Valve number the failure is attributed to
    pub valve: u32,
    pub message: String,
}

impl AlertMessage {
    pub fn hardware_error_valve(valve: u32, message: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            kind: AlertKind::HardwareErrorValve,
            valve,
            message: message.into(),
        }
    }

    /// Validate message fields before sending
    pub fn validate(&self) -> Result<(), String> {
        validate_message_text(&self.message)
    }

    /// Serialize to a single datagram payload
    pub fn encode(&self) -> Result<Vec<u8>, String> {
        self.validate()?;
        let bytes = serde_json::to_vec(self).map_err(|e| format!("Failed to encode alert: {}", e))?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(format!(
                "Encoded alert too large: {} > {} bytes",
                bytes.len(),
                MAX_DATAGRAM_SIZE
            ));
        }
        Ok(bytes)
    }

    /// Parse a received datagram payload
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(format!(
                "Datagram too large: {} > {} bytes",
                bytes.len(),
                MAX_DATAGRAM_SIZE
            ));
        }
        let msg: Self =
            serde_json::from_slice(bytes).map_err(|e| format!("Failed to decode alert: {}", e))?;
        msg.validate()?;
        Ok(msg)
    }
}

pub fn validate_message_text(message: &str) -> Result<(), String> {
    if message.is_empty() {
        return Err("Alert message cannot be empty".into());
    }
    if message.len() >= MAX_MSG_STR_LENGTH {
        return Err(format!(
            "Alert message too long: {} >= {} bytes",
            message.len(),
            MAX_MSG_STR_LENGTH
        ));
    }
    if message.contains('\0') {
        return Err("Alert message contains null byte".into());
    }
    Ok(())
}
