//! WebSocket Protocol Messages
//!
//! This module defines the client/server message shapes for the canvas
//! WebSocket API and the validation applied to inbound updates before they
//! reach the hub.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Shape of the shared canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    /// Number of cells
    pub cells: usize,
    /// Number of colors in the palette (cells hold the digits `0..colors`)
    pub colors: u8,
}

impl Default for CanvasLayout {
    fn default() -> Self {
        Self {
            cells: 10_000,
            colors: 10,
        }
    }
}

impl CanvasLayout {
    /// Create a layout, clamping the palette to single decimal digits
    #[must_use]
    pub fn new(cells: usize, colors: u8) -> Self {
        Self {
            cells,
            colors: colors.clamp(1, 10),
        }
    }

    /// Bytes of a blank canvas (every cell set to color `0`)
    #[must_use]
    pub fn blank(&self) -> Vec<u8> {
        vec![b'0'; self.cells]
    }
}

/// Message sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Message type; only `update` is accepted
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Update payload
    #[serde(default)]
    pub data: UpdateData,
}

/// Raw update payload as it arrives on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateData {
    /// Cell index
    #[serde(default)]
    pub index: i64,
    /// Color digit as a string
    #[serde(default)]
    pub color: String,
}

/// A validated single-cell update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelUpdate {
    /// Cell index, always inside the canvas
    pub index: usize,
    /// Color digit
    pub color: char,
}

impl PixelUpdate {
    /// Create an update
    #[must_use]
    pub fn new(index: usize, color: char) -> Self {
        Self { index, color }
    }

    /// Bytes written to the store at offset `index`
    #[must_use]
    pub fn color_bytes(&self) -> Vec<u8> {
        self.color.to_string().into_bytes()
    }
}

impl ClientMessage {
    /// Validate against the canvas layout.
    ///
    /// The error strings are sent back verbatim behind an `Error: ` prefix.
    pub fn validate(self, layout: &CanvasLayout) -> Result<PixelUpdate> {
        if self.kind != "update" {
            return Err(Error::invalid_update(format!(
                "invalid message type: {}",
                self.kind
            )));
        }

        let index = usize::try_from(self.data.index)
            .ok()
            .filter(|index| *index < layout.cells)
            .ok_or_else(|| Error::invalid_update(format!("invalid index: {}", self.data.index)))?;

        let color = &self.data.color;
        let value: i64 = color
            .parse()
            .map_err(|_| Error::invalid_update(format!("invalid color value: {}", color)))?;

        if value < 0 || value >= i64::from(layout.colors) {
            return Err(Error::invalid_update(format!(
                "color value out of range: {}",
                value
            )));
        }

        // "07" and "+7" parse fine but would write two bytes
        if color.len() != 1 {
            return Err(Error::invalid_update(format!("invalid color value: {}", color)));
        }

        let digit = char::from(b'0' + value as u8);
        Ok(PixelUpdate::new(index, digit))
    }
}

/// Decode and validate one inbound text frame
pub fn decode_update(text: &str, layout: &CanvasLayout) -> Result<PixelUpdate> {
    let message: ClientMessage = serde_json::from_str(text)?;
    message.validate(layout)
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full canvas snapshot, sent once after registration
    Initial {
        /// Canvas bytes as text
        data: String,
        /// Live connection count
        #[serde(rename = "clientCount")]
        client_count: usize,
    },

    /// An accepted update
    Update {
        /// The update
        data: PixelUpdate,
        /// Live connection count when the update was processed
        #[serde(rename = "clientCount")]
        client_count: usize,
    },
}

impl ServerMessage {
    /// Create an initial snapshot message
    #[must_use]
    pub fn initial(canvas: &[u8], client_count: usize) -> Self {
        Self::Initial {
            data: String::from_utf8_lossy(canvas).into_owned(),
            client_count,
        }
    }

    /// Create an update message
    #[must_use]
    pub fn update(data: PixelUpdate, client_count: usize) -> Self {
        Self::Update { data, client_count }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Plain-text control notices sent to a single connection
pub mod notice {
    /// Broadcast suppressed by the per-address token bucket
    pub const RATE_LIMIT_EXCEEDED: &str = "rate limit exceeded";
    /// Registration rejected by the per-address connection limit
    pub const CLIENT_LIMIT_EXCEEDED: &str = "client limit exceeded";
    /// Frame was not a decodable update message
    pub const INVALID_INPUT_TYPE: &str = "Invalid input type";

    /// Validation failure notice
    #[must_use]
    pub fn error(reason: &str) -> String {
        format!("Error: {}", reason)
    }
}
