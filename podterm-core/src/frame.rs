//! Session wire frames
//!
//! Clients send JSON control frames:
//!
//! ```text
//! {"msg_type": "input",  "data": "ls -la\n"}
//! {"msg_type": "resize", "rows": 40, "cols": 120}
//! ```
//!
//! The server answers with raw output bytes, or `{"error": "..."}` when a
//! session cannot be started.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl TerminalSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// A size with a zero dimension cannot be applied to a terminal
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

/// Frame layout shared by every client message type
#[derive(Debug, Deserialize)]
struct WireFrame {
    msg_type: String,
    #[serde(default)]
    rows: u16,
    #[serde(default)]
    cols: u16,
    #[serde(default)]
    data: String,
}

/// A decoded client-to-server frame
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Keystrokes to forward verbatim to the backend
    Input(Vec<u8>),
    /// New terminal dimensions
    Resize(TerminalSize),
    /// A `msg_type` this server does not understand
    Unknown { msg_type: String },
}

impl ClientFrame {
    /// Decode one client frame.
    ///
    /// Unknown `msg_type` values are not an error; they decode to
    /// [`ClientFrame::Unknown`] so newer clients keep working.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let wire: WireFrame = serde_json::from_slice(bytes)?;

        Ok(match wire.msg_type.as_str() {
            "input" => ClientFrame::Input(wire.data.into_bytes()),
            "resize" => ClientFrame::Resize(TerminalSize::new(wire.rows, wire.cols)),
            _ => ClientFrame::Unknown {
                msg_type: wire.msg_type,
            },
        })
    }
}

/// A server-to-client control frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Error { error: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: message.into(),
        }
    }

    /// Encode as a JSON text payload
    pub fn encode(&self) -> String {
        match self {
            ServerFrame::Error { error } => serde_json::json!({ "error": error }).to_string(),
        }
    }
}
