//! Wire protocol for the local Discord IPC socket.
//!
//! Discord desktop listens on a Unix socket (`discord-ipc-{0..9}`) inside the
//! user's runtime directory. Every message is a frame:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────┐
//! │ opcode u32 │ length u32 │ JSON payload (UTF-8) │
//! │  (LE)      │  (LE)      │  `length` bytes      │
//! └────────────┴────────────┴──────────────────────┘
//! ```
//!
//! A session starts with a `Handshake` frame carrying the application id; the
//! server answers with a `READY` dispatch. After that, commands such as
//! `SET_ACTIVITY` travel as `Frame` opcodes and are answered with a frame
//! echoing the command's nonce.
//!
//! This crate only knows about the transport. What to display is decided by
//! `presence-core`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};

mod client;

pub use client::{default_socket_candidates, socket_candidates_in, IpcClient};

pub const HANDSHAKE_VERSION: u32 = 1;
pub const MAX_FRAME_BYTES: usize = 64 * 1024;
const HEADER_BYTES: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("No Discord IPC socket found")]
    SocketNotFound,

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Discord closed the connection ({code}): {message}")]
    Closed { code: i64, message: String },

    #[error("Unexpected IPC response: {0}")]
    Protocol(String),

    #[error("IPC frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, IpcError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Opcode::Handshake),
            1 => Some(Opcode::Frame),
            2 => Some(Opcode::Close),
            3 => Some(Opcode::Ping),
            4 => Some(Opcode::Pong),
            _ => None,
        }
    }
}

/// Rich presence card. Every field is optional; absent fields are omitted
/// from the payload because Discord rejects explicit nulls for most of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Assets>,
}

/// Unix timestamps in seconds. `start` renders as an elapsed timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

pub fn handshake_payload(client_id: &str) -> Value {
    serde_json::json!({
        "v": HANDSHAKE_VERSION,
        "client_id": client_id,
    })
}

/// `SET_ACTIVITY` command. `None` clears the card.
pub fn set_activity_payload(pid: u32, activity: Option<&Activity>, nonce: &str) -> Value {
    serde_json::json!({
        "cmd": "SET_ACTIVITY",
        "args": {
            "pid": pid,
            "activity": activity,
        },
        "nonce": nonce,
    })
}

pub fn write_frame<W: Write>(writer: &mut W, opcode: Opcode, payload: &Value) -> Result<()> {
    let body = serde_json::to_vec(payload)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(IpcError::FrameTooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_BYTES + body.len());
    frame.extend_from_slice(&(opcode as u32).to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);

    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read>(reader: &mut R) -> Result<(Opcode, Value)> {
    let mut header = [0u8; HEADER_BYTES];
    reader.read_exact(&mut header)?;

    let raw_opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let opcode = Opcode::from_u32(raw_opcode)
        .ok_or_else(|| IpcError::Protocol(format!("unknown opcode {}", raw_opcode)))?;
    if length > MAX_FRAME_BYTES {
        return Err(IpcError::FrameTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((opcode, payload))
}

/// Extracts `(code, message)` from a `Close` frame payload.
pub fn close_reason(payload: &Value) -> (i64, String) {
    let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("connection closed")
        .to_string();
    (code, message)
}
