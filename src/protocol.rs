//! Protocol Module
//!
//! Wire format between `felix-client` and `felix-server`. Each message is a
//! big-endian `u32` length followed by that many bytes of JSON:
//!
//! ```text
//! client -> server   [len][{"filename": "docs/readme.txt"}]
//! server -> client   [len][{"success": true, "filesize": 1234}] [1234 raw bytes]
//! ```
//!
//! Content bytes follow the response header only when `success` is true.
//! One request is served per connection.

use crate::{FelixError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted JSON frame, in bytes
pub const MAX_FRAME_LEN: u32 = 4096;

/// Request sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub filename: String,
}

/// Response header sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub success: bool,
    pub filesize: u64,
}

impl ServerMessage {
    pub fn found(filesize: u64) -> Self {
        Self {
            success: true,
            filesize,
        }
    }

    pub fn not_found() -> Self {
        Self {
            success: false,
            filesize: 0,
        }
    }
}

/// Write one length-prefixed JSON frame
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            FelixError::ProtocolError(format!(
                "Frame too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_LEN
            ))
        })?;

    writer.write_u32(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed JSON frame
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await.map_err(|e| {
        FelixError::ProtocolError(format!("Failed to read frame length: {}", e))
    })?;

    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FelixError::ProtocolError(format!(
            "Invalid frame length: {} (max {})",
            len, MAX_FRAME_LEN
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        FelixError::ProtocolError(format!("Truncated frame ({} bytes expected): {}", len, e))
    })?;

    Ok(serde_json::from_slice(&payload)?)
}
