//! IPC protocol messages for the interpreter host process.
//!
//! Uses length-prefixed JSON messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + JSON-encoded message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Largest frame accepted in either direction.
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Command sent from the host to the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    /// Check the interpreter is alive.
    Ping,

    /// Import the base packages shared by every worker.
    Init { packages: Vec<String> },

    /// Import a worker's extra packages and execute its module text.
    LoadWorker {
        worker_id: u8,
        packages: Vec<String>,
        source: String,
    },

    /// Invoke a function defined by a loaded worker module.
    Call {
        request_id: String,
        worker_id: u8,
        function: String,
        args: Map<String, Value>,
    },

    /// Exit the host loop.
    Shutdown,
}

/// Response sent from the interpreter back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostResponse {
    /// Response to `Ping`.
    Pong,

    /// Base packages imported.
    Ready,

    /// Worker module executed.
    Loaded { worker_id: u8 },

    /// Function returned.
    Value {
        request_id: String,
        #[serde(default)]
        value: Value,
    },

    /// The interpreter raised while handling the command.
    Failure { message: String },

    /// Acknowledgement of `Shutdown`.
    ShuttingDown,
}

/// Write a message using length-prefixed JSON encoding.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message)
        .map_err(|e| Error::Ipc(format!("Failed to encode IPC message: {}", e)))?;
    if bytes.len() > MAX_FRAME_LEN {
        return Err(Error::Ipc(format!(
            "IPC message too large: {} bytes",
            bytes.len()
        )));
    }

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Read a message using length-prefixed JSON encoding.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME_LEN {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .await
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to decode IPC message: {}", e)))
}
