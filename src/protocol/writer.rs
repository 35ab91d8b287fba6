//! Outbound frame writer.
//!
//! Serialises each [`OutboundFrame`] to a compact single-line JSON string,
//! appends `\n`, and flushes so the orchestrator sees every frame as soon
//! as it is produced.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::protocol::frames::OutboundFrame;
use crate::{AppError, Result};

/// NDJSON writer over any async byte sink (normally the process stdout).
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap an async writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one frame followed by `\n` and flush.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`] if serialisation fails.
    /// - [`AppError::Io`] if the write or flush fails.
    pub async fn write_frame(&mut self, frame: &OutboundFrame) -> Result<()> {
        let mut bytes = serde_json::to_vec(frame)
            .map_err(|e| AppError::Protocol(format!("failed to serialise frame: {e}")))?;
        bytes.push(b'\n');

        self.inner.write_all(&bytes).await.map_err(|e| {
            warn!(frame = frame.kind(), error = %e, "frame writer: write failed");
            AppError::Io(format!("write failed: {e}"))
        })?;
        self.inner
            .flush()
            .await
            .map_err(|e| AppError::Io(format!("flush failed: {e}")))?;

        debug!(frame = frame.kind(), "frame writer: frame sent");
        Ok(())
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
