//! NDJSON codec for control and engine streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line length
//! so an unterminated or oversized line cannot force an unbounded
//! allocation. An over-long line is reported as an item, not a stream
//! error, so a `FramedRead` keeps decoding at the next newline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use session_relay::protocol::codec::FrameCodec;
//!
//! let lines = FramedRead::new(tokio::io::stdin(), FrameCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One decoded line, or the protocol error that replaced an over-long one.
pub type DecodedLine = std::result::Result<String, AppError>;

/// Line codec delimited by `\n` with a [`MAX_LINE_BYTES`] decode limit.
///
/// Over-long inbound lines decode to `Err(AppError::Protocol)`; the codec
/// discards the rest of that line and resumes at the next newline.
/// Only I/O failures are stream errors, mapped to [`AppError::Io`].
#[derive(Debug)]
pub struct FrameCodec(LinesCodec);

impl FrameCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = DecodedLine;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        tolerate_long_lines(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        tolerate_long_lines(self.0.decode_eof(src))
    }
}

impl Encoder<String> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

// `LinesCodec` is left discarding after `MaxLineLengthExceeded`, so the
// next decode call skips to the following newline.
fn tolerate_long_lines(
    decoded: std::result::Result<Option<String>, LinesCodecError>,
) -> Result<Option<DecodedLine>> {
    match decoded {
        Ok(line) => Ok(line.map(Ok)),
        Err(e @ LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Err(map_codec_error(e)))),
        Err(e) => Err(map_codec_error(e)),
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
