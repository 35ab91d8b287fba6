//! Line-oriented control protocol between the orchestrator and the agent
//! process.
//!
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based NDJSON framing with a line cap.
//! - `frames`: typed inbound and outbound frames.
//! - `channel`: ordered single-consumer line queue and the stdio channel.
//! - `writer`: outbound frame serialisation.

pub mod channel;
pub mod codec;
pub mod frames;
pub mod writer;
