//! Control channel over the agent process's standard streams.
//!
//! Inbound lines are pumped from the reader into a [`LineQueue`]: a FIFO of
//! arrived-but-unclaimed lines paired with a FIFO of waiting readers. A line
//! that arrives while a reader is waiting goes straight to the oldest
//! waiter; otherwise it is buffered until the next read. Closing the queue
//! wakes every outstanding waiter with end-of-stream.
//!
//! Lines the codec rejected travel through the queue as errors, in order,
//! so the reader sees a protocol error where the line would have been.
//!
//! Either ordering (line before read, read before line) yields the same
//! sequence of lines.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::protocol::codec::{DecodedLine, FrameCodec};
use crate::protocol::frames::{InboundFrame, OutboundFrame};
use crate::protocol::writer::FrameWriter;
use crate::{AppError, Result};

#[derive(Debug, Default)]
struct QueueState {
    lines: VecDeque<DecodedLine>,
    waiters: VecDeque<oneshot::Sender<Option<DecodedLine>>>,
    closed: bool,
}

/// Ordered single-consumer line queue with parked readers.
///
/// Cloning shares the same queue; one clone feeds lines, another reads.
#[derive(Debug, Clone, Default)]
pub struct LineQueue {
    state: Arc<Mutex<QueueState>>,
}

impl LineQueue {
    /// Create an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a line to the oldest waiting reader, or buffer it.
    ///
    /// Lines pushed after [`close`](Self::close) are dropped.
    pub fn push_line(&self, line: String) {
        self.push(Ok(line));
    }

    /// Queue an error in place of a line that could not be decoded.
    pub fn push_error(&self, err: AppError) {
        self.push(Err(err));
    }

    fn push(&self, line: DecodedLine) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            debug!("line queue: dropping line pushed after close");
            return;
        }

        let mut line = line;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Some(line)) {
                Ok(()) => return,
                // Reader gave up waiting; hand the line to the next one.
                Err(returned) => match returned {
                    Some(back) => line = back,
                    None => return,
                },
            }
        }
        state.lines.push_back(line);
    }

    /// Mark end-of-stream and release every waiting reader.
    ///
    /// Buffered lines remain readable; once they are drained, reads return
    /// `None`.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(None);
        }
    }

    /// Next unread line, or `None` once closed and drained.
    ///
    /// A line rejected by the codec comes back as its error.
    pub async fn next_line(&self) -> Option<DecodedLine> {
        let rx = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(line) = state.lines.pop_front() {
                return Some(line);
            }
            if state.closed {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        rx.await.unwrap_or(None)
    }

    /// Number of buffered, unclaimed lines.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lines
            .len()
    }
}

/// Read/write surface over the agent process's stdin and stdout.
#[derive(Debug)]
pub struct ControlChannel<W> {
    queue: LineQueue,
    writer: FrameWriter<W>,
    pump: Option<PumpGuard>,
}

/// Aborts the pump task when the channel goes away.
#[derive(Debug)]
struct PumpGuard(JoinHandle<()>);

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<W> ControlChannel<W>
where
    W: AsyncWrite + Unpin,
{
    /// Open a channel: spawn a pump task feeding `reader` lines into the
    /// queue, and write outbound frames to `writer`.
    pub fn open<R>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let queue = LineQueue::new();
        let pump = tokio::spawn(pump_lines(reader, queue.clone()));
        Self {
            queue,
            writer: FrameWriter::new(writer),
            pump: Some(PumpGuard(pump)),
        }
    }

    /// Build a channel over an externally fed queue.
    pub fn from_queue(queue: LineQueue, writer: W) -> Self {
        Self {
            queue,
            writer: FrameWriter::new(writer),
            pump: None,
        }
    }

    /// Next inbound frame, or `None` at end-of-stream.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the next line is not a valid frame
    /// or exceeded the codec's line limit.
    pub async fn read_frame(&self) -> Result<Option<InboundFrame>> {
        loop {
            let Some(line) = self.queue.next_line().await else {
                return Ok(None);
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            return InboundFrame::parse(&line).map(Some);
        }
    }

    /// Write one outbound frame.
    ///
    /// # Errors
    ///
    /// Propagates [`FrameWriter::write_frame`] failures.
    pub async fn send(&mut self, frame: &OutboundFrame) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    /// Tear down the pump and recover the writer.
    pub fn into_writer(self) -> W {
        let Self { writer, pump, .. } = self;
        drop(pump);
        writer.into_inner()
    }
}

/// Pump newline-delimited lines from `reader` into `queue` until EOF.
///
/// Over-long lines are queued as protocol errors and reading continues at
/// the next line. An I/O error ends the stream. The queue is always closed
/// on exit.
pub async fn pump_lines<R>(reader: R, queue: LineQueue)
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, FrameCodec::new());

    loop {
        match framed.next().await {
            None => {
                debug!("control channel: EOF");
                break;
            }
            Some(Ok(Ok(line))) => queue.push_line(line),
            Some(Ok(Err(e))) => {
                warn!(error = %e, "control channel: rejected inbound line");
                queue.push_error(e);
            }
            Some(Err(e)) => {
                warn!(error = %e, "control channel: read error, closing");
                break;
            }
        }
    }

    queue.close();
}
