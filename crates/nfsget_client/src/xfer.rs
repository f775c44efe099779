//! The byte-moving seams of the fetch core.
//!
//! A [`Transport`] is one TCP connection as an RPC session sees it; a
//! [`DataSink`] is whatever consumes the fetched file downstream. Both are
//! synchronous: the core never blocks, it reacts to events its owner feeds
//! in and hands bytes back out through these traits.

use crate::error::Error;

/// Outcome of handing a frame to a transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The frame was accepted for transmission.
    Sent,
    /// The send window is closed; retry after the next window-open event.
    WouldBlock,
}

/// One established connection, write side.
pub trait Transport {
    /// Attempts to hand one framed record to the connection.
    fn send(&mut self, frame: &[u8]) -> std::io::Result<SendStatus>;

    /// Shuts the connection down in both directions.
    fn close(&mut self, graceful: bool);
}

/// Returned by a sink that is no longer accepting data.
#[derive(Debug)]
pub struct SinkClosed;

/// Downstream consumer of the fetched file.
pub trait DataSink {
    /// Sets the logical position of the next delivery. Called twice before
    /// the first delivery when the file size is known: once with the size,
    /// once to return to zero.
    fn seek(&mut self, offset: u64);

    /// Appends bytes at the current position.
    fn deliver(&mut self, data: &[u8]) -> Result<(), SinkClosed>;

    /// Reports the final outcome of the fetch. Called exactly once.
    fn close(&mut self, status: Result<(), &Error>);
}
