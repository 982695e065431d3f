//! Character console over the host channel.
//!
//! Maps the engine's character-stream expectations onto the blocking and
//! polling host contract: input is poll-until-ready then read-exactly-one,
//! output is one write call per request. No buffering, no echo - echo, if
//! any, is a host or terminal responsibility.

use host_channel::{BufferId, ChannelError, HostChannel, Wait};

/// The I/O adapter for one logical buffer.
///
/// Holds a borrowed channel for the duration of one bridge invocation; the
/// channel is never stashed in global state.
pub struct Console<'c, C: HostChannel + ?Sized> {
    channel: &'c mut C,
    buffer: BufferId,
}

impl<'c, C: HostChannel + ?Sized> Console<'c, C> {
    /// Console over the interactive buffer (id 0), both directions
    pub fn new(channel: &'c mut C) -> Self {
        Self::with_buffer(channel, BufferId::REPL)
    }

    /// Console over an explicit buffer id
    pub fn with_buffer(channel: &'c mut C, buffer: BufferId) -> Self {
        Self { channel, buffer }
    }

    /// The buffer this console is bound to
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Blocking single-character read: poll indefinitely, then read one
    /// byte.
    ///
    /// A not-ready poll result or an empty read just polls again - the
    /// host may have raced the buffer empty. A channel error is final.
    pub fn read_char(&mut self) -> Result<u8, ChannelError> {
        loop {
            if self.channel.poll(self.buffer, Wait::Indefinite)?.is_ready() {
                let mut byte = [0u8; 1];
                if self.channel.read(self.buffer, &mut byte)? == 1 {
                    return Ok(byte[0]);
                }
            }
        }
    }

    /// One write call for the whole span.
    ///
    /// The count the host reports is discarded: whether short writes occur
    /// in practice is host-defined, and there is no retry loop here. An
    /// empty span is skipped entirely; the host contract already makes it
    /// a no-op.
    pub fn write_all(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let _ = self.channel.write(self.buffer, bytes);
    }

    /// Cooperative delay, forwarded to the host
    pub fn delay_ms(&mut self, millis: u32) {
        self.channel.delay_ms(millis);
    }

    /// Host millisecond timestamp, forwarded
    pub fn timestamp_ms(&mut self) -> u32 {
        self.channel.timestamp_ms()
    }
}
