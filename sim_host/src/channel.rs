//! The simulated host channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use host_channel::{BufferId, ChannelError, HostChannel, PollStatus, Wait};

/// Shared handle onto the channel's output stream.
///
/// Stays readable even while the channel itself is mutably borrowed by a
/// running bridge, and after a run that never returns (a halted bridge on
/// another thread).
#[derive(Debug, Clone, Default)]
pub struct OutputTap {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl OutputTap {
    /// Everything written so far
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The output interpreted as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    fn push(&self, bytes: &[u8]) {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(bytes);
    }
}

/// Per-call counters, for asserting on call shape rather than just effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    pub peeks: usize,
    pub polls: usize,
    pub reads: usize,
    pub writes: usize,
    pub delays: usize,
}

/// Deterministic in-process host channel.
///
/// Input is a pre-loaded script consumed one read at a time; output
/// accumulates in a tap that outlives any borrow of the channel. Time is a
/// virtual millisecond clock advanced only by `delay_ms`. Only the
/// interactive buffer (id 0) exists; every other id is rejected loudly so a
/// bridge bug cannot pass silently.
pub struct SimChannel {
    input: VecDeque<u8>,
    output: OutputTap,
    clock_ms: u32,
    short_write_cap: Option<usize>,
    counters: ChannelCounters,
}

impl SimChannel {
    /// Channel pre-loaded with `script` as pending input
    pub fn new(script: &[u8]) -> Self {
        Self {
            input: script.iter().copied().collect(),
            output: OutputTap::default(),
            clock_ms: 0,
            short_write_cap: None,
            counters: ChannelCounters::default(),
        }
    }

    /// A cloneable handle onto the output stream
    pub fn output_tap(&self) -> OutputTap {
        self.output.clone()
    }

    /// Queues further input behind whatever is already pending
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Caps every write's accepted count at `cap` bytes, to exercise
    /// short-write handling
    pub fn set_short_write_cap(&mut self, cap: usize) {
        self.short_write_cap = Some(cap);
    }

    /// The virtual clock in milliseconds
    pub fn clock_ms(&self) -> u32 {
        self.clock_ms
    }

    /// Call counters so far
    pub fn counters(&self) -> ChannelCounters {
        self.counters
    }

    fn check_buffer(buf: BufferId) -> Result<(), ChannelError> {
        if buf == BufferId::REPL {
            Ok(())
        } else {
            Err(ChannelError::InvalidParameter)
        }
    }
}

impl HostChannel for SimChannel {
    fn peek(&mut self, buf: BufferId) -> usize {
        self.counters.peeks += 1;
        if buf == BufferId::REPL {
            self.input.len()
        } else {
            0
        }
    }

    fn poll(&mut self, buf: BufferId, wait: Wait) -> Result<PollStatus, ChannelError> {
        self.counters.polls += 1;
        Self::check_buffer(buf)?;
        if !self.input.is_empty() {
            return Ok(PollStatus::Ready);
        }
        match wait {
            // Nothing will ever refill the script while the caller blocks,
            // so an indefinite wait on an empty buffer would hang the test
            // run. Fail it instead.
            Wait::Indefinite => Err(ChannelError::InvalidState),
            Wait::Millis(millis) => {
                self.clock_ms = self.clock_ms.wrapping_add(millis);
                Ok(PollStatus::TimedOut)
            }
        }
    }

    fn read(&mut self, buf: BufferId, dest: &mut [u8]) -> Result<usize, ChannelError> {
        self.counters.reads += 1;
        Self::check_buffer(buf)?;
        let mut copied = 0;
        for slot in dest.iter_mut() {
            match self.input.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        Ok(copied)
    }

    fn write(&mut self, buf: BufferId, src: &[u8]) -> Result<usize, ChannelError> {
        self.counters.writes += 1;
        Self::check_buffer(buf)?;
        if src.is_empty() {
            return Ok(0);
        }
        let accepted = match self.short_write_cap {
            Some(cap) => src.len().min(cap),
            None => src.len(),
        };
        self.output.push(&src[..accepted]);
        Ok(accepted)
    }

    fn delay_ms(&mut self, millis: u32) {
        self.counters.delays += 1;
        self.clock_ms = self.clock_ms.wrapping_add(millis);
    }

    fn timestamp_ms(&mut self) -> u32 {
        self.clock_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_is_consumed_in_order() {
        let mut chan = SimChannel::new(b"abc");
        assert_eq!(chan.peek(BufferId::REPL), 3);

        let mut buf = [0u8; 2];
        assert_eq!(chan.read(BufferId::REPL, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(chan.peek(BufferId::REPL), 1);

        let mut rest = [0u8; 4];
        assert_eq!(chan.read(BufferId::REPL, &mut rest).unwrap(), 1);
        assert_eq!(rest[0], b'c');
        // Draining past the end is a zero-length read, not an error
        assert_eq!(chan.read(BufferId::REPL, &mut rest).unwrap(), 0);
    }

    #[test]
    fn test_poll_reflects_pending_input() {
        let mut chan = SimChannel::new(b"x");
        assert_eq!(
            chan.poll(BufferId::REPL, Wait::Millis(0)).unwrap(),
            PollStatus::Ready
        );

        let mut buf = [0u8; 1];
        chan.read(BufferId::REPL, &mut buf).unwrap();
        assert_eq!(
            chan.poll(BufferId::REPL, Wait::Millis(10)).unwrap(),
            PollStatus::TimedOut
        );
        // The timed-out wait advanced the virtual clock
        assert_eq!(chan.clock_ms(), 10);
    }

    #[test]
    fn test_indefinite_poll_on_drained_script_fails_loudly() {
        let mut chan = SimChannel::new(b"");
        assert_eq!(
            chan.poll(BufferId::REPL, Wait::Indefinite),
            Err(ChannelError::InvalidState)
        );
    }

    #[test]
    fn test_unknown_buffer_ids_are_rejected() {
        let mut chan = SimChannel::new(b"x");
        let bogus = BufferId::new(3);

        assert_eq!(chan.peek(bogus), 0);
        assert_eq!(
            chan.poll(bogus, Wait::Millis(0)),
            Err(ChannelError::InvalidParameter)
        );
        let mut buf = [0u8; 1];
        assert_eq!(
            chan.read(bogus, &mut buf),
            Err(ChannelError::InvalidParameter)
        );
        assert_eq!(
            chan.write(bogus, b"y"),
            Err(ChannelError::InvalidParameter)
        );
    }

    #[test]
    fn test_output_tap_survives_the_channel_borrow() {
        let mut chan = SimChannel::new(b"");
        let tap = chan.output_tap();
        chan.write(BufferId::REPL, b"hello").unwrap();
        chan.write(BufferId::REPL, b" world").unwrap();
        assert_eq!(tap.bytes(), b"hello world");
        assert_eq!(tap.text(), "hello world");
    }

    #[test]
    fn test_short_write_cap_truncates_each_call() {
        let mut chan = SimChannel::new(b"");
        chan.set_short_write_cap(2);
        assert_eq!(chan.write(BufferId::REPL, b"abcdef").unwrap(), 2);
        assert_eq!(chan.output_tap().bytes(), b"ab");
    }

    #[test]
    fn test_empty_write_accepts_zero() {
        let mut chan = SimChannel::new(b"");
        assert_eq!(chan.write(BufferId::REPL, b"").unwrap(), 0);
        assert!(chan.output_tap().bytes().is_empty());
    }

    #[test]
    fn test_virtual_clock_advances_only_by_delay() {
        let mut chan = SimChannel::new(b"");
        assert_eq!(chan.timestamp_ms(), 0);
        chan.delay_ms(250);
        chan.delay_ms(50);
        assert_eq!(chan.timestamp_ms(), 300);
        assert_eq!(chan.counters().delays, 2);
    }
}
