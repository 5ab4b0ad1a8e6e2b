// Growable byte buffer with explicit cursors, plus its monitor wrapper
//
// The inner buffer owns a plain byte vector with read/write cursor
// indices; growth reallocates and copies, capacity never shrinks, and
// content past the write cursor is undefined. The monitor wrapper adds
// the blocking producer/consumer semantics the channel needs.

use crate::stream::StreamError;
use parking_lot::{Condvar, Mutex};

/// Owned byte buffer with read/write cursors.
#[derive(Debug)]
pub struct ByteBuffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl ByteBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Bytes buffered and not yet read.
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn compact(&mut self) {
        if self.read_pos > 0 {
            self.buf.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }
    }

    /// Copy in as much of `data` as fits the fixed capacity; returns the
    /// number of bytes taken.
    pub fn write_up_to(&mut self, data: &[u8]) -> usize {
        if self.write_pos + data.len() > self.buf.len() {
            self.compact();
        }
        let n = data.len().min(self.buf.len() - self.write_pos);
        self.buf[self.write_pos..self.write_pos + n].copy_from_slice(&data[..n]);
        self.write_pos += n;
        n
    }

    /// Copy in all of `data`, growing (reallocate and copy) if needed.
    pub fn write_growing(&mut self, data: &[u8]) {
        let needed = self.available() + data.len();
        if needed > self.buf.len() {
            let new_capacity = (self.buf.len() * 2).max(needed);
            let mut new_buf = vec![0u8; new_capacity];
            new_buf[..self.available()]
                .copy_from_slice(&self.buf[self.read_pos..self.write_pos]);
            self.write_pos = self.available();
            self.read_pos = 0;
            self.buf = new_buf;
        } else if self.write_pos + data.len() > self.buf.len() {
            self.compact();
        }
        self.buf[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();
    }

    /// Take up to `max` bytes from the front.
    pub fn read_up_to(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.available());
        let out = self.buf[self.read_pos..self.read_pos + n].to_vec();
        self.read_pos += n;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
        out
    }
}

#[derive(Debug)]
struct State {
    buf: ByteBuffer,
    forced_return: bool,
    closed: bool,
    readers_waiting: usize,
}

/// A byte buffer behind a mutex + condvar monitor.
///
/// Bounded buffers (send side) block writers when full; unbounded buffers
/// (receive side) grow instead. Either way capacity never shrinks for the
/// lifetime of the connection.
#[derive(Debug)]
pub struct SharedBuffer {
    state: Mutex<State>,
    cond: Condvar,
    bounded: bool,
}

impl SharedBuffer {
    pub fn new(initial_capacity: usize, bounded: bool) -> Self {
        Self {
            state: Mutex::new(State {
                buf: ByteBuffer::new(initial_capacity),
                forced_return: false,
                closed: false,
                readers_waiting: 0,
            }),
            cond: Condvar::new(),
            bounded,
        }
    }

    /// Copy `data` in completely, suspending the caller whenever a bounded
    /// buffer is full until the consumer frees space.
    pub fn write_blocking(&self, data: &[u8]) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if !self.bounded {
            if state.closed {
                return Err(StreamError::Closed);
            }
            state.buf.write_growing(data);
            self.cond.notify_all();
            return Ok(());
        }
        let mut offset = 0;
        loop {
            if state.closed {
                return Err(StreamError::Closed);
            }
            offset += state.buf.write_up_to(&data[offset..]);
            if offset > 0 {
                self.cond.notify_all();
            }
            if offset == data.len() {
                return Ok(());
            }
            self.cond.wait(&mut state);
        }
    }

    /// Append without blocking, growing as needed (receive side, pump
    /// thread only).
    pub fn push(&self, data: &[u8]) {
        let mut state = self.state.lock();
        state.buf.write_growing(data);
        self.cond.notify_all();
    }

    /// Block until at least `n` bytes are buffered, the buffer is closed,
    /// or a forced return is signaled; then return what is available, up
    /// to `n` bytes. An empty result signals end-of-data, not an error.
    pub fn read_blocking(&self, n: usize) -> Vec<u8> {
        let mut state = self.state.lock();
        loop {
            if state.buf.available() >= n || state.closed || state.forced_return {
                state.forced_return = false;
                let out = state.buf.read_up_to(n);
                if !out.is_empty() {
                    self.cond.notify_all();
                }
                return out;
            }
            state.readers_waiting += 1;
            self.cond.wait(&mut state);
            state.readers_waiting -= 1;
        }
    }

    /// Drain up to `max` bytes without blocking (pump thread, send side).
    pub fn take_up_to(&self, max: usize) -> Vec<u8> {
        let mut state = self.state.lock();
        let out = state.buf.read_up_to(max);
        if !out.is_empty() {
            self.cond.notify_all();
        }
        out
    }

    pub fn available(&self) -> usize {
        self.state.lock().buf.available()
    }

    /// Whether some caller is currently suspended inside `read_blocking`.
    pub fn has_waiting_reader(&self) -> bool {
        self.state.lock().readers_waiting > 0
    }

    /// Make the next (or a currently blocked) `read_blocking` return with
    /// whatever is buffered. Sticky until consumed by one reader.
    pub fn force_return(&self) {
        let mut state = self.state.lock();
        state.forced_return = true;
        self.cond.notify_all();
    }

    /// Close the buffer: writers fail, blocked readers drain and return.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_byte_buffer_roundtrip() {
        let mut buf = ByteBuffer::new(8);
        assert_eq!(buf.write_up_to(b"abcd"), 4);
        assert_eq!(buf.available(), 4);
        assert_eq!(buf.read_up_to(2), b"ab");
        assert_eq!(buf.read_up_to(10), b"cd");
        assert_eq!(buf.available(), 0);
    }

    #[test]
    fn test_byte_buffer_compaction_reclaims_space() {
        let mut buf = ByteBuffer::new(8);
        buf.write_up_to(b"12345678");
        buf.read_up_to(6);
        // Tail is full, but compaction makes room at the front.
        assert_eq!(buf.write_up_to(b"abcdef"), 6);
        assert_eq!(buf.read_up_to(8), b"78abcdef");
    }

    #[test]
    fn test_byte_buffer_bounded_partial_write() {
        let mut buf = ByteBuffer::new(4);
        assert_eq!(buf.write_up_to(b"abcdef"), 4);
        assert_eq!(buf.write_up_to(b"xy"), 0);
    }

    #[test]
    fn test_byte_buffer_grows_and_preserves_content() {
        let mut buf = ByteBuffer::new(4);
        buf.write_growing(b"abcd");
        buf.write_growing(b"efghijkl");
        assert!(buf.capacity() >= 12);
        assert_eq!(buf.read_up_to(100), b"abcdefghijkl");
    }

    #[test]
    fn test_byte_buffer_growth_never_shrinks() {
        let mut buf = ByteBuffer::new(4);
        buf.write_growing(&[1u8; 100]);
        let grown = buf.capacity();
        buf.read_up_to(100);
        buf.write_growing(&[2u8; 4]);
        assert_eq!(buf.capacity(), grown);
    }

    #[test]
    fn test_interleaved_writes_and_reads_keep_order() {
        let mut buf = ByteBuffer::new(16);
        let mut expected = Vec::new();
        let mut actual = Vec::new();
        for i in 0..50u8 {
            let chunk = [i, i, i];
            expected.extend_from_slice(&chunk);
            buf.write_growing(&chunk);
            if i % 2 == 0 {
                actual.extend(buf.read_up_to(4));
            }
        }
        actual.extend(buf.read_up_to(usize::MAX));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_shared_read_returns_exact_when_available() {
        let shared = SharedBuffer::new(16, false);
        shared.push(b"abcdef");
        assert_eq!(shared.read_blocking(4), b"abcd");
        assert_eq!(shared.available(), 2);
    }

    #[test]
    fn test_shared_blocked_reader_wakes_on_push() {
        let shared = Arc::new(SharedBuffer::new(16, false));
        let reader = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.read_blocking(4))
        };
        // Give the reader time to block, then satisfy it.
        thread::sleep(Duration::from_millis(50));
        assert!(shared.has_waiting_reader());
        shared.push(b"wxyz");
        assert_eq!(reader.join().unwrap(), b"wxyz");
    }

    #[test]
    fn test_shared_forced_return_with_partial_data() {
        let shared = Arc::new(SharedBuffer::new(16, false));
        shared.push(b"ab");
        let reader = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.read_blocking(10))
        };
        thread::sleep(Duration::from_millis(50));
        shared.force_return();
        // Returns the two buffered bytes instead of waiting for ten.
        assert_eq!(reader.join().unwrap(), b"ab");
    }

    #[test]
    fn test_shared_forced_return_empty_signals_eof() {
        let shared = Arc::new(SharedBuffer::new(16, false));
        let reader = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.read_blocking(1))
        };
        thread::sleep(Duration::from_millis(50));
        shared.force_return();
        assert!(reader.join().unwrap().is_empty());
    }

    #[test]
    fn test_shared_forced_return_consumed_once() {
        let shared = SharedBuffer::new(16, false);
        shared.force_return();
        assert!(shared.read_blocking(5).is_empty());
        // Flag was consumed; buffered data reads normally afterwards.
        shared.push(b"abc");
        assert_eq!(shared.read_blocking(3), b"abc");
    }

    #[test]
    fn test_shared_bounded_writer_blocks_until_drained() {
        let shared = Arc::new(SharedBuffer::new(4, true));
        shared.write_blocking(b"1234").unwrap();
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.write_blocking(b"5678"))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!writer.is_finished());
        assert_eq!(shared.take_up_to(4), b"1234");
        writer.join().unwrap().unwrap();
        assert_eq!(shared.take_up_to(4), b"5678");
    }

    #[test]
    fn test_shared_close_fails_writers_and_drains_readers() {
        let shared = Arc::new(SharedBuffer::new(4, true));
        shared.write_blocking(b"ab").unwrap();
        shared.close();
        assert!(matches!(
            shared.write_blocking(b"cd"),
            Err(StreamError::Closed)
        ));
        assert_eq!(shared.read_blocking(10), b"ab");
        assert!(shared.read_blocking(10).is_empty());
    }

    #[test]
    fn test_shared_close_wakes_blocked_writer() {
        let shared = Arc::new(SharedBuffer::new(2, true));
        shared.write_blocking(b"ab").unwrap();
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.write_blocking(b"cdef"))
        };
        thread::sleep(Duration::from_millis(50));
        shared.close();
        assert!(matches!(writer.join().unwrap(), Err(StreamError::Closed)));
    }

    #[test]
    fn test_large_transfer_is_byte_exact() {
        let shared = Arc::new(SharedBuffer::new(8, false));
        let expected: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let writer = {
            let shared = Arc::clone(&shared);
            let data = expected.clone();
            thread::spawn(move || {
                for chunk in data.chunks(97) {
                    shared.push(chunk);
                }
            })
        };
        let mut actual = Vec::new();
        while actual.len() < expected.len() {
            actual.extend(shared.read_blocking(123));
        }
        writer.join().unwrap();
        assert_eq!(actual, expected);
    }
}
