// Sample ring buffer between the playback worker and the device callback

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-capacity FIFO of f32 samples
pub struct SampleRing {
    buffer: Vec<f32>,
    read_pos: usize,
    len: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            read_pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Append as many samples as fit. Returns the count taken.
    pub fn push(&mut self, data: &[f32]) -> usize {
        let count = data.len().min(self.free());
        if count == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let start = (self.read_pos + self.len) % capacity;
        // Two chunks when the write wraps
        let first = count.min(capacity - start);
        self.buffer[start..start + first].copy_from_slice(&data[..first]);
        self.buffer[..count - first].copy_from_slice(&data[first..count]);

        self.len += count;
        count
    }

    /// Remove up to `output.len()` samples. Returns the count copied.
    pub fn pop(&mut self, output: &mut [f32]) -> usize {
        let count = output.len().min(self.len);
        if count == 0 {
            return 0;
        }

        let capacity = self.capacity();
        let first = count.min(capacity - self.read_pos);
        output[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        output[first..count].copy_from_slice(&self.buffer[..count - first]);

        self.read_pos = (self.read_pos + count) % capacity;
        self.len -= count;
        count
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.len = 0;
    }

    /// Buffer fullness from 0.0 to 1.0
    pub fn fullness(&self) -> f32 {
        self.len as f32 / self.capacity() as f32
    }
}

struct RingState {
    ring: SampleRing,
    closed: bool,
}

/// Shared ring with a blocking producer side
///
/// The consumer (device callback) never blocks; the producer waits for space.
#[derive(Clone)]
pub struct SharedRing {
    inner: Arc<(Mutex<RingState>, Condvar)>,
}

/// Upper bound on a single producer wait, so a stalled device cannot hang it
const WAIT_SLICE: Duration = Duration::from_millis(50);

impl SharedRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(RingState {
                    ring: SampleRing::new(capacity),
                    closed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Append all of `data`, waiting for the consumer to make room.
    /// Returns early with a short count once the ring is closed.
    pub fn push_blocking(&self, data: &[f32]) -> usize {
        let (lock, space) = &*self.inner;
        let mut state = lock.lock();
        let mut written = 0;

        while written < data.len() {
            if state.closed {
                break;
            }
            let n = state.ring.push(&data[written..]);
            written += n;
            if n == 0 {
                space.wait_for(&mut state, WAIT_SLICE);
            }
        }

        written
    }

    /// Consumer side. Never blocks.
    pub fn pop(&self, output: &mut [f32]) -> usize {
        let (lock, space) = &*self.inner;
        let read = lock.lock().ring.pop(output);
        if read > 0 {
            space.notify_all();
        }
        read
    }

    /// Drop everything buffered
    pub fn clear(&self) {
        let (lock, space) = &*self.inner;
        lock.lock().ring.clear();
        space.notify_all();
    }

    /// Release blocked producers and refuse further blocking writes
    pub fn close(&self) {
        let (lock, space) = &*self.inner;
        lock.lock().closed = true;
        space.notify_all();
    }

    pub fn reopen(&self) {
        self.inner.0.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.0.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.0.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.0.lock().ring.capacity()
    }

    pub fn fullness(&self) -> f32 {
        self.inner.0.lock().ring.fullness()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wraps_around_in_order() {
        let mut ring = SampleRing::new(4);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0]), 3);

        let mut out = [0.0; 2];
        assert_eq!(ring.pop(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);

        assert_eq!(ring.push(&[4.0, 5.0, 6.0, 7.0]), 3);
        assert_eq!(ring.free(), 0);

        let mut out = [0.0; 8];
        assert_eq!(ring.pop(&mut out), 4);
        assert_eq!(&out[..4], &[3.0, 4.0, 5.0, 6.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_capacity_is_usable() {
        let mut ring = SampleRing::new(3);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(ring.fullness(), 1.0);
        ring.clear();
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn blocking_push_waits_for_consumer() {
        let ring = SharedRing::new(8);
        let consumer = ring.clone();

        let reader = thread::spawn(move || {
            let mut total = Vec::new();
            let mut buf = [0.0; 4];
            while total.len() < 32 {
                let n = consumer.pop(&mut buf);
                total.extend_from_slice(&buf[..n]);
                if n == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            total
        });

        let data: Vec<f32> = (0..32).map(|i| i as f32).collect();
        assert_eq!(ring.push_blocking(&data), 32);
        assert_eq!(reader.join().unwrap(), data);
    }

    #[test]
    fn close_releases_blocked_producer() {
        let ring = SharedRing::new(4);
        let closer = ring.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        assert_eq!(ring.push_blocking(&[0.0; 10]), 4);
        handle.join().unwrap();
        assert!(ring.is_closed());

        ring.reopen();
        ring.clear();
        assert_eq!(ring.push_blocking(&[1.0]), 1);
    }

    #[test]
    fn fullness_tracks_pending_samples() {
        let ring = SharedRing::new(8);
        assert_eq!(ring.fullness(), 0.0);

        assert_eq!(ring.push_blocking(&[0.5; 6]), 6);
        assert_eq!(ring.fullness(), 0.75);

        let mut out = [0.0; 4];
        assert_eq!(ring.pop(&mut out), 4);
        assert_eq!(ring.fullness(), 0.25);

        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.fullness(), 0.0);
    }
}
