// SPDX-License-Identifier: GPL-3.0-only

//! Counting gate bounding the frames in flight on the GPU

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Counting semaphore sized to the uniform ring
///
/// The draw thread takes a [`FramePermit`] before encoding a frame; the
/// permit travels with the submitted work and is returned when the GPU
/// reports completion (or when it is dropped unused).
#[derive(Debug)]
pub struct FrameGate {
    capacity: usize,
    available: Mutex<usize>,
    released: Condvar,
}

impl FrameGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            available: Mutex::new(capacity),
            released: Condvar::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Permits currently held by frames in flight
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Block until a permit is free
    pub fn acquire(self: &Arc<Self>) -> FramePermit {
        let mut available = self.lock();
        while *available == 0 {
            trace!("Frame gate full, waiting for GPU completion");
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        FramePermit {
            gate: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut available = self.lock();
        debug_assert!(*available < self.capacity, "frame gate over-released");
        *available = (*available + 1).min(self.capacity);
        drop(available);
        self.released.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One unit of gate capacity; returned to the gate on drop
#[derive(Debug)]
pub struct FramePermit {
    gate: Arc<FrameGate>,
}

impl Drop for FramePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_return_on_drop() {
        let gate = FrameGate::new(3);
        let first = gate.acquire();
        let second = gate.acquire();
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        assert_eq!(gate.available(), 2);
        drop(second);
        assert_eq!(gate.available(), 3);
    }

    #[test]
    fn acquire_beyond_capacity_blocks_until_release() {
        let gate = FrameGate::new(3);
        let mut held: Vec<FramePermit> = (0..3).map(|_| gate.acquire()).collect();

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let gate = Arc::clone(&gate);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let permit = gate.acquire();
                acquired.store(true, Ordering::SeqCst);
                permit
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "fourth acquire must block");
        assert_eq!(gate.in_flight(), 3);

        // Simulated GPU completion of the oldest frame
        held.remove(0);
        let fourth = waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(gate.in_flight(), 3);

        drop(fourth);
        drop(held);
        assert_eq!(gate.available(), 3);
    }
}
