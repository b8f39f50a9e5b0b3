use std::collections::VecDeque;
use log::warn;
use crate::{GpioError, GpioResult};
use crate::keypad::KeyEvent;

/// A fixed-capacity byte FIFO holding encoded [KeyEvent] records.
///
/// Records are stored whole or not at all, so the reader never sees a torn event.
#[derive(Debug, Clone)]
pub struct EventQueue {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl EventQueue {
    /// Capacity used when none is given, in bytes.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a queue able to hold `capacity` bytes.
    ///
    /// The capacity is rounded down to a whole number of records.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity - capacity % KeyEvent::SIZE;
        EventQueue {
            bytes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Gets the capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Gets the number of complete records queued.
    pub fn available(&self) -> usize {
        self.bytes.len() / KeyEvent::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Appends the event.
    ///
    /// Returns `false` (and drops the event) if the queue is full.
    pub fn push(&mut self, event: KeyEvent) -> bool {
        if self.capacity - self.bytes.len() < KeyEvent::SIZE {
            warn!("Event queue full, dropping {:?}", event);
            return false;
        }
        self.bytes.extend(event.encode());
        true
    }

    /// Pops the oldest event.
    ///
    /// # Errors
    /// - `GpioError::QueueEmpty` if no complete record is queued.
    pub fn pop(&mut self) -> GpioResult<KeyEvent> {
        if self.is_empty() {
            return Err(GpioError::QueueEmpty);
        }
        let mut record = [0u8; KeyEvent::SIZE];
        for (byte, value) in record.iter_mut().zip(self.bytes.drain(..KeyEvent::SIZE)) {
            *byte = value;
        }
        KeyEvent::decode(record)
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
