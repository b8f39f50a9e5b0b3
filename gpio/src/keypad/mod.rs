mod event;
mod matrix;
mod queue;
mod state;

use std::fmt::Debug;
use crate::GpioResult;
pub use event::*;
pub use matrix::*;
pub use queue::*;
pub use state::*;

/// The `Keypad` trait defines the interface for edge-reporting keypad input devices.
///
/// The owner calls [Keypad::tick] at its own cadence and then drains the queued events.
pub trait Keypad: Debug {
    /// Scans the keypad once, queueing an event for every key that changed since the last scan.
    fn tick(&mut self) -> GpioResult<()>;

    /// Gets the number of complete events waiting to be read.
    fn available(&self) -> usize;

    /// Pops the oldest event.
    ///
    /// # Errors
    /// - `GpioError::QueueEmpty` if [Keypad::available] is zero.
    fn read(&mut self) -> GpioResult<KeyEvent>;

    /// Drops every queued event and forgets the state of every key.
    fn clear(&mut self);

    /// Key identifiers in scan order, row by row.
    fn keymap(&self) -> &[u8];
}
