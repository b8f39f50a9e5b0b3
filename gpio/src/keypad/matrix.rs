use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;
use log::{debug, trace};
use crate::{GpioError, GpioResult, LineBus, LineId, LineLevel, LineMode};
use crate::keypad::{EventQueue, KeyEdge, KeyEvent, KeyState, KeyStateTable, Keypad};

/// A diode-multiplexed switch matrix scanned one column at a time.
///
/// Columns are outputs resting high; rows are pulled-up inputs. While a column is driven low, every
/// closed switch on it pulls its row low too. Driving more than one column at once would let
/// current sneak through shared rows, so [MatrixKeypad::tick] never does.
pub struct MatrixKeypad<'a> {
    bus: &'a dyn LineBus,
    keymap: Vec<u8>,
    rows: Vec<LineId>,
    cols: Vec<LineId>,
    states: KeyStateTable,
    events: EventQueue,
    settling_delay: Duration,
    begun: bool,
}

impl Debug for MatrixKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixKeypad({:?}, rows {:?}, cols {:?})", self.bus, self.rows, self.cols)
    }
}

impl<'a> MatrixKeypad<'a> {
    /// Delay between driving a column and reading the rows, used when none is given.
    pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_micros(20);

    /// Creates a new `MatrixKeypad` over the given bus.
    ///
    /// `keymap` lists the key identifiers row by row, so the key at `(row, col)` is
    /// `keymap[row * cols.len() + col]`.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if there are no rows or columns, or more than 256 of either.
    /// - `GpioError::DimensionMismatch` if the keymap does not cover the grid exactly.
    pub fn new(
        bus: &'a dyn LineBus,
        keymap: Vec<u8>,
        rows: Vec<LineId>,
        cols: Vec<LineId>,
    ) -> GpioResult<Self> {
        let max = u8::MAX as usize + 1;
        if rows.is_empty() || cols.is_empty() || rows.len() > max || cols.len() > max {
            return Err(GpioError::InvalidArgument);
        }

        let expected = rows.len() * cols.len();
        if keymap.len() != expected {
            return Err(GpioError::DimensionMismatch {
                expected,
                actual: keymap.len(),
            });
        }

        Ok(MatrixKeypad {
            bus,
            keymap,
            rows,
            cols,
            states: KeyStateTable::new(expected),
            events: EventQueue::default(),
            settling_delay: Self::DEFAULT_SETTLING_DELAY,
            begun: false,
        })
    }

    pub fn with_settling_delay(mut self, settling_delay: Duration) -> Self {
        self.settling_delay = settling_delay;
        self
    }

    /// Replaces the event queue with an empty one of the given byte capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.events = EventQueue::with_capacity(capacity);
        self
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols.len()
    }

    /// Zeroes the key states and configures the lines.
    ///
    /// Columns become outputs resting at the inactive level, rows become pulled-up inputs.
    pub fn begin(&mut self) -> GpioResult<()> {
        self.states.reset();

        for &col in &self.cols {
            self.bus.set_line_mode(col, LineMode::Output)?;
            self.bus.set_line(col, LineLevel::INACTIVE)?;
        }
        for &row in &self.rows {
            self.bus.set_line_mode(row, LineMode::InputPullUp)?;
        }

        self.begun = true;
        debug!("{:?} initialized.", self);
        Ok(())
    }

    /// Gets the position of the key in the keymap, if it is there.
    ///
    /// Useful for validating configuration before the query methods are used.
    pub fn key_index(&self, key: u8) -> Option<usize> {
        self.keymap.iter().position(|&k| k == key)
    }

    #[track_caller]
    fn state_mut(&mut self, key: u8) -> &mut KeyState {
        match self.key_index(key) {
            Some(index) => self.states.get_mut(index),
            None => panic!("key {key:#04x} is not in the keymap"),
        }
    }

    #[track_caller]
    fn state(&self, key: u8) -> KeyState {
        match self.key_index(key) {
            Some(index) => self.states.get(index),
            None => panic!("key {key:#04x} is not in the keymap"),
        }
    }

    /// Checks whether the key has been pressed since the flag was last cleared.
    ///
    /// # Panics
    /// If the key is not in the keymap.
    #[track_caller]
    pub fn just_pressed(&mut self, key: u8, clear: bool) -> bool {
        self.state_mut(key).take_just_pressed(clear)
    }

    /// Checks whether the key has been released since the flag was last cleared.
    /// Always clears the flag.
    ///
    /// # Panics
    /// If the key is not in the keymap.
    #[track_caller]
    pub fn just_released(&mut self, key: u8) -> bool {
        self.state_mut(key).take_just_released()
    }

    /// # Panics
    /// If the key is not in the keymap.
    #[track_caller]
    pub fn is_pressed(&self, key: u8) -> bool {
        self.state(key).is_pressed()
    }

    /// # Panics
    /// If the key is not in the keymap.
    #[track_caller]
    pub fn is_released(&self, key: u8) -> bool {
        !self.state(key).is_pressed()
    }

    /// Reads every row of the currently driven column and records the edges.
    fn scan_column(&mut self, c: usize) -> GpioResult<()> {
        let bus = self.bus;
        for r in 0..self.rows.len() {
            let pressed = bus.read_line(self.rows[r])?.is_low();
            let index = r * self.cols.len() + c;
            let key = self.keymap[index];
            let state = self.states.get_mut(index);

            let edge = if pressed && !state.is_pressed() {
                state.press();
                KeyEdge::Pressed
            } else if !pressed && state.is_pressed() {
                state.release();
                KeyEdge::Released
            } else {
                continue;
            };

            trace!("key {:#04x} at ({}, {}) {:?}", key, r, c, edge);
            self.events.push(KeyEvent::new(edge, key, r as u8, c as u8));
        }
        Ok(())
    }
}

impl Keypad for MatrixKeypad<'_> {
    fn tick(&mut self) -> GpioResult<()> {
        if !self.begun {
            return Err(GpioError::InvalidArgument);
        }

        let bus = self.bus;
        for &col in &self.cols {
            bus.set_line(col, LineLevel::INACTIVE)?;
        }

        for c in 0..self.cols.len() {
            let col = self.cols[c];
            bus.set_line(col, LineLevel::ACTIVE)?;
            thread::sleep(self.settling_delay);
            let scanned = self.scan_column(c);
            // Release the column even if a read failed, so it cannot ghost into the next scan.
            bus.set_line(col, LineLevel::INACTIVE)?;
            scanned?;
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.events.available()
    }

    fn read(&mut self) -> GpioResult<KeyEvent> {
        self.events.pop()
    }

    fn clear(&mut self) {
        self.events.clear();
        self.states.reset();
    }

    fn keymap(&self) -> &[u8] {
        &self.keymap
    }
}
