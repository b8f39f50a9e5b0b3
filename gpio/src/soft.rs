//! A software-only [LineBus] simulating a diode-multiplexed switch matrix.
//!
//! Used by the tests and by the app when no gpiochip is configured.
use crate::{GpioError, GpioResult, LineBus, LineId, LineLevel, LineMode};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};

/// A single operation performed on a [SoftLineBus].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusOp {
    Mode(LineId, LineMode),
    Set(LineId, LineLevel),
    Read(LineId, LineLevel),
}

#[derive(Copy, Clone, Debug)]
enum SoftLine {
    Output(LineLevel),
    Input,
}

/// A simulated bus with switches between row (input) and column (output) lines.
///
/// A row reads low only while one of its closed switches leads to a column driven low, which is
/// exactly what the diodes of a real matrix allow through.
#[derive(Default)]
pub struct SoftLineBus {
    lines: RefCell<BTreeMap<LineId, SoftLine>>,
    closed: RefCell<BTreeSet<(LineId, LineId)>>,
    trace: RefCell<Vec<BusOp>>,
    max_low_outputs: Cell<usize>,
    failing_reads: RefCell<BTreeSet<LineId>>,
}

impl SoftLineBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the switch between the row line and the column line.
    pub fn press(&self, row: LineId, col: LineId) {
        self.closed.borrow_mut().insert((row, col));
    }

    /// Opens the switch between the row line and the column line.
    pub fn release(&self, row: LineId, col: LineId) {
        self.closed.borrow_mut().remove(&(row, col));
    }

    /// Opens every switch.
    pub fn release_all(&self) {
        self.closed.borrow_mut().clear();
    }

    /// Makes every subsequent read of the line fail with an IO error.
    pub fn fail_reads(&self, line: LineId) {
        self.failing_reads.borrow_mut().insert(line);
    }

    /// Gets the mode the line was last configured with.
    pub fn mode(&self, line: LineId) -> Option<LineMode> {
        self.lines.borrow().get(&line).map(|l| match l {
            SoftLine::Output(_) => LineMode::Output,
            SoftLine::Input => LineMode::InputPullUp,
        })
    }

    /// Gets the level an output line is currently driven to.
    pub fn output_level(&self, line: LineId) -> Option<LineLevel> {
        match self.lines.borrow().get(&line) {
            Some(SoftLine::Output(level)) => Some(*level),
            _ => None,
        }
    }

    /// The highest number of outputs that were low at the same time.
    pub fn max_low_outputs(&self) -> usize {
        self.max_low_outputs.get()
    }

    /// Takes the operations recorded so far.
    pub fn take_trace(&self) -> Vec<BusOp> {
        std::mem::take(&mut *self.trace.borrow_mut())
    }

    fn low_outputs(&self) -> usize {
        self.lines
            .borrow()
            .values()
            .filter(|l| matches!(l, SoftLine::Output(LineLevel::Low)))
            .count()
    }
}

impl Debug for SoftLineBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftLineBus({} lines)", self.lines.borrow().len())
    }
}

impl LineBus for SoftLineBus {
    fn set_line_mode(&self, line: LineId, mode: LineMode) -> GpioResult<()> {
        let soft = match mode {
            LineMode::Output => SoftLine::Output(LineLevel::INACTIVE),
            LineMode::InputPullUp => SoftLine::Input,
        };
        self.lines.borrow_mut().insert(line, soft);
        self.trace.borrow_mut().push(BusOp::Mode(line, mode));
        Ok(())
    }

    fn set_line(&self, line: LineId, level: LineLevel) -> GpioResult<()> {
        match self.lines.borrow_mut().get_mut(&line) {
            Some(SoftLine::Output(current)) => *current = level,
            Some(SoftLine::Input) => return Err(GpioError::WrongLineMode(line)),
            None => return Err(GpioError::LineNotConfigured(line)),
        }
        self.trace.borrow_mut().push(BusOp::Set(line, level));

        let low = self.low_outputs();
        if low > self.max_low_outputs.get() {
            self.max_low_outputs.set(low);
        }
        Ok(())
    }

    fn read_line(&self, line: LineId) -> GpioResult<LineLevel> {
        if self.failing_reads.borrow().contains(&line) {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }

        let lines = self.lines.borrow();
        let level = match lines.get(&line) {
            Some(SoftLine::Output(level)) => *level,
            Some(SoftLine::Input) => {
                let pulled_down = self
                    .closed
                    .borrow()
                    .iter()
                    .filter(|(row, _)| *row == line)
                    .any(|(_, col)| matches!(lines.get(col), Some(SoftLine::Output(LineLevel::Low))));
                if pulled_down { LineLevel::Low } else { LineLevel::High }
            }
            None => return Err(GpioError::LineNotConfigured(line)),
        };
        self.trace.borrow_mut().push(BusOp::Read(line, level));
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpressed_row_reads_high() {
        let bus = SoftLineBus::new();
        bus.set_line_mode(1, LineMode::InputPullUp).unwrap();
        bus.set_line_mode(10, LineMode::Output).unwrap();
        bus.set_line(10, LineLevel::Low).unwrap();
        assert_eq!(bus.read_line(1), Ok(LineLevel::High));
    }

    #[test]
    fn pressed_row_reads_low_only_while_column_is_driven() {
        let bus = SoftLineBus::new();
        bus.set_line_mode(1, LineMode::InputPullUp).unwrap();
        bus.set_line_mode(10, LineMode::Output).unwrap();
        bus.press(1, 10);

        assert_eq!(bus.read_line(1), Ok(LineLevel::High));
        bus.set_line(10, LineLevel::Low).unwrap();
        assert_eq!(bus.read_line(1), Ok(LineLevel::Low));
        bus.set_line(10, LineLevel::High).unwrap();
        assert_eq!(bus.read_line(1), Ok(LineLevel::High));
    }

    #[test]
    fn writing_to_an_input_fails() {
        let bus = SoftLineBus::new();
        bus.set_line_mode(1, LineMode::InputPullUp).unwrap();
        assert_eq!(bus.set_line(1, LineLevel::Low), Err(GpioError::WrongLineMode(1)));
        assert_eq!(bus.set_line(2, LineLevel::Low), Err(GpioError::LineNotConfigured(2)));
    }
}
