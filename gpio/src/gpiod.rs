//! [LineBus] implementation on top of the Linux GPIO character device, using the gpiod library.
use crate::{GpioError, GpioResult, LineBus, LineId, LineLevel, LineMode};
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// A requested line, kept alive for as long as the bus holds it.
enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output {
        line: gpiod::Lines<gpiod::Output>,
        level: LineLevel,
    },
}

/// GpiodLineBus is a line bus that requests lines from a gpiochip on demand.
///
/// Each call to [LineBus::set_line_mode] releases the previous request for that line (if any)
/// and requests it again in the new mode.
pub struct GpiodLineBus {
    chip: gpiod::Chip,
    lines: RefCell<HashMap<LineId, GpiodLine>>,
}

impl GpiodLineBus {
    pub fn new(chip: gpiod::Chip) -> Self {
        Self {
            chip,
            lines: RefCell::new(HashMap::new()),
        }
    }

    /// Opens the chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path)?;
        Ok(Self::new(chip))
    }

    /// Gets the amount of lines the chip provides.
    pub fn count(&self) -> usize {
        self.chip.num_lines() as usize
    }

    fn check_line(&self, line: LineId) -> GpioResult<()> {
        if line as usize >= self.count() {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }
}

impl Debug for GpiodLineBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodLineBus({})", self.chip.name())
    }
}

impl LineBus for GpiodLineBus {
    fn set_line_mode(&self, line: LineId, mode: LineMode) -> GpioResult<()> {
        self.check_line(line)?;

        let mut lines = self.lines.borrow_mut();
        // The kernel refuses a second request for a line we still hold.
        lines.remove(&line);

        let requested = match mode {
            LineMode::InputPullUp => GpiodLine::Input(self.chip.request_lines(
                gpiod::Options::input([line])
                    .consumer(env!("CARGO_PKG_NAME"))
                    .bias(gpiod::Bias::PullUp),
            )?),
            LineMode::Output => {
                let output = self.chip.request_lines(
                    gpiod::Options::output([line]).consumer(env!("CARGO_PKG_NAME")),
                )?;
                output.set_values([LineLevel::INACTIVE.is_high()])?;
                GpiodLine::Output {
                    line: output,
                    level: LineLevel::INACTIVE,
                }
            }
        };

        debug!("{:?}: line {} requested as {:?}", self, line, mode);
        lines.insert(line, requested);
        Ok(())
    }

    fn set_line(&self, line: LineId, level: LineLevel) -> GpioResult<()> {
        let mut lines = self.lines.borrow_mut();
        match lines.get_mut(&line) {
            Some(GpiodLine::Output { line: output, level: current }) => {
                output.set_values([level.is_high()])?;
                *current = level;
                trace!("line {} <- {:?}", line, level);
                Ok(())
            }
            Some(GpiodLine::Input(_)) => Err(GpioError::WrongLineMode(line)),
            None => Err(GpioError::LineNotConfigured(line)),
        }
    }

    fn read_line(&self, line: LineId) -> GpioResult<LineLevel> {
        let lines = self.lines.borrow();
        match lines.get(&line) {
            Some(GpiodLine::Input(input)) => {
                let [value] = input.get_values([false])?;
                Ok(value.into())
            }
            Some(GpiodLine::Output { level, .. }) => Ok(*level),
            None => Err(GpioError::LineNotConfigured(line)),
        }
    }
}
