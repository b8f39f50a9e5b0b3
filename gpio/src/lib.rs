pub mod gpiod;
pub mod keypad;
pub mod soft;
pub mod touch;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("line already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("line {0} has not been configured")]
    LineNotConfigured(LineId),
    #[error("line {0} is not configured for this operation")]
    WrongLineMode(LineId),
    #[error("expected {expected} entries, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("event queue is empty")]
    QueueEmpty,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Identifies a single line on the bus, e.g. a gpiochip line offset or an expander pin.
pub type LineId = u32;

/// Specifies what a line is used for.
///
/// Rows of a switch matrix are inputs with the pull-up enabled, so an open contact reads high.
/// Columns are outputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LineMode {
    #[default] Output,
    InputPullUp,
}

/// The electrical level of a line.
///
/// Scanning is active-low: a driven column sits at [LineLevel::Low] and a pressed contact pulls
/// its row down to the same level.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LineLevel {
    #[default] High,
    Low,
}

impl LineLevel {
    /// The level a column is driven to while it is being scanned.
    pub const ACTIVE: LineLevel = LineLevel::Low;
    /// The level an idle column rests at.
    pub const INACTIVE: LineLevel = LineLevel::High;

    pub fn is_high(self) -> bool {
        self == LineLevel::High
    }

    pub fn is_low(self) -> bool {
        self == LineLevel::Low
    }
}

impl From<bool> for LineLevel {
    fn from(high: bool) -> Self {
        if high { LineLevel::High } else { LineLevel::Low }
    }
}

impl From<LineLevel> for bool {
    fn from(level: LineLevel) -> Self {
        level.is_high()
    }
}

/// The whole contract a scan driver needs from the hardware underneath it.
///
/// Any GPIO-capable bus (SoC pins, an I²C expander, a simulation) can implement it.
/// Methods take `&self`, so implementations keep their line state behind interior mutability.
pub trait LineBus: Debug {
    /// Configures the line as an output or as a pulled-up input.
    fn set_line_mode(&self, line: LineId, mode: LineMode) -> GpioResult<()>;

    /// Drives an output line to the given level.
    ///
    /// # Errors
    /// - `GpioError::WrongLineMode` if the line is not an output.
    fn set_line(&self, line: LineId, level: LineLevel) -> GpioResult<()>;

    /// Reads the current level of the line.
    fn read_line(&self, line: LineId) -> GpioResult<LineLevel>;
}
