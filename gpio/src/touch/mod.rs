//! Velocity estimation for pressure-sensed keys.
//!
//! Each [TouchKey] watches the pressure slope of one key. A quick rise pushes the derived force
//! over the play threshold, the first sample where the force drops marks the peak of the attack
//! and fires an onset, and a later fall back towards rest fires the release.
mod config;
mod window;

use log::{debug, info};
use crate::GpioResult;
pub use config::*;
pub use window::*;

/// Length of the rolling pressure and timing windows.
pub const READING_COUNT: usize = 8;

/// Where a [TouchKey] is in its attack/release cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TouchState {
    /// Nothing is happening.
    #[default]
    Off,
    /// Force rose above the threshold, waiting for it to peak.
    WillSound,
    /// The onset fired on this sample. Lasts exactly one sample.
    Sounding,
    /// Held after an onset, waiting for the release.
    Decaying,
}

/// What a [TouchKey] reports to the note layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TouchEvent {
    Onset { key: u8, velocity: f32 },
    Release { key: u8 },
}

impl TouchEvent {
    pub fn key(&self) -> u8 {
        match *self {
            TouchEvent::Onset { key, .. } | TouchEvent::Release { key } => key,
        }
    }
}

/// A single pressure reading of a sensor channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PressureSample {
    pub channel: u8,
    pub pressure: u8,
    /// Monotonic timestamp in milliseconds.
    pub time_ms: u64,
}

/// Anything that delivers digitized pressure readings, e.g. an ADC or a recording of one.
pub trait PressureSource {
    /// Gets the next reading, or `None` once the source is exhausted.
    fn next_sample(&mut self) -> GpioResult<Option<PressureSample>>;
}

/// The velocity classifier for one pressure-sensed key.
#[derive(Clone, Debug)]
pub struct TouchKey {
    key: u8,
    config: TouchConfig,
    pressures: Window<u8, READING_COUNT>,
    times: Window<u32, READING_COUNT>,
    state: TouchState,
    last_pressure: u8,
    last_time: Option<u64>,
    last_velocity: f32,
    last_force: f32,
    peak_force: f32,
    peak_pressure: u8,
}

impl TouchKey {
    pub fn new(key: u8, config: TouchConfig) -> Self {
        TouchKey {
            key,
            config,
            pressures: Window::new(),
            times: Window::new(),
            state: TouchState::Off,
            last_pressure: 0,
            last_time: None,
            last_velocity: 0.0,
            last_force: 0.0,
            peak_force: 0.0,
            peak_pressure: 0,
        }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    pub fn state(&self) -> TouchState {
        self.state
    }

    pub fn last_pressure(&self) -> u8 {
        self.last_pressure
    }

    /// Timestamp of the last admitted sample, if any since the last clear.
    pub fn last_time(&self) -> Option<u64> {
        self.last_time
    }

    pub fn last_velocity(&self) -> f32 {
        self.last_velocity
    }

    pub fn last_force(&self) -> f32 {
        self.last_force
    }

    /// Force latched at the last onset, capped at [TouchConfig::max_force].
    pub fn peak_force(&self) -> f32 {
        self.peak_force
    }

    pub fn peak_pressure(&self) -> u8 {
        self.peak_pressure
    }

    /// Number of samples currently held in the history.
    pub fn history_len(&self) -> usize {
        self.pressures.len()
    }

    /// Newest minus oldest pressure in the history.
    pub fn pressure_delta(&self) -> i16 {
        match (self.pressures.first(), self.pressures.last()) {
            (Some(newest), Some(oldest)) => newest as i16 - oldest as i16,
            _ => 0,
        }
    }

    /// Average time between samples, in whole milliseconds.
    ///
    /// The window length is added to the sum before dividing, which keeps the result at one or
    /// more for any history.
    pub fn touch_elapsed(&self) -> u64 {
        let total = READING_COUNT as u64 + self.times.iter().map(u64::from).sum::<u64>();
        total / READING_COUNT as u64
    }

    /// Pressure slope scaled by the sensitivity.
    pub fn velocity(&self) -> f32 {
        let elapsed = self.touch_elapsed();
        if elapsed == 0 {
            return 0.0;
        }
        self.config.sensitivity * self.pressure_delta() as f32 / elapsed as f32
    }

    /// Velocity weighted by the newest pressure.
    pub fn force(&self) -> f32 {
        match self.pressures.first() {
            Some(pressure) => self.velocity() * pressure as f32,
            None => 0.0,
        }
    }

    /// Feeds one reading taken at `time_ms`.
    ///
    /// Readings below the baseline are ignored entirely. Returns the event fired by this sample,
    /// if any.
    pub fn step(&mut self, pressure: u8, time_ms: u64) -> Option<TouchEvent> {
        if pressure < self.config.baseline {
            return None;
        }

        let elapsed = match self.last_time {
            Some(last) => time_ms.saturating_sub(last),
            None => 0,
        };
        self.last_pressure = pressure;
        self.last_time = Some(time_ms);
        self.pressures.unshift(pressure);
        self.times.unshift(u32::try_from(elapsed).unwrap_or(u32::MAX));

        let current_velocity = self.velocity();
        let current_force = self.force();
        let rest_level = self.config.rest_level();

        if self.config.debug && pressure > rest_level {
            info!("{}: new pressure {} after {} ms", self.key, pressure, elapsed);
            info!("{}: velocity {} force {}", self.key, current_velocity, current_force);
        }

        let mut event = None;
        match self.state {
            TouchState::Off => {
                if current_force > self.config.play_threshold && pressure > rest_level {
                    self.set_state(TouchState::WillSound);
                }
            }
            TouchState::WillSound => {
                // The previous sample was the peak; this one is already past it.
                if current_force < self.last_force {
                    self.peak_force = self.last_force.min(self.config.max_force);
                    self.peak_pressure = pressure;
                    self.set_state(TouchState::Sounding);
                    event = Some(TouchEvent::Onset {
                        key: self.key,
                        velocity: self.peak_force,
                    });
                }
            }
            TouchState::Sounding => {
                self.set_state(TouchState::Decaying);
            }
            TouchState::Decaying => {
                let fell_from_peak = self
                    .peak_pressure
                    .checked_div(self.config.release_divisor)
                    .is_some_and(|release_level| pressure <= release_level);
                if fell_from_peak || pressure < rest_level {
                    self.set_state(TouchState::Off);
                    event = Some(TouchEvent::Release { key: self.key });
                }
            }
        }

        self.last_velocity = current_velocity;
        self.last_force = current_force;
        event
    }

    /// Forgets the history and peaks and goes straight back to [TouchState::Off].
    ///
    /// Never fires a release, even if the key was sounding.
    pub fn clear(&mut self) {
        self.pressures.clear();
        self.times.clear();
        self.last_pressure = 0;
        self.last_time = None;
        self.peak_force = 0.0;
        self.peak_pressure = 0;
        self.set_state(TouchState::Off);
    }

    fn set_state(&mut self, state: TouchState) {
        if state != self.state {
            debug!("{}: {:?} -> {:?}", self.key, self.state, state);
            self.state = state;
        }
    }
}
