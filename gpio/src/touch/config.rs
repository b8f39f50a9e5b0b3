use serde::{Deserialize, Serialize};

/// Calibration and thresholds for one pressure-sensed key.
///
/// Every field has a default, so a config file only needs to list what it changes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Scales the pressure slope into a velocity.
    pub sensitivity: f32,
    /// Readings below this are noise and never enter the history.
    pub baseline: u8,
    /// Logs every sample that rises above the rest band.
    pub debug: bool,
    /// Upper bound for the velocity reported with an onset.
    pub max_force: f32,
    /// Force that has to be exceeded to start an attack.
    pub play_threshold: f32,
    /// Width of the rest band above the baseline.
    pub hysteresis_margin: u8,
    /// The key releases once pressure falls to `peak_pressure / release_divisor`.
    pub release_divisor: u8,
}

impl TouchConfig {
    /// Upper edge of the rest band, `baseline + hysteresis_margin`.
    pub fn rest_level(&self) -> u8 {
        self.baseline.saturating_add(self.hysteresis_margin)
    }

    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_baseline(mut self, baseline: u8) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_play_threshold(mut self, play_threshold: f32) -> Self {
        self.play_threshold = play_threshold;
        self
    }

    pub fn with_max_force(mut self, max_force: f32) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_hysteresis_margin(mut self, hysteresis_margin: u8) -> Self {
        self.hysteresis_margin = hysteresis_margin;
        self
    }

    /// A divisor of zero turns the peak ratio release off, leaving only the rest band.
    pub fn with_release_divisor(mut self, release_divisor: u8) -> Self {
        self.release_divisor = release_divisor;
        self
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        TouchConfig {
            sensitivity: 1.0,
            baseline: 0,
            debug: false,
            max_force: 20.0,
            play_threshold: 0.3,
            hysteresis_margin: 2,
            release_divisor: 4,
        }
    }
}
