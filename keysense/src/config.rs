use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use log::warn;
use serde::{Serialize, Deserialize};
use keysense_gpio::touch::TouchConfig;

/// One pressure-sensed key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TouchKeyConfig {
    /// Sensor channel the pressure readings arrive on.
    pub channel: u8,
    /// Semitones above C within the configured octave.
    pub note: u8,
    #[serde(flatten)]
    pub touch: TouchConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Key identifiers of the matrix, row by row.
    pub keymap: Vec<char>,
    pub settling_delay_us: u64,
    /// Event queue size in bytes.
    pub queue_capacity: usize,
    pub octave: u8,
    /// Velocity given to notes played on the switch matrix.
    pub matrix_velocity: f32,
    pub touch_keys: Vec<TouchKeyConfig>,
    /// Instrument patch stored with new recordings.
    pub patch: u8,
    /// Records everything played and keeps it in slot 1 when the session ends.
    pub record: bool,
}

impl Config {
    fn path() -> std::ffi::OsString {
        var_os("CONFIG_FILE").unwrap_or_else(|| OsStr::new("config.json").to_owned())
    }

    pub fn try_load() -> Option<Self> {
        let config_str = Self::path();
        let config_path = Path::new(&config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            match serde_json::from_reader(reader) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Config {:?} is invalid: {}", config_path, e);
                    None
                }
            }
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = Self::path();
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// The keymap as the byte identifiers the scan driver works with.
    ///
    /// # Errors
    /// If a key is not a single-byte character.
    pub fn keymap_bytes(&self) -> eyre::Result<Vec<u8>> {
        self.keymap
            .iter()
            .map(|&c| u8::try_from(c).map_err(|_| eyre::eyre!("Key {:?} is not a single byte", c)))
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keymap: "123A456B789C*0#D".chars().collect(),
            settling_delay_us: 20,
            queue_capacity: 256,
            octave: 4,
            matrix_velocity: 10.0,
            touch_keys: (0..4)
                .map(|channel| TouchKeyConfig {
                    channel,
                    note: channel * 2,
                    touch: TouchConfig::default().with_baseline(2).with_sensitivity(50.0),
                })
                .collect(),
            patch: 0,
            record: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{
            "octave": 3,
            "touch_keys": [{ "channel": 1, "note": 4, "baseline": 7 }]
        }"#).unwrap();

        assert_eq!(config.octave, 3);
        assert_eq!(config.keymap, Config::default().keymap);
        assert_eq!(config.touch_keys.len(), 1);
        assert_eq!(config.touch_keys[0].touch.baseline, 7);
        assert_eq!(config.touch_keys[0].touch.release_divisor, 4);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);
    }

    #[test]
    fn keymap_must_be_bytes() {
        let mut config = Config::default();
        assert_eq!(config.keymap_bytes().unwrap()[0], b'1');
        config.keymap.push('€');
        assert!(config.keymap_bytes().is_err());
    }
}
