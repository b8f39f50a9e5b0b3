mod app;
mod config;
mod notes;
mod recorder;
mod replay;
mod utils;

use std::env::var;
use std::fs::File;
use std::io::BufReader;
use std::thread;
use std::time::{Duration, Instant};
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;
use keysense_gpio::LineBus;
use keysense_gpio::gpiod::GpiodLineBus;
use keysense_gpio::keypad::MatrixKeypad;
use keysense_gpio::soft::SoftLineBus;
use keysense_gpio::touch::PressureSource;
use crate::app::App;
use crate::config::Config;
use crate::replay::ReplaySource;
use crate::utils::parse_line_list;

/// How long the main loop sleeps between updates.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Whether anything can produce notes: a real matrix or recorded pressure readings.
fn has_input(chip_path: Option<&str>, pressure_path: Option<&str>) -> bool {
    chip_path.is_some() || pressure_path.is_some()
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("KeySense starting...");
    info!(
        "Running on {} (kernel {})",
        System::name().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );

    // Get line numbers from env
    let row_lines = parse_line_list(&var("KEYSENSE_MATRIX_LINES_ROWS")?)?;
    let col_lines = parse_line_list(&var("KEYSENSE_MATRIX_LINES_COLS")?)?;
    info!("Matrix @ Rows: {:?}, Cols: {:?}", row_lines, col_lines);

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };

    for key in &config.touch_keys {
        if notes::resolve(key.note, config.octave).is_none() {
            warn!("Touch key on channel {} plays note {} which is out of range in octave {}.",
                key.channel, key.note, config.octave);
        }
    }

    let chip_path = var("KEYSENSE_GPIO_CHIP").ok();
    let pressure_path = var("KEYSENSE_PRESSURE_FILE").ok();
    if !has_input(chip_path.as_deref(), pressure_path.as_deref()) {
        warn!("Neither KEYSENSE_GPIO_CHIP nor KEYSENSE_PRESSURE_FILE is set, there is nothing to play.");
        return Ok(());
    }

    debug!("Initializing line bus...");
    let gpiod_bus;
    let soft_bus;
    let bus: &dyn LineBus = match &chip_path {
        Some(path) => {
            gpiod_bus = GpiodLineBus::open(path)?;
            &gpiod_bus
        }
        None => {
            warn!("KEYSENSE_GPIO_CHIP not set, using a simulated matrix.");
            soft_bus = SoftLineBus::new();
            &soft_bus
        }
    };
    debug!("{:?} initialized.", bus);

    debug!("Initializing keypad driver...");
    let keymap = config.keymap_bytes()?;
    let mut keypad = MatrixKeypad::new(bus, keymap, row_lines, col_lines)?
        .with_settling_delay(Duration::from_micros(config.settling_delay_us))
        .with_queue_capacity(config.queue_capacity);
    keypad.begin()?;

    let mut replay = match pressure_path {
        Some(path) => {
            info!("Replaying pressure readings from {}.", path);
            Some(ReplaySource::new(BufReader::new(File::open(path)?)))
        }
        None => None,
    };
    let has_pressure = replay.is_some();
    let pressure = replay.as_mut().map(|r| r as &mut dyn PressureSource);

    info!("KeySense initialized.");

    info!("Starting main loop...");

    let start = Instant::now();
    let now_ms = || start.elapsed().as_millis() as u64;
    let mut app = App::new(config, &mut keypad, pressure);

    loop {
        app.update(now_ms())?;
        if has_pressure && app.pressure_exhausted() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    if let Some(recording) = app.finish(now_ms())? {
        info!("Recorded {} notes over {} ms with patch {}, playing back.",
            recording.notes().len(), recording.length().whole_milliseconds(), recording.patch());

        let mut playback = app.play_slot(1, now_ms())?;
        while !playback.is_finished() {
            app.update_playback(&mut playback, now_ms());
            thread::sleep(POLL_INTERVAL);
        }
    }

    info!("KeySense stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_matrix_alone_is_not_an_input() {
        assert!(!has_input(None, None));
        assert!(has_input(Some("/dev/gpiochip0"), None));
        assert!(has_input(None, Some("pressure.jsonl")));
    }
}
