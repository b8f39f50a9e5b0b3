//! The module for the main app state and logic.

use log::{debug, info, warn};
use keysense_gpio::GpioResult;
use keysense_gpio::keypad::{KeyEdge, Keypad};
use keysense_gpio::touch::{PressureSample, PressureSource, TouchEvent, TouchKey};
use crate::config::Config;
use crate::notes;
use crate::recorder::{Playback, PlaybackEvent, Recorder, RecorderError, Recording};

/// A note starting or stopping, as handed to the note layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoteEvent {
    On { base_note: u8, velocity: f32 },
    Off { base_note: u8 },
}

impl NoteEvent {
    pub fn base_note(&self) -> u8 {
        match *self {
            NoteEvent::On { base_note, .. } | NoteEvent::Off { base_note } => base_note,
        }
    }
}

/// A pressure-sensed key and the note it plays.
struct TouchChannel {
    key: TouchKey,
    note: u8,
}

/// The main app state struct.
pub struct App<'a> {
    /// The configuration for the app.
    config: Config,
    /// The switch matrix. A key's position in its keymap is also its base note.
    keypad: &'a mut dyn Keypad,
    /// One classifier per pressure channel.
    touch: Vec<TouchChannel>,
    /// Where pressure readings come from, if anywhere.
    pressure: Option<&'a mut dyn PressureSource>,
    /// A reading that is not due yet.
    pending: Option<PressureSample>,
    pressure_exhausted: bool,
    recorder: Recorder,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App. Starts recording right away if enabled.
    pub fn new(
        config: Config,
        keypad: &'a mut dyn Keypad,
        pressure: Option<&'a mut dyn PressureSource>,
    ) -> App<'a> {
        let touch = config
            .touch_keys
            .iter()
            .map(|t| TouchChannel {
                key: TouchKey::new(t.channel, t.touch),
                note: t.note,
            })
            .collect();

        let mut recorder = Recorder::new();
        if config.record {
            recorder.start(0, config.patch);
        }

        App {
            config,
            keypad,
            touch,
            pressure_exhausted: pressure.is_none(),
            pressure,
            pending: None,
            recorder,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Whether the pressure source has run dry (or there never was one).
    pub fn pressure_exhausted(&self) -> bool {
        self.pressure_exhausted && self.pending.is_none()
    }

    /// Scans the keypad and feeds every pressure reading due by `now_ms`.
    ///
    /// Returns the note events that were produced, in order.
    pub fn update(&mut self, now_ms: u64) -> GpioResult<Vec<NoteEvent>> {
        let mut events = Vec::new();

        self.keypad.tick()?;
        while self.keypad.available() > 0 {
            let event = self.keypad.read()?;
            let Some(base_note) = self.keypad.keymap().iter().position(|&k| k == event.key) else {
                warn!("Key {:#04x} is not in the keymap.", event.key);
                continue;
            };
            let base_note = base_note as u8;
            events.push(match event.edge {
                KeyEdge::Pressed => NoteEvent::On {
                    base_note,
                    velocity: self.config.matrix_velocity,
                },
                KeyEdge::Released => NoteEvent::Off { base_note },
            });
        }

        while let Some(sample) = self.next_due_sample(now_ms)? {
            let Some(channel) = self.touch.iter_mut().find(|c| c.key.key() == sample.channel) else {
                debug!("No touch key on channel {}.", sample.channel);
                continue;
            };
            let note = channel.note;
            events.extend(channel.key.step(sample.pressure, sample.time_ms).map(|e| match e {
                TouchEvent::Onset { velocity, .. } => NoteEvent::On { base_note: note, velocity },
                TouchEvent::Release { .. } => NoteEvent::Off { base_note: note },
            }));
        }

        for &event in &events {
            self.dispatch(event, now_ms);
        }
        Ok(events)
    }

    fn next_due_sample(&mut self, now_ms: u64) -> GpioResult<Option<PressureSample>> {
        if self.pending.is_none() && !self.pressure_exhausted {
            if let Some(source) = self.pressure.as_mut() {
                self.pending = source.next_sample()?;
            }
            if self.pending.is_none() {
                info!("Pressure source exhausted.");
                self.pressure_exhausted = true;
            }
        }

        match self.pending {
            Some(sample) if sample.time_ms <= now_ms => Ok(self.pending.take()),
            _ => Ok(None),
        }
    }

    /// Logs the note and records it if a recording is running.
    fn dispatch(&mut self, event: NoteEvent, now_ms: u64) {
        let octave = self.config.octave;
        let name = notes::resolve(event.base_note(), octave)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "out of range".to_string());

        match event {
            NoteEvent::On { base_note, velocity } => {
                info!("Note on {} ({}), velocity {:.2}", name, base_note, velocity);
            }
            NoteEvent::Off { base_note } => {
                info!("Note off {} ({})", name, base_note);
            }
        }

        if !self.recorder.is_recording() {
            return;
        }
        let recorded = match event {
            NoteEvent::On { base_note, velocity } => {
                self.recorder.note_on(base_note, octave, velocity, now_ms)
            }
            NoteEvent::Off { base_note } => self.recorder.note_off(base_note, octave, now_ms),
        };
        match recorded {
            Ok(()) => {}
            Err(RecorderError::CapacityExceeded) => {
                warn!("Recording is full, closing it.");
                if let Err(e) = self.close_recording(now_ms) {
                    warn!("Failed to close the recording: {}", e);
                }
            }
            Err(e) => warn!("Failed to record note: {}", e),
        }
    }

    /// Stops the running recording and keeps it in slot 1.
    fn close_recording(&mut self, now_ms: u64) -> Result<(), RecorderError> {
        self.recorder.stop(now_ms)?;
        self.recorder.save_to_slot(1)
    }

    /// Ends the session: resets every key and keeps the recording in slot 1.
    ///
    /// Returns the recording in slot 1, if there is one.
    pub fn finish(&mut self, now_ms: u64) -> Result<Option<&Recording>, RecorderError> {
        self.keypad.clear();
        for channel in &mut self.touch {
            channel.key.clear();
        }

        if self.recorder.is_recording() {
            self.close_recording(now_ms)?;
        }
        Ok(self.recorder.slot(1).ok())
    }

    /// Starts playing the recording in the slot back.
    pub fn play_slot(&self, slot: usize, now_ms: u64) -> Result<Playback, RecorderError> {
        let recording = self.recorder.slot(slot)?.clone();
        Ok(Playback::new(recording, now_ms))
    }

    /// Logs every playback event due by `now_ms`.
    pub fn update_playback(&self, playback: &mut Playback, now_ms: u64) {
        for event in playback.due(now_ms) {
            match event {
                PlaybackEvent::NoteOn { base_note, octave, velocity } => {
                    if let Some(note) = notes::resolve(base_note, octave) {
                        info!("Playback: note on {}, velocity {:.2}", note, velocity);
                    }
                }
                PlaybackEvent::NoteOff { base_note, octave } => {
                    if let Some(note) = notes::resolve(base_note, octave) {
                        info!("Playback: note off {}", note);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use keysense_gpio::keypad::MatrixKeypad;
    use keysense_gpio::soft::SoftLineBus;
    use keysense_gpio::touch::TouchConfig;
    use crate::config::TouchKeyConfig;
    use crate::recorder::MAX_NOTES;
    use crate::replay::ReplaySource;

    const ROWS: [u32; 2] = [0, 1];
    const COLS: [u32; 2] = [10, 11];

    fn config() -> Config {
        Config {
            keymap: "abcd".chars().collect(),
            touch_keys: vec![TouchKeyConfig {
                channel: 3,
                note: 9,
                touch: TouchConfig::default()
                    .with_baseline(2)
                    .with_sensitivity(50.0)
                    .with_play_threshold(0.7),
            }],
            ..Config::default()
        }
    }

    fn keypad(bus: &SoftLineBus) -> MatrixKeypad<'_> {
        let mut keypad = MatrixKeypad::new(bus, b"abcd".to_vec(), ROWS.to_vec(), COLS.to_vec())
            .unwrap()
            .with_settling_delay(Duration::ZERO);
        keypad.begin().unwrap();
        keypad
    }

    fn replay(pressures: &[u8], spacing_ms: u64) -> String {
        pressures
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{{\"channel\": 3, \"pressure\": {}, \"time_ms\": {}}}\n", p, i as u64 * spacing_ms))
            .collect()
    }

    #[test]
    fn matrix_keys_play_their_position() {
        let bus = SoftLineBus::new();
        let mut keypad = keypad(&bus);
        let mut app = App::new(config(), &mut keypad, None);

        bus.press(ROWS[1], COLS[0]);
        assert_eq!(
            app.update(0).unwrap(),
            vec![NoteEvent::On { base_note: 2, velocity: 10.0 }]
        );
        bus.release_all();
        assert_eq!(app.update(5).unwrap(), vec![NoteEvent::Off { base_note: 2 }]);
        assert!(app.pressure_exhausted());
    }

    #[test]
    fn touch_samples_are_fed_when_due() {
        let bus = SoftLineBus::new();
        let mut keypad = keypad(&bus);
        let input = replay(&[0, 0, 5, 12, 18, 15, 10, 6, 3, 1, 0], 5);
        let mut source = ReplaySource::new(input.as_bytes());
        let mut app = App::new(config(), &mut keypad, Some(&mut source));

        assert!(app.update(24).unwrap().is_empty());
        assert_eq!(
            app.update(25).unwrap(),
            vec![NoteEvent::On { base_note: 9, velocity: 20.0 }]
        );
        assert_eq!(app.update(100).unwrap(), vec![NoteEvent::Off { base_note: 9 }]);
        assert!(app.pressure_exhausted());
    }

    #[test]
    fn finish_keeps_the_recording() {
        let bus = SoftLineBus::new();
        let mut keypad = keypad(&bus);
        let input = replay(&[5, 12, 18, 15, 10, 3], 5);
        let mut source = ReplaySource::new(input.as_bytes());
        let mut app = App::new(config(), &mut keypad, Some(&mut source));

        bus.press(ROWS[0], COLS[1]);
        app.update(0).unwrap();
        app.update(100).unwrap();
        let recording = app.finish(200).unwrap().unwrap();

        assert_eq!(recording.notes().len(), 2);
        assert_eq!(recording.notes()[0].base_note, 1);
        assert_eq!(recording.notes()[1].base_note, 9);
        assert!(recording.notes().iter().all(|n| n.complete));

        let mut playback = app.play_slot(1, 1_000).unwrap();
        app.update_playback(&mut playback, 1_500);
        assert!(playback.is_finished());
    }

    #[test]
    fn full_recording_is_closed_and_saved() {
        let bus = SoftLineBus::new();
        let mut keypad = keypad(&bus);
        let config = Config { patch: 3, ..config() };
        let mut app = App::new(config, &mut keypad, None);

        let mut now = 0;
        for _ in 0..MAX_NOTES + 20 {
            bus.press(ROWS[0], COLS[0]);
            app.update(now).unwrap();
            bus.release_all();
            app.update(now + 1).unwrap();
            now += 2;
        }

        assert!(!app.recorder().is_recording());
        let saved = app.recorder().slot(1).unwrap();
        assert_eq!(saved.notes().len(), MAX_NOTES);
        assert!(saved.is_complete());
        assert_eq!(saved.patch(), 3);

        let recording = app.finish(now).unwrap().unwrap();
        assert_eq!(recording.notes().len(), MAX_NOTES);
    }

    #[test]
    fn nothing_is_recorded_when_disabled() {
        let bus = SoftLineBus::new();
        let mut keypad = keypad(&bus);
        let config = Config { record: false, ..config() };
        let mut app = App::new(config, &mut keypad, None);

        bus.press(ROWS[0], COLS[0]);
        app.update(0).unwrap();

        assert!(!app.recorder().is_recording());
        assert_eq!(app.finish(10), Ok(None));
        assert_eq!(app.play_slot(1, 0).err(), Some(RecorderError::EmptySlot(1)));
    }
}
