//! The recording store: captures played notes and keeps a few recordings in numbered slots.

use log::{debug, info, warn};
use thiserror::Error;
use time::Duration;
use crate::utils::WithinExt;

/// Most notes a single recording can hold.
pub const MAX_NOTES: usize = 1024;
/// Number of save slots, numbered from 1.
pub const NUM_SLOTS: usize = 3;
/// Most notes a playback sounds at once.
pub const SAMPLE_VOICES: usize = 6;

#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum RecorderError {
    #[error("recording is full")]
    CapacityExceeded,
    #[error("slot {0} does not exist")]
    SlotOutOfRange(usize),
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    #[error("nothing has been recorded")]
    NothingRecorded,
    #[error("not recording")]
    NotRecording,
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// A single note within a [Recording].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RecordedNote {
    /// Offset from the start of the recording.
    pub start: Duration,
    pub duration: Duration,
    pub velocity: f32,
    pub base_note: u8,
    pub octave: u8,
    /// Whether the note has been released yet.
    pub complete: bool,
}

impl RecordedNote {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    fn is_pitch(&self, base_note: u8, octave: u8) -> bool {
        self.base_note == base_note && self.octave == octave
    }
}

/// A sequence of notes in the order they were played.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recording {
    started_ms: u64,
    length: Duration,
    /// Instrument patch the notes were played with.
    patch: u8,
    notes: Vec<RecordedNote>,
    complete: bool,
}

impl Recording {
    fn new(started_ms: u64, patch: u8) -> Self {
        Recording {
            started_ms,
            patch,
            ..Default::default()
        }
    }

    pub fn notes(&self) -> &[RecordedNote] {
        &self.notes
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn patch(&self) -> u8 {
        self.patch
    }

    /// Whether recording has been stopped.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn offset(&self, now_ms: u64) -> Duration {
        Duration::milliseconds(now_ms.saturating_sub(self.started_ms) as i64)
    }
}

/// Captures notes into the current recording and manages the save slots.
#[derive(Debug, Default)]
pub struct Recorder {
    current: Option<Recording>,
    slots: [Option<Recording>; NUM_SLOTS],
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.current.as_ref().is_some_and(|r| !r.complete)
    }

    /// The recording in progress, or the last one stopped.
    pub fn current(&self) -> Option<&Recording> {
        self.current.as_ref()
    }

    /// Starts a new recording, discarding the previous one unless it was saved.
    pub fn start(&mut self, now_ms: u64, patch: u8) {
        if self.is_recording() {
            warn!("Already recording, restarting.");
        }
        self.current = Some(Recording::new(now_ms, patch));
        info!("Recording started with patch {}.", patch);
    }

    fn recording_mut(&mut self) -> RecorderResult<&mut Recording> {
        match &mut self.current {
            Some(recording) if !recording.complete => Ok(recording),
            _ => Err(RecorderError::NotRecording),
        }
    }

    /// Records the start of a note.
    ///
    /// # Errors
    /// - `RecorderError::NotRecording` if no recording is in progress.
    /// - `RecorderError::CapacityExceeded` if the recording already holds [MAX_NOTES] notes.
    pub fn note_on(&mut self, base_note: u8, octave: u8, velocity: f32, now_ms: u64) -> RecorderResult<()> {
        let recording = self.recording_mut()?;
        if recording.notes.len() >= MAX_NOTES {
            return Err(RecorderError::CapacityExceeded);
        }
        let start = recording.offset(now_ms);
        recording.notes.push(RecordedNote {
            start,
            duration: Duration::ZERO,
            velocity,
            base_note,
            octave,
            complete: false,
        });
        Ok(())
    }

    /// Records the end of the oldest open note with the same pitch.
    ///
    /// A release without a matching open note is ignored.
    pub fn note_off(&mut self, base_note: u8, octave: u8, now_ms: u64) -> RecorderResult<()> {
        let recording = self.recording_mut()?;
        let offset = recording.offset(now_ms);
        match recording
            .notes
            .iter_mut()
            .find(|n| !n.complete && n.is_pitch(base_note, octave))
        {
            Some(note) => {
                note.duration = offset - note.start;
                note.complete = true;
            }
            None => debug!("No open note {} in octave {} to release.", base_note, octave),
        }
        Ok(())
    }

    /// Stops recording. Notes still held end at the stop time.
    pub fn stop(&mut self, now_ms: u64) -> RecorderResult<&Recording> {
        let recording = self.recording_mut()?;
        let length = recording.offset(now_ms);
        for note in recording.notes.iter_mut().filter(|n| !n.complete) {
            note.duration = length - note.start;
            note.complete = true;
        }
        recording.length = length;
        recording.complete = true;
        info!("Recording stopped: {} notes over {} ms.", recording.notes.len(), length.whole_milliseconds());
        Ok(&*recording)
    }

    fn check_slot(slot: usize) -> RecorderResult<usize> {
        if !slot.within(1..=NUM_SLOTS) {
            return Err(RecorderError::SlotOutOfRange(slot));
        }
        Ok(slot - 1)
    }

    /// Copies the last stopped recording into the slot (numbered from 1).
    pub fn save_to_slot(&mut self, slot: usize) -> RecorderResult<()> {
        let index = Self::check_slot(slot)?;
        let recording = match &self.current {
            Some(recording) if recording.complete => recording.clone(),
            _ => return Err(RecorderError::NothingRecorded),
        };
        self.slots[index] = Some(recording);
        info!("Recording saved to slot {}.", slot);
        Ok(())
    }

    /// Gets the recording saved in the slot (numbered from 1).
    pub fn slot(&self, slot: usize) -> RecorderResult<&Recording> {
        let index = Self::check_slot(slot)?;
        self.slots[index].as_ref().ok_or(RecorderError::EmptySlot(slot))
    }
}

/// An event produced while playing a recording back.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    NoteOn { base_note: u8, octave: u8, velocity: f32 },
    NoteOff { base_note: u8, octave: u8 },
}

/// Plays a recording back against a clock, at most [SAMPLE_VOICES] notes at a time.
#[derive(Clone, Debug)]
pub struct Playback {
    recording: Recording,
    started_ms: u64,
    next: usize,
    /// Indices of the notes currently sounding.
    sounding: Vec<usize>,
}

impl Playback {
    pub fn new(recording: Recording, started_ms: u64) -> Self {
        Playback {
            recording,
            started_ms,
            next: 0,
            sounding: Vec::with_capacity(SAMPLE_VOICES),
        }
    }

    /// The patch the recording was made with.
    pub fn patch(&self) -> u8 {
        self.recording.patch
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.recording.notes.len() && self.sounding.is_empty()
    }

    /// Gets every event due up to `now_ms`, in time order. Releases win ties.
    pub fn due(&mut self, now_ms: u64) -> Vec<PlaybackEvent> {
        let elapsed = Duration::milliseconds(now_ms.saturating_sub(self.started_ms) as i64);
        let notes = &self.recording.notes;
        let mut events = Vec::new();

        loop {
            let next_off = self
                .sounding
                .iter()
                .enumerate()
                .map(|(i, &n)| (i, notes[n].end()))
                .filter(|&(_, end)| end <= elapsed)
                .min_by_key(|&(_, end)| end);
            let next_on = notes
                .get(self.next)
                .map(|n| n.start)
                .filter(|&start| start <= elapsed);

            match (next_off, next_on) {
                (Some((i, end)), on) if on.is_none_or(|start| end <= start) => {
                    let note = notes[self.sounding.swap_remove(i)];
                    events.push(PlaybackEvent::NoteOff {
                        base_note: note.base_note,
                        octave: note.octave,
                    });
                }
                (_, Some(_)) => {
                    let note = notes[self.next];
                    if self.sounding.len() < SAMPLE_VOICES {
                        self.sounding.push(self.next);
                        events.push(PlaybackEvent::NoteOn {
                            base_note: note.base_note,
                            octave: note.octave,
                            velocity: note.velocity,
                        });
                    } else {
                        debug!("All {} voices busy, skipping note {}.", SAMPLE_VOICES, note.base_note);
                    }
                    self.next += 1;
                }
                _ => break,
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(notes: &[(u8, u64, u64)]) -> Recording {
        let mut recorder = Recorder::new();
        recorder.start(1_000, 0);
        let mut edges: Vec<(u64, bool, u8)> = Vec::new();
        for &(base, on, off) in notes {
            edges.push((on, true, base));
            edges.push((off, false, base));
        }
        edges.sort_by_key(|&(t, on, _)| (t, on));
        for (t, on, base) in edges {
            if on {
                recorder.note_on(base, 4, 1.0, 1_000 + t).unwrap();
            } else {
                recorder.note_off(base, 4, 1_000 + t).unwrap();
            }
        }
        let end = notes.iter().map(|&(_, _, off)| off).max().unwrap_or(0);
        recorder.stop(1_000 + end).unwrap().clone()
    }

    #[test]
    fn records_note_timing() {
        let mut recorder = Recorder::new();
        assert!(!recorder.is_recording());
        recorder.start(500, 0);
        recorder.note_on(4, 3, 12.5, 600).unwrap();
        recorder.note_off(4, 3, 850).unwrap();
        let recording = recorder.stop(1_000).unwrap();

        assert_eq!(recording.length(), Duration::milliseconds(500));
        assert_eq!(
            recording.notes(),
            &[RecordedNote {
                start: Duration::milliseconds(100),
                duration: Duration::milliseconds(250),
                velocity: 12.5,
                base_note: 4,
                octave: 3,
                complete: true,
            }]
        );
        assert!(!recorder.is_recording());
    }

    #[test]
    fn patch_follows_the_recording_into_slots() {
        let mut recorder = Recorder::new();
        recorder.start(0, 5);
        recorder.note_on(1, 4, 1.0, 10).unwrap();
        assert_eq!(recorder.stop(20).unwrap().patch(), 5);
        recorder.save_to_slot(2).unwrap();

        recorder.start(30, 7);
        assert_eq!(recorder.current().map(Recording::patch), Some(7));

        let saved = recorder.slot(2).unwrap().clone();
        assert_eq!(saved.patch(), 5);
        assert_eq!(Playback::new(saved, 0).patch(), 5);
    }

    #[test]
    fn stop_closes_held_notes() {
        let mut recorder = Recorder::new();
        recorder.start(0, 0);
        recorder.note_on(1, 4, 1.0, 10).unwrap();
        let recording = recorder.stop(70).unwrap();
        assert_eq!(recording.notes()[0].duration, Duration::milliseconds(60));
        assert!(recording.notes()[0].complete);
    }

    #[test]
    fn notes_require_a_recording() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.note_on(1, 4, 1.0, 0), Err(RecorderError::NotRecording));
        assert_eq!(recorder.stop(0).err(), Some(RecorderError::NotRecording));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut recorder = Recorder::new();
        recorder.start(0, 0);
        for i in 0..MAX_NOTES {
            recorder.note_on(0, 4, 1.0, i as u64).unwrap();
        }
        assert_eq!(recorder.note_on(0, 4, 1.0, 5_000), Err(RecorderError::CapacityExceeded));
        assert_eq!(recorder.current().map(|r| r.notes().len()), Some(MAX_NOTES));
    }

    #[test]
    fn slots_hold_independent_copies() {
        let mut recorder = Recorder::new();
        assert_eq!(recorder.save_to_slot(1), Err(RecorderError::NothingRecorded));

        recorder.start(0, 0);
        recorder.note_on(2, 4, 3.0, 5).unwrap();
        assert_eq!(recorder.save_to_slot(1), Err(RecorderError::NothingRecorded));
        recorder.stop(10).unwrap();
        recorder.save_to_slot(1).unwrap();

        recorder.start(20, 0);
        recorder.note_on(7, 4, 3.0, 25).unwrap();
        recorder.stop(30).unwrap();

        let saved = recorder.slot(1).unwrap();
        assert_eq!(saved.notes().len(), 1);
        assert_eq!(saved.notes()[0].base_note, 2);
        assert_eq!(recorder.slot(2).err(), Some(RecorderError::EmptySlot(2)));
    }

    #[test]
    fn slot_numbers_are_checked() {
        let mut recorder = Recorder::new();
        recorder.start(0, 0);
        recorder.stop(1).unwrap();
        assert_eq!(recorder.save_to_slot(0), Err(RecorderError::SlotOutOfRange(0)));
        assert_eq!(recorder.save_to_slot(NUM_SLOTS + 1), Err(RecorderError::SlotOutOfRange(4)));
        assert!(recorder.save_to_slot(NUM_SLOTS).is_ok());
    }

    #[test]
    fn playback_emits_events_in_time_order() {
        let recording = recorded(&[(0, 0, 100), (4, 50, 150)]);
        let mut playback = Playback::new(recording, 10_000);

        assert_eq!(
            playback.due(10_000),
            vec![PlaybackEvent::NoteOn { base_note: 0, octave: 4, velocity: 1.0 }]
        );
        assert!(playback.due(10_049).is_empty());
        assert_eq!(
            playback.due(10_120),
            vec![
                PlaybackEvent::NoteOn { base_note: 4, octave: 4, velocity: 1.0 },
                PlaybackEvent::NoteOff { base_note: 0, octave: 4 },
            ]
        );
        assert!(!playback.is_finished());
        assert_eq!(playback.due(20_000), vec![PlaybackEvent::NoteOff { base_note: 4, octave: 4 }]);
        assert!(playback.is_finished());
    }

    #[test]
    fn short_notes_start_and_stop_within_one_poll() {
        let recording = recorded(&[(9, 10, 20)]);
        let mut playback = Playback::new(recording, 0);
        assert_eq!(
            playback.due(100),
            vec![
                PlaybackEvent::NoteOn { base_note: 9, octave: 4, velocity: 1.0 },
                PlaybackEvent::NoteOff { base_note: 9, octave: 4 },
            ]
        );
    }

    #[test]
    fn playback_is_limited_to_sample_voices() {
        let chord: Vec<_> = (0..8).map(|n| (n, 0, 100)).collect();
        let mut playback = Playback::new(recorded(&chord), 0);

        let ons = playback
            .due(50)
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::NoteOn { .. }))
            .count();
        assert_eq!(ons, SAMPLE_VOICES);
        assert_eq!(playback.due(100).len(), SAMPLE_VOICES);
        assert!(playback.is_finished());
    }
}
