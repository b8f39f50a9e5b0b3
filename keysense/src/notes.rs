//! Mapping from key positions to musical notes.

use keysense_music_proc_macro::music_notes;

music_notes!();

pub const NOTES_PER_OCTAVE: u8 = 12;

/// Shifts a base note (semitones above C) into the given octave.
pub fn note_from_octave(base_note: u8, octave: u8) -> u16 {
    base_note as u16 + NOTES_PER_OCTAVE as u16 * octave as u16
}

/// Resolves a base note in an octave to a [MusicalNote], if it falls within C0..B8.
pub fn resolve(base_note: u8, octave: u8) -> Option<MusicalNote> {
    u8::try_from(note_from_octave(base_note, octave))
        .ok()
        .and_then(MusicalNote::from_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keysense_music_proc_macro::note;

    #[test]
    fn octave_offsets_by_twelve() {
        assert_eq!(note_from_octave(0, 0), 0);
        assert_eq!(note_from_octave(4, 3), 40);
    }

    #[test]
    fn resolves_named_notes() {
        assert_eq!(resolve(0, 4), Some(note!("C4")));
        assert_eq!(resolve(1, 4), Some(note!("C#4")));
        assert_eq!(resolve(13, 3), Some(note!("C#4")));
        assert_eq!(note!("C4").midi_number(), 60);
        assert_eq!(MusicalNote::from_midi_number(69), Some(note!("A4")));
        assert!((note!("A4").as_freq_hz() - 440.0).abs() < 1e-9);
        assert_eq!(note!("D#5").to_string(), "D#5");
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(resolve(11, 8), Some(note!("B8")));
        assert_eq!(resolve(12, 8), None);
        assert_eq!(resolve(200, 9), None);
        assert_eq!(MusicalNote::from_midi_number(11), None);
    }
}
