//! # Note Frequency Table
//!
//! Equal-tempered note names C0 through B8 with A4 = 440 Hz. Every black key is
//! listed under both its sharp and its flat spelling ("C#4" and "Db4"), and the
//! two spellings map to the same frequency.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// Lowest and highest octave numbers in the table.
pub const FIRST_OCTAVE: i32 = 0;
pub const LAST_OCTAVE: i32 = 8;

/// A single named pitch.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3", "Bb2")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Spellings within one octave and their semitone offset above C.
const SPELLINGS: [(&str, i32); 17] = [
    ("C", 0),
    ("C#", 1),
    ("Db", 1),
    ("D", 2),
    ("D#", 3),
    ("Eb", 3),
    ("E", 4),
    ("F", 5),
    ("F#", 6),
    ("Gb", 6),
    ("G", 7),
    ("G#", 8),
    ("Ab", 8),
    ("A", 9),
    ("A#", 10),
    ("Bb", 10),
    ("B", 11),
];

/// Every spelling of every note from C0 to B8, in ascending pitch order.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    let octaves = (LAST_OCTAVE - FIRST_OCTAVE + 1) as usize;
    let mut notes = Vec::with_capacity(octaves * SPELLINGS.len());

    for octave in FIRST_OCTAVE..=LAST_OCTAVE {
        for (spelling, semitone) in SPELLINGS {
            // MIDI numbering puts C-1 at 0, so A4 lands on 69.
            let midi = 12 * (octave + 1) + semitone;
            let frequency = A4_FREQUENCY * 2.0_f32.powf((midi - 69) as f32 / 12.0);
            notes.push(Note {
                name: format!("{spelling}{octave}"),
                frequency,
            });
        }
    }
    notes
});

static NOTE_MAP: Lazy<BTreeMap<&'static str, f32>> = Lazy::new(|| {
    NOTES
        .iter()
        .map(|note| (note.name.as_str(), note.frequency))
        .collect()
});

/// All notes in the table, lowest first.
pub fn all_notes() -> &'static [Note] {
    &NOTES
}

/// Looks up the frequency in Hz for a note name such as `"A4"` or `"Db3"`.
///
/// Returns `None` when the name is not in the table (e.g. `"H4"` or `"C9"`).
pub fn frequency_of(name: &str) -> Option<f32> {
    NOTE_MAP.get(name).copied()
}

/// Finds the closest note to a given frequency.
///
/// Enharmonic spellings tie; the sharp spelling is returned because it comes
/// first in the table.
pub fn find_nearest_note(freq: f32) -> Option<&'static Note> {
    NOTES.iter().min_by(|a, b| {
        let diff_a = (a.frequency - freq).abs();
        let diff_b = (b.frequency - freq).abs();
        diff_a.total_cmp(&diff_b)
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat; 100 cents is a semitone.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
