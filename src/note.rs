//! Note model
//!
//! Equal-tempered note identities, textual parsing, transposition and the
//! tuning reference that maps identities to frequencies. The reference
//! pitch is per-[`Tuning`] configuration, never process-wide state.

use std::fmt::Display;
use thiserror::Error;

/// MIDI-style index of A4 (`4 * 12 + 9` halftones from C0).
const A4_INDEX: i32 = 57;

const SHARP_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "h",
];
const FLAT_NAMES: [&str; 12] = [
    "c", "db", "d", "eb", "e", "f", "gb", "g", "ab", "a", "b", "h",
];

/// A malformed textual note name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid note name `{text}`")]
pub struct NoteParseError {
    /// The text that failed to parse.
    pub text: String,
}

/// An immutable equal-tempered note identity.
///
/// Stores the halftone index from C0 plus a preferred-accidental flag used
/// only for naming. Equality and ordering consider the index alone, so `c#`
/// and `db` of the same octave compare equal.
#[derive(Debug, Clone, Copy)]
pub struct Note {
    index: i32,
    prefer_sharps: bool,
}

impl Note {
    /// Note from an octave and a halftone offset from C (`0..12`).
    pub fn new(octave: i32, halftones: i32) -> Self {
        Note::from_index(octave * 12 + halftones)
    }

    /// Note from a MIDI-style halftone index, preferring sharp names.
    pub fn from_index(index: i32) -> Self {
        Note {
            index,
            prefer_sharps: true,
        }
    }

    /// Parse a name: a letter `a..h` (German `h`; `b` is its alias), an
    /// optional octave digit (default 4), then an optional accidental
    /// (`#` or `b`).
    pub fn parse(text: &str) -> Result<Self, NoteParseError> {
        let error = || NoteParseError {
            text: text.to_string(),
        };
        let lower = text.to_ascii_lowercase();
        let mut chars = lower.chars();
        let mut halftones = match chars.next() {
            Some('c') => 0,
            Some('d') => 2,
            Some('e') => 4,
            Some('f') => 5,
            Some('g') => 7,
            Some('a') => 9,
            Some('h') | Some('b') => 11,
            _ => return Err(error()),
        };
        let mut octave = 4;
        let mut prefer_sharps = true;

        let mut next = chars.next();
        if let Some(c) = next {
            if let Some(digit) = c.to_digit(10) {
                octave = digit as i32;
                next = chars.next();
            }
        }
        match next {
            None => {}
            Some('#') => halftones += 1,
            Some('b') => {
                halftones -= 1;
                prefer_sharps = false;
            }
            Some(_) => return Err(error()),
        }
        if chars.next().is_some() {
            return Err(error());
        }

        Ok(Note {
            index: octave * 12 + halftones,
            prefer_sharps,
        })
    }

    /// Inclusive ascending range of notes between two parsed names.
    pub fn range(low: Note, high: Note) -> Vec<Note> {
        (low.index..=high.index).map(Note::from_index).collect()
    }

    /// MIDI-style halftone index from C0.
    pub fn midi_number(&self) -> i32 {
        self.index
    }

    /// Octave number.
    pub fn octave(&self) -> i32 {
        self.index.div_euclid(12)
    }

    /// Halftone offset from C within the octave (`0..12`).
    pub fn halftones(&self) -> i32 {
        self.index.rem_euclid(12)
    }

    /// Whether names use sharps rather than flats.
    pub fn prefer_sharps(&self) -> bool {
        self.prefer_sharps
    }

    /// Transpose by `halftones`, returning a new note.
    pub fn add(&self, halftones: i32) -> Note {
        Note {
            index: self.index + halftones,
            prefer_sharps: self.prefer_sharps,
        }
    }

    /// Name with octave, e.g. `a4` or `c#3`.
    pub fn name(&self) -> String {
        let names = if self.prefer_sharps {
            &SHARP_NAMES
        } else {
            &FLAT_NAMES
        };
        format!("{}{}", names[self.halftones() as usize], self.octave())
    }
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Note {}

impl Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Equal-temperament tuning anchored at a configurable A4 reference.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    a4_hz: f32,
}

impl Tuning {
    /// Tuning with the given A4 reference frequency in Hz.
    pub fn new(a4_hz: f32) -> Self {
        Tuning { a4_hz }
    }

    /// The A4 reference frequency in Hz.
    pub fn a4_hz(&self) -> f32 {
        self.a4_hz
    }

    /// Fundamental frequency of a note in Hz.
    pub fn frequency(&self, note: Note) -> f32 {
        self.a4_hz * 2f32.powf((note.midi_number() - A4_INDEX) as f32 / 12.0)
    }

    /// Frequency of the `harmonic`-th partial (0 = fundamental).
    pub fn harmonic(&self, note: Note, harmonic: usize) -> f32 {
        self.frequency(note) * (harmonic + 1) as f32
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning { a4_hz: 440.0 }
    }
}

/// Logarithmic pitch distance from `freq_a` to `freq_b` in cents
/// (1200 per octave, positive when `freq_b` is higher).
pub fn interval_in_cents(freq_a: f32, freq_b: f32) -> f32 {
    1200.0 * (freq_b / freq_a).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_the_reference_frequency() {
        let tuning = Tuning::default();
        let a4 = Note::parse("a4").unwrap();
        assert!((tuning.frequency(a4) - 440.0).abs() < 1e-3);
        assert_eq!(a4.midi_number(), 57);

        let baroque = Tuning::new(415.0);
        assert!((baroque.frequency(a4) - 415.0).abs() < 1e-3);
    }

    #[test]
    fn transposing_an_octave_doubles_frequency() {
        let tuning = Tuning::default();
        let a4 = Note::parse("a4").unwrap();
        let a5 = a4.add(12);
        assert!((tuning.frequency(a5) / tuning.frequency(a4) - 2.0).abs() < 1e-5);
        // Transposition returns a new value.
        assert_eq!(a4.midi_number(), 57);
        assert_eq!(a5.name(), "a5");
    }

    #[test]
    fn one_semitone_is_one_hundred_cents() {
        let semitone = 440.0 * 2f32.powf(1.0 / 12.0);
        assert!((interval_in_cents(440.0, semitone) - 100.0).abs() < 1e-2);
        assert!((interval_in_cents(880.0, 440.0) + 1200.0).abs() < 1e-2);
    }

    #[test]
    fn parsing_accepts_the_supported_alphabet() {
        assert_eq!(Note::parse("c").unwrap().name(), "c4");
        assert_eq!(Note::parse("C3").unwrap(), Note::new(3, 0));
        assert_eq!(Note::parse("f#").unwrap().halftones(), 6);
        assert_eq!(Note::parse("a4#").unwrap().halftones(), 10);
        // German naming: h is the 11th halftone and b its alias.
        assert_eq!(Note::parse("h").unwrap().halftones(), 11);
        assert_eq!(Note::parse("b").unwrap().halftones(), 11);
        // A flat wraps below C into the previous octave.
        let cb = Note::parse("c4b").unwrap();
        assert_eq!(cb.octave(), 3);
        assert_eq!(cb.halftones(), 11);
        assert!(!cb.prefer_sharps());
    }

    #[test]
    fn parsing_rejects_malformed_names() {
        for bad in ["", "x", "c42", "c#4", "a!", "c4bb"] {
            let err = Note::parse(bad).unwrap_err();
            assert_eq!(
                err,
                NoteParseError {
                    text: bad.to_string()
                }
            );
        }
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let notes = Note::range(Note::parse("c1").unwrap(), Note::parse("c2").unwrap());
        assert_eq!(notes.len(), 13);
        assert_eq!(notes[0].name(), "c1");
        assert_eq!(notes[12].name(), "c2");
        for pair in notes.windows(2) {
            assert_eq!(pair[1].midi_number() - pair[0].midi_number(), 1);
        }
    }
}
