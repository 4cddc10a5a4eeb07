//! Note Finder
//!
//! Harmonic-template matching: scores every candidate note against the
//! frame's filtered peak list and keeps the best-supported one.

use crate::note::{interval_in_cents, Note, Tuning};

/// A peak located by closest-in-cents binary search.
#[derive(Debug, Clone, Copy)]
struct ClosestPeak {
    index: usize,
    frequency: f32,
    cents: f32,
}

/// Binary search `peaks[from..to)` (ascending frequencies) for the peak
/// with the smallest absolute cents interval to `frequency`.
fn find_closest_peak(peaks: &[f32], frequency: f32, from: usize, to: usize) -> Option<ClosestPeak> {
    let mut best: Option<(usize, f32)> = None;
    let (mut a, mut b) = (from, to);
    while b > a {
        let mid = (a + b) / 2;
        let diff = interval_in_cents(frequency, peaks[mid]);
        let closer = match best {
            Some((_, dist)) => diff.abs() < dist.abs(),
            None => true,
        };
        if closer {
            best = Some((mid, diff));
        }
        if diff < 0.0 {
            a = mid + 1;
        } else {
            b = mid;
        }
    }
    best.map(|(index, cents)| ClosestPeak {
        index,
        frequency: peaks[index],
        cents,
    })
}

/// The best-matching note for a frame, with the mean signed cents
/// deviation over its matched harmonics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatch {
    /// The matched note.
    pub note: Note,
    /// Mean cents deviation across matched harmonics (positive = sharp).
    pub avg_cents: f32,
    /// Match score: `harmonics + 1.5 * clean adjacent pairs`.
    pub score: f32,
}

/// Harmonic-template best-match search.
///
/// For each candidate note, the fundamental and its overtones are looked up
/// in the peak list (within 50 cents). Notes with too few matched harmonics,
/// or too few adjacent harmonic pairs free of intervening peaks, are
/// rejected; a stray peak near the midpoint of a pair suggests the match is
/// coincidental rather than a true harmonic series.
pub struct NoteFinder {
    harmonics_to_check: usize,
    min_harmonics: usize,
    min_adjacent_harmonics: usize,
    max_harmonic_cents: f32,
    max_midpoint_cents: f32,
}

impl NoteFinder {
    /// Matcher with the reference thresholds: 7 harmonics checked, at least
    /// 4 matched, at least 3 clean adjacent pairs.
    pub fn new() -> Self {
        NoteFinder::with_thresholds(7, 4, 3)
    }

    /// Matcher with custom harmonic-count thresholds.
    pub fn with_thresholds(
        harmonics_to_check: usize,
        min_harmonics: usize,
        min_adjacent_harmonics: usize,
    ) -> Self {
        NoteFinder {
            harmonics_to_check,
            min_harmonics,
            min_adjacent_harmonics,
            max_harmonic_cents: 50.0,
            max_midpoint_cents: 20.0,
        }
    }

    /// Find the best-scoring note over `notes` given the frame's ascending
    /// peak frequencies. Ties keep the first note found.
    pub fn find_best(&self, peaks: &[f32], notes: &[Note], tuning: &Tuning) -> Option<NoteMatch> {
        if peaks.is_empty() {
            return None;
        }
        let mut best: Option<NoteMatch> = None;
        let mut best_score = 0.0f32;
        let mut harmonic_peaks: Vec<Option<ClosestPeak>> = vec![None; self.harmonics_to_check];

        for &note in notes {
            harmonic_peaks.fill(None);
            let mut matched = 0usize;
            for (h, slot) in harmonic_peaks.iter_mut().enumerate() {
                let target = tuning.harmonic(note, h);
                if let Some(peak) = find_closest_peak(peaks, target, 0, peaks.len()) {
                    if peak.cents.abs() < self.max_harmonic_cents {
                        *slot = Some(peak);
                        matched += 1;
                    }
                }
            }
            if matched < self.min_harmonics {
                continue;
            }

            let mut clean_pairs = 0usize;
            for pair in harmonic_peaks.windows(2) {
                let (lower, upper) = match (pair[0], pair[1]) {
                    (Some(lower), Some(upper)) => (lower, upper),
                    _ => continue,
                };
                // Only peaks strictly between the pair can disqualify it.
                let midpoint = (lower.frequency + upper.frequency) / 2.0;
                let between =
                    find_closest_peak(peaks, midpoint, lower.index + 1, upper.index);
                if let Some(stray) = between {
                    if stray.cents.abs() < self.max_midpoint_cents {
                        continue;
                    }
                }
                clean_pairs += 1;
            }
            if clean_pairs < self.min_adjacent_harmonics {
                continue;
            }

            let score = matched as f32 + 1.5 * clean_pairs as f32;
            if score > best_score {
                let cents_sum: f32 = harmonic_peaks
                    .iter()
                    .flatten()
                    .map(|peak| peak.cents)
                    .sum();
                best_score = score;
                best = Some(NoteMatch {
                    note,
                    avg_cents: cents_sum / matched as f32,
                    score,
                });
            }
        }
        best
    }
}

impl Default for NoteFinder {
    fn default() -> Self {
        NoteFinder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_range(low: &str, high: &str) -> Vec<Note> {
        Note::range(Note::parse(low).unwrap(), Note::parse(high).unwrap())
    }

    fn harmonics_of(frequency: f32, count: usize) -> Vec<f32> {
        (1..=count).map(|h| frequency * h as f32).collect()
    }

    #[test]
    fn full_harmonic_series_matches_its_fundamental() {
        let tuning = Tuning::default();
        let peaks = harmonics_of(440.0, 7);
        let notes = note_range("c1", "c8");
        let result = NoteFinder::new()
            .find_best(&peaks, &notes, &tuning)
            .expect("harmonic series should match");
        assert_eq!(result.note.name(), "a4");
        assert!(result.avg_cents.abs() < 1.0);
        // 7 matched harmonics, 6 clean adjacent pairs.
        assert!((result.score - 16.0).abs() < 1e-5);
    }

    #[test]
    fn uniformly_sharp_series_reports_mean_deviation() {
        let tuning = Tuning::default();
        let sharp = 2f32.powf(10.0 / 1200.0);
        let peaks: Vec<f32> = harmonics_of(440.0 * sharp, 7);
        let notes = vec![Note::parse("a4").unwrap()];
        let result = NoteFinder::new()
            .find_best(&peaks, &notes, &tuning)
            .expect("sharp series should still match");
        assert!((result.avg_cents - 10.0).abs() < 0.5);
    }

    #[test]
    fn too_few_harmonics_are_rejected() {
        let tuning = Tuning::default();
        let peaks = harmonics_of(440.0, 3);
        let notes = note_range("c1", "c8");
        assert_eq!(NoteFinder::new().find_best(&peaks, &notes, &tuning), None);
    }

    #[test]
    fn a_lone_fundamental_is_rejected() {
        let tuning = Tuning::default();
        let peaks = vec![440.0];
        let notes = note_range("c1", "c8");
        assert_eq!(NoteFinder::new().find_best(&peaks, &notes, &tuning), None);
    }

    #[test]
    fn intervening_midpoint_peaks_disqualify_adjacent_pairs() {
        let tuning = Tuning::default();
        let finder = NoteFinder::with_thresholds(4, 4, 3);
        let notes = vec![Note::parse("a4").unwrap()];

        let clean: Vec<f32> = harmonics_of(440.0, 4);
        assert!(finder.find_best(&clean, &notes, &tuning).is_some());

        // Strays within 20 cents of every pair midpoint break the series.
        let mut noisy = clean.clone();
        noisy.extend([655.0, 1090.0, 1535.0]);
        noisy.sort_by(f32::total_cmp);
        assert_eq!(finder.find_best(&noisy, &notes, &tuning), None);
    }

    #[test]
    fn empty_peak_list_yields_no_match() {
        let tuning = Tuning::default();
        let notes = note_range("c1", "c8");
        assert_eq!(NoteFinder::new().find_best(&[], &notes, &tuning), None);
    }
}
