//! Note Detector
//!
//! The top-level per-frame analyser: owns the spectral and noise-floor
//! pipelines, peak extraction, harmonic matching and the cross-frame
//! smoothing state, wired together from construction-time configuration.

use crate::average::{MovingAverage, RunningAverage};
use crate::median::RollingMedian;
use crate::note::{interval_in_cents, Note, NoteParseError, Tuning};
use crate::note_finder::{NoteFinder, NoteMatch};
use crate::peaks::{interpolate_peak, PeakFinder, PeakSet};
use crate::spectrum::{FftMagnitude, GaussianWindow, LogMagnitude, SpectrumAverage};
use crate::stage::{Pipeline, Stage};
use log::{debug, trace};
use thiserror::Error;

/// dB-style scale factor for the log-magnitude conversion.
const LOG_SCALE: f32 = 20.0;

/// Small upward bias keeping the floor above dead-flat spectra.
const NOISE_FLOOR_BIAS: f32 = 0.002;

/// Monotonic-run length required on both sides of a spectral peak.
const PEAK_SPREAD: usize = 1;

/// Capacity of the cross-frame cents-deviation smoother.
const SMOOTHER_LEN: usize = 5;

/// Peaks further than this from every note of the configured range are
/// dropped before matching.
const MAX_NOTE_DISTANCE_CENTS: f32 = 100.0;

/// Errors raised by detector construction and per-frame analysis.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Frame received was not of the configured size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The configured frame length.
        expected: usize,
        /// The actual length of the received frame.
        got: usize,
    },

    /// Construction-time parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A note-range bound failed to parse.
    #[error(transparent)]
    Note(#[from] NoteParseError),
}

/// A detected note with its smoothed tuning deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// The closest equal-tempered note.
    pub note: Note,
    /// Smoothed deviation from the note in cents (positive = sharp).
    pub cents: f32,
}

/// Per-frame analysis output, borrowing the detector's working buffers.
#[derive(Debug)]
pub struct Analysis<'a> {
    /// Log-magnitude spectrum over the analysis bandwidth, in dB-like level.
    pub spectrum: &'a [f32],
    /// Estimated noise floor, same shape as `spectrum`.
    pub noise_floor: &'a [f32],
    /// Deduplicated peak frequencies in ascending Hz.
    pub peaks: &'a [f32],
    /// Note detection, or the held previous result, if any.
    pub detection: Option<Detection>,
}

/// Builder for a [`NoteDetector`].
pub struct NoteDetectorBuilder {
    frame_size: usize,
    sample_rate: usize,
    frequency_range: (f32, f32),
    window_sigma: f32,
    averaged_frames: usize,
    floor_spread: Option<usize>,
    peak_height_db: f32,
    peak_tolerance_hz: f32,
    harmonics_to_check: usize,
    min_harmonics: usize,
    min_adjacent_harmonics: usize,
    a4_hz: f32,
    note_range: (String, String),
}

impl NoteDetectorBuilder {
    /// Start with default parameters: frame_size = 4096, sample_rate =
    /// 44_100, frequency_range = 20..5000 Hz, window_sigma = 0.35,
    /// averaged_frames = 3, peak_height_db = 15, a4 = 440 Hz,
    /// note_range = c1..c8.
    pub fn new() -> Self {
        NoteDetectorBuilder {
            frame_size: 4096,
            sample_rate: 44_100,
            frequency_range: (20.0, 5_000.0),
            window_sigma: 0.35,
            averaged_frames: 3,
            floor_spread: None,
            peak_height_db: 15.0,
            peak_tolerance_hz: 20.0,
            harmonics_to_check: 7,
            min_harmonics: 4,
            min_adjacent_harmonics: 3,
            a4_hz: 440.0,
            note_range: ("c1".to_string(), "c8".to_string()),
        }
    }

    /// Set the sample frame length (must be a power of two).
    pub fn frame_size(mut self, size: usize) -> Self {
        self.frame_size = size;
        self
    }

    /// Set the sampling rate of the audio in Hz.
    pub fn sample_rate(mut self, rate: usize) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the analysed frequency band `[min, max]` in Hz.
    pub fn frequency_range(mut self, min_hz: f32, max_hz: f32) -> Self {
        self.frequency_range = (min_hz, max_hz);
        self
    }

    /// Set the Gaussian window shape parameter.
    pub fn window_sigma(mut self, sigma: f32) -> Self {
        self.window_sigma = sigma;
        self
    }

    /// Set how many magnitude spectra are averaged per frame.
    pub fn averaged_frames(mut self, count: usize) -> Self {
        self.averaged_frames = count;
        self
    }

    /// Set the noise-floor median/average half-width in bins
    /// (default `frame_size / 512`).
    pub fn floor_spread(mut self, spread: usize) -> Self {
        self.floor_spread = Some(spread);
        self
    }

    /// Set the margin above the noise floor a peak must clear, in dB.
    pub fn peak_height_db(mut self, margin: f32) -> Self {
        self.peak_height_db = margin;
        self
    }

    /// Set the peak deduplication tolerance in Hz.
    pub fn peak_tolerance_hz(mut self, tolerance: f32) -> Self {
        self.peak_tolerance_hz = tolerance;
        self
    }

    /// Set how many harmonics (fundamental included) are looked up per note.
    pub fn harmonics_to_check(mut self, count: usize) -> Self {
        self.harmonics_to_check = count;
        self
    }

    /// Set the minimum number of matched harmonics for a note to qualify.
    pub fn min_harmonics(mut self, count: usize) -> Self {
        self.min_harmonics = count;
        self
    }

    /// Set the minimum number of clean adjacent harmonic pairs.
    pub fn min_adjacent_harmonics(mut self, count: usize) -> Self {
        self.min_adjacent_harmonics = count;
        self
    }

    /// Set the A4 reference pitch in Hz.
    pub fn a4_hz(mut self, a4_hz: f32) -> Self {
        self.a4_hz = a4_hz;
        self
    }

    /// Set the inclusive candidate note range by name, e.g. `"c1".."c8"`.
    pub fn note_range(mut self, low: &str, high: &str) -> Self {
        self.note_range = (low.to_string(), high.to_string());
        self
    }

    /// Finalize and create the detector. Fails fast on inconsistent
    /// parameters; no partially-built pipeline is ever returned.
    pub fn build(self) -> Result<NoteDetector, DetectorError> {
        let configuration = DetectorError::Configuration;

        if !self.frame_size.is_power_of_two() || self.frame_size < 4 {
            return Err(configuration(format!(
                "frame_size must be a power of two >= 4, got {}",
                self.frame_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(configuration("sample_rate cannot be zero".into()));
        }
        let (min_hz, max_hz) = self.frequency_range;
        let nyquist = self.sample_rate as f32 / 2.0;
        if !(0.0 <= min_hz && min_hz < max_hz && max_hz <= nyquist) {
            return Err(configuration(format!(
                "frequency_range {min_hz}..{max_hz} must be ascending within 0..{nyquist}"
            )));
        }
        if self.window_sigma <= 0.0 {
            return Err(configuration("window_sigma must be positive".into()));
        }
        if self.averaged_frames == 0 {
            return Err(configuration("averaged_frames cannot be zero".into()));
        }
        if self.peak_tolerance_hz <= 0.0 {
            return Err(configuration("peak_tolerance_hz must be positive".into()));
        }
        if self.a4_hz <= 0.0 {
            return Err(configuration("a4_hz must be positive".into()));
        }

        // Analysis bandwidth in bins, capped at the meaningful half.
        let bin_hz = self.sample_rate as f32 / self.frame_size as f32;
        let processing_len =
            (((max_hz / bin_hz).ceil() as usize).max(3)).min(self.frame_size / 2);

        let floor_spread = self.floor_spread.unwrap_or(self.frame_size / 512);
        if 2 * floor_spread + 1 > processing_len {
            return Err(configuration(format!(
                "floor_spread {floor_spread} needs a window wider than the {processing_len} analysed bins"
            )));
        }

        let low = Note::parse(&self.note_range.0)?;
        let high = Note::parse(&self.note_range.1)?;
        if low.midi_number() > high.midi_number() {
            return Err(configuration(format!(
                "note_range {}..{} is descending",
                low, high
            )));
        }
        let notes = Note::range(low, high);
        let tuning = Tuning::new(self.a4_hz);
        let note_freqs: Vec<f32> = notes.iter().map(|&n| tuning.frequency(n)).collect();

        let window = GaussianWindow::new(self.frame_size, self.window_sigma);
        let calibration = window.sum() / 2.0;
        let fft_pipeline = Pipeline::from_stages(vec![
            Box::new(window),
            Box::new(FftMagnitude::new(self.frame_size)),
        ]);
        let log_pipeline = Pipeline::from_stages(vec![
            Box::new(SpectrumAverage::new(processing_len, self.averaged_frames)),
            Box::new(LogMagnitude::new(LOG_SCALE, calibration)),
        ]);
        let floor_pipeline = Pipeline::from_stages(vec![
            Box::new(RollingMedian::new(floor_spread)),
            Box::new(MovingAverage::new(floor_spread)),
        ]);

        debug!(
            "note detector: frame {}, {} Hz, band {:.0}..{:.0} Hz ({} bins), \
             floor spread {}, {} candidate notes, a4 {:.1} Hz",
            self.frame_size,
            self.sample_rate,
            min_hz,
            max_hz,
            processing_len,
            floor_spread,
            notes.len(),
            self.a4_hz
        );

        Ok(NoteDetector {
            frame_size: self.frame_size,
            sample_rate: self.sample_rate,
            frequency_range: self.frequency_range,
            processing_len,
            peak_height_db: self.peak_height_db,
            fft_pipeline,
            log_pipeline,
            floor_pipeline,
            fft_data: vec![0.0; self.frame_size],
            log_mag: vec![0.0; processing_len],
            noise_floor: vec![0.0; processing_len],
            peak_finder: PeakFinder::new(PEAK_SPREAD),
            peak_set: PeakSet::new(self.peak_tolerance_hz),
            peak_freqs: Vec::new(),
            notes,
            note_freqs,
            tuning,
            note_finder: NoteFinder::with_thresholds(
                self.harmonics_to_check,
                self.min_harmonics,
                self.min_adjacent_harmonics,
            ),
            smoother: RunningAverage::new(SMOOTHER_LEN),
            last_match: None,
            last_detection: None,
        })
    }
}

impl Default for NoteDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Real-time monophonic note detector.
///
/// Feed equally-sized sample frames to [`process`](Self::process); each call
/// runs the full pipeline (window, FFT, averaging, log conversion, noise
/// floor, peak extraction, harmonic matching, smoothing) to completion. Not
/// designed for concurrent calls; callers serialize.
pub struct NoteDetector {
    frame_size: usize,
    sample_rate: usize,
    frequency_range: (f32, f32),
    processing_len: usize,
    peak_height_db: f32,
    fft_pipeline: Pipeline,
    log_pipeline: Pipeline,
    floor_pipeline: Pipeline,
    fft_data: Vec<f32>,
    log_mag: Vec<f32>,
    noise_floor: Vec<f32>,
    peak_finder: PeakFinder,
    peak_set: PeakSet,
    peak_freqs: Vec<f32>,
    notes: Vec<Note>,
    note_freqs: Vec<f32>,
    tuning: Tuning,
    note_finder: NoteFinder,
    smoother: RunningAverage,
    last_match: Option<NoteMatch>,
    last_detection: Option<Detection>,
}

impl std::fmt::Debug for NoteDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteDetector")
            .field("frame_size", &self.frame_size)
            .field("sample_rate", &self.sample_rate)
            .field("frequency_range", &self.frequency_range)
            .field("processing_len", &self.processing_len)
            .field("peak_height_db", &self.peak_height_db)
            .field("tuning", &self.tuning)
            .field("notes", &self.notes.len())
            .finish_non_exhaustive()
    }
}

impl NoteDetector {
    /// Start customizing with a builder.
    pub fn builder() -> NoteDetectorBuilder {
        NoteDetectorBuilder::new()
    }

    /// The configured frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The configured sampling rate in Hz.
    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    /// The tuning reference used for note frequencies.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Analyse one frame of samples (nominally in `[-1, 1]`).
    ///
    /// Returns the frame's spectra, filtered peaks and the current
    /// detection. When no note clears the matching thresholds the previous
    /// detection is held unchanged; that is the normal "insufficient
    /// evidence" outcome, not an error.
    pub fn process(&mut self, frame: &[f32]) -> Result<Analysis<'_>, DetectorError> {
        if frame.len() != self.frame_size {
            return Err(DetectorError::InvalidFrameSize {
                expected: self.frame_size,
                got: frame.len(),
            });
        }

        self.fft_data.copy_from_slice(frame);
        self.fft_pipeline.apply(&mut self.fft_data);
        self.log_mag
            .copy_from_slice(&self.fft_data[..self.processing_len]);
        self.log_pipeline.apply(&mut self.log_mag);

        self.noise_floor.copy_from_slice(&self.log_mag);
        self.floor_pipeline.apply(&mut self.noise_floor);
        for v in self.noise_floor.iter_mut() {
            *v += NOISE_FLOOR_BIAS;
        }

        self.scan_peaks();
        self.collect_peaks();

        let found = self
            .note_finder
            .find_best(&self.peak_freqs, &self.notes, &self.tuning);
        if let Some(m) = found {
            let changed = match self.last_match {
                Some(last) => last.note != m.note,
                None => true,
            };
            if changed {
                self.smoother.reset();
            }
            self.smoother.put(m.avg_cents);
            let cents = self.smoother.average().expect("smoother holds a sample");
            self.last_match = Some(m);
            self.last_detection = Some(Detection { note: m.note, cents });
        }
        // No match: hold the previous detection, smoother untouched.

        trace!(
            "frame analysed: {} peaks, detection {:?}",
            self.peak_freqs.len(),
            self.last_detection
        );

        Ok(Analysis {
            spectrum: &self.log_mag,
            noise_floor: &self.noise_floor,
            peaks: &self.peak_freqs,
            detection: self.last_detection,
        })
    }

    /// Run the local-maximum scan over the log spectrum, interpolating and
    /// deduplicating every candidate that clears the floor margin.
    fn scan_peaks(&mut self) {
        self.peak_set.clear();
        let bin_hz = self.sample_rate as f32 / self.frame_size as f32;
        let log_mag = &self.log_mag;
        let noise_floor = &self.noise_floor;
        let peak_set = &mut self.peak_set;
        let margin = self.peak_height_db;
        self.peak_finder.for_each_peak(log_mag, |bin, value| {
            if log_mag[bin] - (noise_floor[bin] + margin) < 0.0 {
                return;
            }
            let offset = interpolate_peak(log_mag[bin - 1], log_mag[bin], log_mag[bin + 1]);
            let frequency = (bin as f32 + offset) * bin_hz;
            peak_set.add(frequency, value);
        });
    }

    /// Gather surviving peaks in ascending order, keeping only those inside
    /// the analysis band and within a semitone of some candidate note.
    fn collect_peaks(&mut self) {
        self.peak_freqs.clear();
        self.peak_set.collect_into(&mut self.peak_freqs);
        let (min_hz, max_hz) = self.frequency_range;
        let note_freqs = &self.note_freqs;
        self.peak_freqs.retain(|&freq| {
            if !(min_hz..=max_hz).contains(&freq) {
                return false;
            }
            let closest = closest_value(note_freqs, freq);
            interval_in_cents(closest, freq).abs() < MAX_NOTE_DISTANCE_CENTS
        });
    }
}

/// Closest element of a sorted ascending slice, by absolute difference.
fn closest_value(sorted: &[f32], target: f32) -> f32 {
    debug_assert!(!sorted.is_empty());
    let idx = sorted.partition_point(|&v| v < target);
    if idx == 0 {
        return sorted[0];
    }
    if idx == sorted.len() {
        return sorted[sorted.len() - 1];
    }
    let below = sorted[idx - 1];
    let above = sorted[idx];
    if (target - below).abs() <= (above - target).abs() {
        below
    } else {
        above
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_non_power_of_two_frames() {
        let err = NoteDetector::builder().frame_size(3000).build().unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn build_rejects_inverted_frequency_range() {
        let err = NoteDetector::builder()
            .frequency_range(5_000.0, 20.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn build_rejects_range_beyond_nyquist() {
        let err = NoteDetector::builder()
            .sample_rate(8_000)
            .frequency_range(20.0, 5_000.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn build_rejects_oversized_floor_spread() {
        let err = NoteDetector::builder()
            .frame_size(256)
            .floor_spread(200)
            .build()
            .unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn build_rejects_malformed_note_range() {
        let err = NoteDetector::builder()
            .note_range("x9", "c8")
            .build()
            .unwrap_err();
        assert!(matches!(err, DetectorError::Note(_)));

        let err = NoteDetector::builder()
            .note_range("c8", "c1")
            .build()
            .unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn process_rejects_wrong_frame_length() {
        let mut detector = NoteDetector::builder().build().unwrap();
        let err = detector.process(&[0.0; 100]).unwrap_err();
        assert!(matches!(
            err,
            DetectorError::InvalidFrameSize {
                expected: 4096,
                got: 100
            }
        ));
    }

    #[test]
    fn silent_frame_yields_no_detection() {
        let mut detector = NoteDetector::builder().build().unwrap();
        let frame = vec![0.0; detector.frame_size()];
        let analysis = detector.process(&frame).unwrap();
        assert_eq!(analysis.detection, None);
        assert!(analysis.peaks.is_empty());
        assert_eq!(analysis.spectrum.len(), analysis.noise_floor.len());
    }

    #[test]
    fn detector_debug_summarizes_configuration() {
        let detector = NoteDetector::builder().build().unwrap();
        let dump = format!("{detector:?}");
        assert!(dump.contains("NoteDetector"));
        assert!(dump.contains("frame_size: 4096"));
        assert!(dump.contains("sample_rate: 44100"));
    }

    #[test]
    fn closest_value_picks_the_nearer_neighbour() {
        let sorted = [100.0, 200.0, 400.0];
        assert_eq!(closest_value(&sorted, 50.0), 100.0);
        assert_eq!(closest_value(&sorted, 140.0), 100.0);
        assert_eq!(closest_value(&sorted, 310.0), 400.0);
        assert_eq!(closest_value(&sorted, 900.0), 400.0);
    }
}
