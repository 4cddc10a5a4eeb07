//! # note_detector
//!
//! Real-time estimation of the musical pitch of a monophonic audio signal:
//! each fixed-size sample frame is windowed, transformed to a log-magnitude
//! spectrum, measured against an adaptive noise floor, reduced to a
//! deduplicated set of spectral peaks and matched against harmonic
//! templates of an equal-tempered note range, yielding the closest note
//! plus a smoothed tuning deviation in cents.
//!
//! ## Example
//! ```rust
//! use note_detector::NoteDetector;
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Build the analysis pipeline
//!     let mut detector = NoteDetector::builder()
//!         .frame_size(4096)
//!         .sample_rate(48_000)
//!         .a4_hz(440.0)
//!         .build()?;
//!
//!     // 2) In your audio loop:
//!     let frame: Vec<f32> = vec![0.0; 4096]; // fill with actual samples
//!     let analysis = detector.process(&frame)?;
//!     if let Some(detection) = analysis.detection {
//!         println!(
//!             "Detected {} ({:+.1} cents), {} peaks",
//!             detection.note,
//!             detection.cents,
//!             analysis.peaks.len()
//!         );
//!     }
//!
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! Audio capture, frame overlap management and rendering are external
//! collaborators; this crate only consumes frames and produces buffers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Top-level per-frame note detector API.
pub use detector::{Analysis, Detection, DetectorError, NoteDetector, NoteDetectorBuilder};

/// Equal-tempered note model.
pub use note::{interval_in_cents, Note, NoteParseError, Tuning};

/// Harmonic-template matching result.
pub use note_finder::{NoteFinder, NoteMatch};

/// Running and moving averages.
pub mod average;

/// Top-level detector module.
pub mod detector;

/// Sliding-window median filtering.
pub mod median;

/// Note model and tuning reference.
pub mod note;

/// Harmonic-template note matching.
pub mod note_finder;

/// Peak scanning, interpolation and deduplication.
pub mod peaks;

/// Fixed-capacity circular buffer.
pub mod ring;

/// Windowing, FFT magnitude, averaging and log conversion stages.
pub mod spectrum;

/// In-place transform abstraction.
pub mod stage;

/// Order-statistics tree.
pub mod tree;
