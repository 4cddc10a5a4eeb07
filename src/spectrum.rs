//! Spectral stages
//!
//! The frame-to-spectrum half of the pipeline: Gaussian windowing, FFT
//! magnitude, multi-frame magnitude averaging and linear-to-log conversion.

use crate::stage::Stage;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Gaussian window with precomputed weights.
///
/// `w(n) = exp(-0.5 * ((n - (N-1)/2) / (sigma * (N-1)/2))^2)`. The sum of
/// weights is exposed for magnitude calibration further down the pipeline.
pub struct GaussianWindow {
    weights: Vec<f32>,
    sum: f32,
}

impl GaussianWindow {
    /// Precompute a window of `size` samples with shape parameter `sigma`.
    pub fn new(size: usize, sigma: f32) -> Self {
        let half = (size - 1) as f32 / 2.0;
        let weights: Vec<f32> = (0..size)
            .map(|n| {
                let ex = (n as f32 - half) / (sigma * half);
                (-0.5 * ex * ex).exp()
            })
            .collect();
        let sum = weights.iter().sum();
        GaussianWindow { weights, sum }
    }

    /// Sum of all window weights.
    pub fn sum(&self) -> f32 {
        self.sum
    }

    /// Window length in samples.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True for a zero-length window (never built by the detector).
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl Stage for GaussianWindow {
    fn apply(&mut self, data: &mut [f32]) {
        debug_assert_eq!(data.len(), self.weights.len());
        for (v, w) in data.iter_mut().zip(&self.weights) {
            *v *= w;
        }
    }
}

/// Forward FFT over a real frame, leaving the magnitude spectrum in the
/// first half of the buffer.
///
/// The plan is prepared once; `apply` loads the frame into a complex
/// scratch buffer (imaginary part zero), transforms, and writes
/// `sqrt(re^2 + im^2)` into bins `[0, N/2)`. Bins above `N/2` carry the
/// mirrored half for a real input and are left untouched.
pub struct FftMagnitude {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
}

impl FftMagnitude {
    /// Plan a forward transform of `size` points. `size` must be a power of
    /// two; the detector builder enforces this before construction.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        FftMagnitude {
            fft,
            buffer: vec![Complex { re: 0.0, im: 0.0 }; size],
        }
    }
}

impl Stage for FftMagnitude {
    fn apply(&mut self, data: &mut [f32]) {
        debug_assert_eq!(data.len(), self.buffer.len());
        for (c, &s) in self.buffer.iter_mut().zip(data.iter()) {
            c.re = s;
            c.im = 0.0;
        }
        self.fft.process(&mut self.buffer);
        let half = self.buffer.len() / 2;
        for (v, c) in data[..half].iter_mut().zip(&self.buffer) {
            *v = (c.re * c.re + c.im * c.im).sqrt();
        }
    }
}

/// Mean of the last `count` magnitude spectra.
///
/// Keeps a ring of previous buffers (zero-filled history at startup) and
/// replaces each frame with the elementwise average, smoothing
/// frame-to-frame jitter before peak extraction.
pub struct SpectrumAverage {
    buffers: Vec<Vec<f32>>,
    current: usize,
}

impl SpectrumAverage {
    /// Average over `count` spectra of `size` bins each.
    pub fn new(size: usize, count: usize) -> Self {
        SpectrumAverage {
            buffers: vec![vec![0.0; size]; count.max(1)],
            current: 0,
        }
    }
}

impl Stage for SpectrumAverage {
    fn apply(&mut self, data: &mut [f32]) {
        debug_assert_eq!(data.len(), self.buffers[0].len());
        self.buffers[self.current].copy_from_slice(data);
        self.current = (self.current + 1) % self.buffers.len();

        data.copy_from_slice(&self.buffers[0]);
        for buffer in &self.buffers[1..] {
            for (v, b) in data.iter_mut().zip(buffer) {
                *v += b;
            }
        }
        let count = self.buffers.len() as f32;
        for v in data.iter_mut() {
            *v /= count;
        }
    }
}

/// Linear magnitude to log level: `x := m * log10(x / s)`.
///
/// With `m = 20` and `s` set to half the window-weight sum the output is a
/// dB-like level comparable across frames regardless of window shape.
pub struct LogMagnitude {
    m: f32,
    s: f32,
}

impl LogMagnitude {
    /// Create a converter with scale factor `m` and calibration constant `s`.
    pub fn new(m: f32, s: f32) -> Self {
        LogMagnitude { m, s }
    }
}

impl Stage for LogMagnitude {
    fn apply(&mut self, data: &mut [f32]) {
        for v in data.iter_mut() {
            // Clamp keeps an exactly-zero bin finite instead of -inf.
            let ratio = (*v / self.s).max(1e-12);
            *v = self.m * ratio.log10();
        }
    }
}
