//! Stage
//!
//! In-place buffer transform abstraction and sequential composition. Every
//! spectral step (windowing, FFT magnitude, averaging, log conversion,
//! noise-floor filtering) is a [`Stage`] so the detector can wire them into
//! fixed [`Pipeline`]s at construction time.

/// A unit of per-frame processing applied in place to a buffer.
pub trait Stage {
    /// Transform `data` in place.
    fn apply(&mut self, data: &mut [f32]);
}

/// An ordered sequence of stages, itself applicable as a single stage.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Pipeline { stages: Vec::new() }
    }

    /// Build a pipeline from an initial stage list.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline { stages }
    }

    /// Append a stage to the end of the sequence.
    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }
}

impl Stage for Pipeline {
    fn apply(&mut self, data: &mut [f32]) {
        for stage in &mut self.stages {
            stage.apply(data);
        }
    }
}
