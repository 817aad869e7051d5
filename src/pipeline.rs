//! Capture, transform, denoise and analyze, one block at a time.

use std::sync::Arc;

use crate::analysis::NoiseFloor;
use crate::audio::capture::CaptureBuffer;
use crate::audio::fft::SpectrumAnalyzer;
use crate::error::ConfigResult;
use crate::registry::Registry;

/// Consumer side of the capture buffer. Each full block becomes one analyzed
/// frame in the registry.
pub struct Pipeline {
    capture: Arc<CaptureBuffer>,
    analyzer: SpectrumAnalyzer,
    noise_floor: NoiseFloor,
    registry: Registry,
    raw: Vec<f32>,
    magnitudes: Vec<f32>,
    scratch: Vec<f32>,
    frames: u64,
}

impl Pipeline {
    pub fn new(registry: Registry, noise_floor: NoiseFloor) -> ConfigResult<Self> {
        let window_size = registry.window_size();
        Ok(Self {
            capture: Arc::new(CaptureBuffer::new(window_size)),
            analyzer: SpectrumAnalyzer::new(window_size)?,
            noise_floor,
            raw: Vec::with_capacity(window_size),
            magnitudes: Vec::with_capacity(window_size / 2),
            scratch: Vec::with_capacity(window_size / 2),
            registry,
            frames: 0,
        })
    }

    /// Handle for the producer that records samples.
    pub fn capture(&self) -> Arc<CaptureBuffer> {
        Arc::clone(&self.capture)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Frames analyzed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Magnitudes of the last frame after the noise floor.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Analyzes the captured block if it is complete. Returns whether a new
    /// frame was produced.
    pub fn poll(&mut self) -> bool {
        if !self.capture.is_full() {
            return false;
        }
        self.capture.drain_into(&mut self.raw);
        self.analyzer.process(&self.raw, &mut self.magnitudes);
        self.noise_floor
            .apply_with(&mut self.magnitudes, &mut self.scratch);
        self.registry.process_frame(&self.magnitudes);
        self.frames += 1;
        log::trace!("Frame {} analyzed", self.frames);
        true
    }
}
