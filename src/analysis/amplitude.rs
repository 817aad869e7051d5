//! Scalar loudness measures over the analysis range.

use super::module::{AnalysisModule, ModuleBase, ModuleId, ModuleOutput};
use super::spectrogram::Spectrogram;

/// Sum of all magnitudes in range.
#[derive(Debug, Default)]
pub struct TotalAmplitude {
    base: ModuleBase,
    total: f32,
}

impl TotalAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> f32 {
        self.total
    }

    pub fn analyze_window(&mut self, window: &[f32]) {
        let range = self.base.range_within(window.len());
        self.total = window[range].iter().sum();
    }
}

impl AnalysisModule for TotalAmplitude {
    fn name(&self) -> &'static str {
        "total_amplitude"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        self.analyze_window(spectrogram.current());
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Scalar(self.total)
    }
}

/// Average magnitude per bin in range, built on [`TotalAmplitude`].
#[derive(Debug)]
pub struct MeanAmplitude {
    base: ModuleBase,
    total: ModuleId<TotalAmplitude>,
    mean: f32,
}

impl Default for MeanAmplitude {
    fn default() -> Self {
        let mut base = ModuleBase::new();
        let total = base.add_submodule(TotalAmplitude::new());
        Self {
            base,
            total,
            mean: 0.0,
        }
    }
}

impl MeanAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> f32 {
        self.mean
    }
}

impl AnalysisModule for MeanAmplitude {
    fn name(&self) -> &'static str {
        "mean_amplitude"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        let width = self.base.range_within(spectrogram.num_bins()).len();
        let Some(total) = self.base.submodule_mut(self.total) else {
            return;
        };
        total.do_analysis(spectrogram);
        self.mean = if width == 0 {
            0.0
        } else {
            total.total() / width as f32
        };
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Scalar(self.mean)
    }
}

/// Largest magnitude in range.
#[derive(Debug, Default)]
pub struct MaxAmplitude {
    base: ModuleBase,
    max: f32,
}

impl MaxAmplitude {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn analyze_window(&mut self, window: &[f32]) {
        let range = self.base.range_within(window.len());
        self.max = window[range].iter().copied().fold(0.0, f32::max);
    }
}

impl AnalysisModule for MaxAmplitude {
    fn name(&self) -> &'static str {
        "max_amplitude"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        self.analyze_window(spectrogram.current());
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Scalar(self.max)
    }
}
