use super::module::{AnalysisModule, ModuleBase, ModuleOutput};
use super::spectrogram::Spectrogram;

/// Amplitude weighted mean frequency of the current window, in whole Hz.
///
/// Each bin contributes at its center frequency. A silent range yields 0.
#[derive(Debug, Default)]
pub struct Centroid {
    base: ModuleBase,
    centroid: u32,
}

impl Centroid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn centroid(&self) -> u32 {
        self.centroid
    }

    pub fn analyze_window(&mut self, window: &[f32]) {
        let range = self.base.range_within(window.len());

        let mut amp_sum = 0.0f32;
        let mut weighted_sum = 0.0f32;
        for bin in range {
            let amp = window[bin];
            amp_sum += amp;
            weighted_sum += self.base.bin_center(bin) * amp;
        }

        self.centroid = if amp_sum > 0.0 {
            (weighted_sum / amp_sum).ceil() as u32
        } else {
            0
        };
    }
}

impl AnalysisModule for Centroid {
    fn name(&self) -> &'static str {
        "centroid"
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
        ModuleOutput::Scalar(self.centroid as f32)
    }
}
