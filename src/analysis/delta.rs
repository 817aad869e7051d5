use super::module::{AnalysisModule, ModuleBase, ModuleOutput};
use super::spectrogram::Spectrogram;

/// Per bin magnitude change between the current and the previous window.
///
/// The output always has one value per bin. Bins outside the analysis range
/// stay at zero.
#[derive(Debug)]
pub struct DeltaAmplitudes {
    base: ModuleBase,
    deltas: Vec<f32>,
}

impl Default for DeltaAmplitudes {
    fn default() -> Self {
        let base = ModuleBase::new();
        let deltas = vec![0.0; base.num_bins()];
        Self { base, deltas }
    }
}

impl DeltaAmplitudes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deltas(&self) -> &[f32] {
        &self.deltas
    }

    /// Sum of the deltas inside the analysis range.
    pub fn total(&self) -> f32 {
        let range = self.base.range_within(self.deltas.len());
        self.deltas[range].iter().sum()
    }

    pub fn analyze_pair(&mut self, current: &[f32], previous: &[f32]) {
        self.deltas.fill(0.0);
        let len = current.len().min(previous.len());
        let range = self.base.range_within(len.min(self.deltas.len()));
        for bin in range {
            self.deltas[bin] = (current[bin] - previous[bin]).abs();
        }
    }
}

impl AnalysisModule for DeltaAmplitudes {
    fn name(&self) -> &'static str {
        "delta_amplitudes"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        self.analyze_pair(spectrogram.current(), spectrogram.previous());
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Values(&self.deltas)
    }

    fn on_reconfigure(&mut self) {
        self.deltas.clear();
        self.deltas.resize(self.base.num_bins(), 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(window_size: usize) -> DeltaAmplitudes {
        let mut module = DeltaAmplitudes::new();
        module.set_window_size(window_size).unwrap();
        module
    }

    #[test]
    fn absolute_difference_per_bin() {
        let mut module = delta(8);
        module.analyze_pair(&[1.0, 5.0, 2.0, 0.0], &[3.0, 1.0, 2.0, 4.0]);
        assert_eq!(module.deltas(), &[2.0, 4.0, 0.0, 4.0]);
        assert_eq!(module.total(), 10.0);
    }

    #[test]
    fn zero_outside_range() {
        let mut module = delta(8);
        module.set_analysis_range_by_bin(1, 3).unwrap();
        module.analyze_pair(&[9.0; 4], &[0.0; 4]);
        assert_eq!(module.deltas(), &[0.0, 9.0, 9.0, 0.0]);
        assert_eq!(module.total(), 18.0);
    }

    #[test]
    fn cold_start_is_all_zero() {
        let mut spectrogram = Spectrogram::new(4, 4);
        spectrogram.push_window(&[3.0, 1.0, 4.0, 1.0]);

        let mut module = delta(8);
        module.do_analysis(&spectrogram);
        assert!(module.deltas().iter().all(|&d| d == 0.0));

        spectrogram.push_window(&[1.0, 1.0, 5.0, 1.0]);
        module.do_analysis(&spectrogram);
        assert_eq!(module.deltas(), &[2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn output_follows_window_size() {
        let mut module = delta(8);
        assert_eq!(module.deltas().len(), 4);
        module.set_window_size(64).unwrap();
        assert_eq!(module.deltas().len(), 32);
        assert_eq!(module.output().as_values().map(<[f32]>::len), Some(32));
    }
}
