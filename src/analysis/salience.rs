use std::ops::Range;

use super::delta::DeltaAmplitudes;
use super::module::{AnalysisModule, ModuleBase, ModuleId, ModuleOutput};
use super::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_NUM_FREQS: usize = 3;

/// Picks up to `count` bins of `deltas` inside `range` in descending order of
/// change. Only positive deltas are picked, so `out` may end up shorter.
pub fn select_salient(
    deltas: &[f32],
    range: Range<usize>,
    count: usize,
    scratch: &mut Vec<f32>,
    out: &mut Vec<usize>,
) {
    out.clear();
    let end = range.end.min(deltas.len());
    let range = range.start.min(end)..end;
    scratch.clear();
    scratch.extend_from_slice(&deltas[range.clone()]);

    for _ in 0..count.min(range.len()) {
        let mut best: Option<(usize, f32)> = None;
        for (i, &value) in scratch.iter().enumerate() {
            if value > best.map_or(0.0, |(_, v)| v) {
                best = Some((i, value));
            }
        }
        let Some((i, _)) = best else {
            break;
        };
        out.push(range.start + i);
        scratch[i] = 0.0;
    }
}

/// Bins whose magnitude changed the most since the previous frame.
#[derive(Debug)]
pub struct SalientFreqs {
    base: ModuleBase,
    delta: ModuleId<DeltaAmplitudes>,
    num_freqs: usize,
    scratch: Vec<f32>,
    bins: Vec<usize>,
}

impl Default for SalientFreqs {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_FREQS)
    }
}

impl SalientFreqs {
    pub fn new(num_freqs: usize) -> Self {
        let mut base = ModuleBase::new();
        let delta = base.add_submodule(DeltaAmplitudes::new());
        let num_freqs = num_freqs.max(1);
        Self {
            scratch: Vec::with_capacity(base.num_bins()),
            bins: Vec::with_capacity(num_freqs),
            base,
            delta,
            num_freqs,
        }
    }

    pub fn num_freqs(&self) -> usize {
        self.num_freqs
    }

    pub fn set_num_freqs(&mut self, num_freqs: usize) -> ConfigResult<()> {
        if num_freqs == 0 {
            let err = ConfigError::InvalidValue("num_freqs", "must be at least 1".into());
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        self.num_freqs = num_freqs;
        self.bins.reserve(num_freqs.saturating_sub(self.bins.len()));
        Ok(())
    }

    /// Selected bins, strongest change first.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    pub fn deltas(&self) -> Option<&DeltaAmplitudes> {
        self.base.submodule(self.delta)
    }
}

impl AnalysisModule for SalientFreqs {
    fn name(&self) -> &'static str {
        "salient_freqs"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        let range = self.base.range_within(spectrogram.num_bins());
        let Some(delta) = self.base.submodule_mut(self.delta) else {
            return;
        };
        delta.do_analysis(spectrogram);
        select_salient(
            delta.deltas(),
            range,
            self.num_freqs,
            &mut self.scratch,
            &mut self.bins,
        );
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Bins(&self.bins)
    }

    fn on_reconfigure(&mut self) {
        let num_bins = self.base.num_bins();
        self.scratch.reserve(num_bins.saturating_sub(self.scratch.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_largest_changes_first() {
        let deltas = [0.0, 5.0, 1.0, 9.0, 3.0, 0.0];
        let mut out = Vec::new();
        select_salient(&deltas, 0..6, 3, &mut Vec::new(), &mut out);
        assert_eq!(out, vec![3, 1, 4]);
    }

    #[test]
    fn stops_when_no_positive_delta_remains() {
        let deltas = [0.0, 2.0, 0.0, 0.0];
        let mut out = Vec::new();
        select_salient(&deltas, 0..4, 3, &mut Vec::new(), &mut out);
        assert_eq!(out, vec![1]);

        select_salient(&[0.0; 4], 0..4, 3, &mut Vec::new(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn count_is_clamped_to_range() {
        let deltas = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut out = Vec::new();
        select_salient(&deltas, 1..3, 10, &mut Vec::new(), &mut out);
        assert_eq!(out, vec![2, 1]);

        select_salient(&deltas, 3..3, 2, &mut Vec::new(), &mut out);
        assert!(out.is_empty());

        let inverted = Range { start: 4, end: 2 };
        select_salient(&deltas, inverted, 2, &mut Vec::new(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn module_tracks_frame_to_frame_change() {
        let mut spectrogram = Spectrogram::new(4, 8);
        spectrogram.push_window(&[1.0; 8]);
        spectrogram.push_window(&[1.0, 1.0, 7.0, 1.0, 1.0, 4.0, 1.0, 0.0]);

        let mut module = SalientFreqs::new(2);
        module.set_window_size(16).unwrap();
        module.do_analysis(&spectrogram);
        assert_eq!(module.bins(), &[2, 5]);
        assert!(matches!(module.output(), ModuleOutput::Bins(b) if b == [2, 5]));
    }

    #[test]
    fn range_reaches_inner_delta() {
        let mut module = SalientFreqs::default();
        module.set_window_size(16).unwrap();
        module.set_analysis_range_by_bin(2, 6).unwrap();
        assert_eq!(module.deltas().unwrap().analysis_range(), 2..6);
        assert!(module.set_num_freqs(0).is_err());
        assert_eq!(module.num_freqs(), DEFAULT_NUM_FREQS);
    }
}
