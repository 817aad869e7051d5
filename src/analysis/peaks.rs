use std::ops::Range;

use serde::Serialize;

use super::module::{AnalysisModule, ModuleBase, ModuleOutput};
use super::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_MAX_PEAKS: usize = 8;

/// A local maximum, scored by the sum of itself and its two neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub bin: usize,
    pub magnitude: f32,
}

/// Which half of a peak list to read out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// Peak frequencies in Hz
    Freq,
    /// Peak scores
    Amp,
}

/// At most `max_peaks` peaks, in ascending bin order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakList {
    peaks: Vec<Peak>,
    #[serde(skip)]
    max_peaks: usize,
}

impl PeakList {
    pub fn new(max_peaks: usize) -> Self {
        Self {
            peaks: Vec::with_capacity(max_peaks),
            max_peaks,
        }
    }

    pub fn max_peaks(&self) -> usize {
        self.max_peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peak> + '_ {
        self.peaks.iter()
    }

    pub fn clear(&mut self) {
        self.peaks.clear();
    }

    /// Fills `out` with one plane of the list, zero padded past the last peak.
    pub fn write_plane(&self, plane: Plane, bin_width: f32, out: &mut [f32]) {
        out.fill(0.0);
        for (slot, peak) in out.iter_mut().zip(&self.peaks) {
            *slot = match plane {
                Plane::Freq => peak.bin as f32 * bin_width,
                Plane::Amp => peak.magnitude,
            };
        }
    }

    /// Candidate storage sized for the most peaks a window of `num_bins` can
    /// hold, so searching never reallocates.
    fn reserve_for(&mut self, num_bins: usize) {
        let needed = max_local_maxima(num_bins);
        if self.peaks.capacity() < needed {
            self.peaks.reserve(needed - self.peaks.len());
        }
    }

    fn set_max_peaks(&mut self, max_peaks: usize) {
        self.max_peaks = max_peaks;
        self.peaks.truncate(max_peaks);
    }
}

/// Upper bound on strict local maxima in a window of `num_bins` bins.
fn max_local_maxima(num_bins: usize) -> usize {
    (num_bins / 2).max(1)
}

/// Collects every strict local maximum in `range` of `window`, then drops the
/// weakest until at most `max_peaks` remain.
///
/// The first and last bin of the range are never candidates since they lack a
/// neighbor inside it. When several candidates tie for weakest, the earliest
/// found is removed first.
pub fn find_peaks(window: &[f32], range: Range<usize>, max_peaks: usize, peaks: &mut Vec<Peak>) {
    peaks.clear();

    let end = range.end.min(window.len());
    for bin in range.start + 1..end.saturating_sub(1) {
        let (prev, cur, next) = (window[bin - 1], window[bin], window[bin + 1]);
        if cur > prev && cur > next {
            peaks.push(Peak {
                bin,
                magnitude: prev + cur + next,
            });
        }
    }

    while peaks.len() > max_peaks {
        let mut weakest = 0;
        for (i, peak) in peaks.iter().enumerate().skip(1) {
            if peak.magnitude < peaks[weakest].magnitude {
                weakest = i;
            }
        }
        peaks.remove(weakest);
    }
}

/// Finds the strongest peaks of the current window.
#[derive(Debug)]
pub struct MajorPeaks {
    base: ModuleBase,
    peaks: PeakList,
}

impl Default for MajorPeaks {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PEAKS)
    }
}

impl MajorPeaks {
    pub fn new(max_peaks: usize) -> Self {
        let base = ModuleBase::new();
        let limit = max_local_maxima(base.num_bins());
        let mut peaks = PeakList::new(max_peaks.clamp(1, limit));
        peaks.reserve_for(base.num_bins());
        Self { base, peaks }
    }

    pub fn max_peaks(&self) -> usize {
        self.peaks.max_peaks()
    }

    /// Sets how many peaks to keep. Requests above what a window can hold are
    /// clamped.
    pub fn set_max_peaks(&mut self, max_peaks: usize) -> ConfigResult<()> {
        if max_peaks == 0 {
            let err = ConfigError::InvalidValue("max_peaks", "must be at least 1".into());
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        let limit = max_local_maxima(self.base.num_bins());
        if max_peaks > limit {
            log::warn!(
                "{}: {} peaks requested, clamping to {}",
                self.name(),
                max_peaks,
                limit
            );
        }
        self.peaks.set_max_peaks(max_peaks.min(limit));
        Ok(())
    }

    pub fn peaks(&self) -> &PeakList {
        &self.peaks
    }

    /// Searches an arbitrary window instead of the spectrogram.
    pub fn analyze_window(&mut self, window: &[f32]) {
        let range = self.base.range_within(window.len());
        let max_peaks = self.peaks.max_peaks;
        find_peaks(window, range, max_peaks, &mut self.peaks.peaks);
    }

    /// Frequencies of the current peaks, zero padded to `out.len()`.
    pub fn write_frequencies(&self, out: &mut [f32]) {
        self.peaks.write_plane(Plane::Freq, self.base.bin_width(), out);
    }

    /// Scores of the current peaks, zero padded to `out.len()`.
    pub fn write_amplitudes(&self, out: &mut [f32]) {
        self.peaks.write_plane(Plane::Amp, self.base.bin_width(), out);
    }
}

impl AnalysisModule for MajorPeaks {
    fn name(&self) -> &'static str {
        "major_peaks"
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
        ModuleOutput::Peaks(&self.peaks)
    }

    fn on_reconfigure(&mut self) {
        let num_bins = self.base.num_bins();
        self.peaks.reserve_for(num_bins);
        let limit = max_local_maxima(num_bins);
        if self.peaks.max_peaks > limit {
            self.peaks.set_max_peaks(limit);
        }
    }
}
