use serde::Serialize;

use super::module::{AnalysisModule, ModuleBase, ModuleOutput};
use super::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

/// Default band edges in Hz: sub-bass, bass, low-mid, mid and upper-mid.
pub const DEFAULT_BAND_EDGES: [f32; 6] = [20.0, 60.0, 250.0, 500.0, 2000.0, 4000.0];

/// A contiguous run of bins `[lower_bin, upper_bin)` with its energy and the
/// bin of its strongest local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyBand {
    pub lower_bin: usize,
    pub upper_bin: usize,
    pub sum: f32,
    pub peak_bin: Option<usize>,
}

/// Splits the spectrum into bands at caller supplied frequencies and reports
/// each band's amplitude sum and strongest peak.
#[derive(Debug)]
pub struct BandSlicer {
    base: ModuleBase,
    edges_hz: Vec<f32>,
    bands: Vec<FrequencyBand>,
}

impl Default for BandSlicer {
    fn default() -> Self {
        let mut slicer = Self {
            base: ModuleBase::new(),
            edges_hz: DEFAULT_BAND_EDGES.to_vec(),
            bands: Vec::with_capacity(DEFAULT_BAND_EDGES.len() - 1),
        };
        slicer.rebuild_bands();
        slicer
    }
}

impl BandSlicer {
    pub fn new(edges_hz: &[f32]) -> ConfigResult<Self> {
        let mut slicer = Self::default();
        slicer.set_band_edges(edges_hz)?;
        Ok(slicer)
    }

    /// Replaces the band edges. `n + 1` ascending frequencies give `n` bands.
    pub fn set_band_edges(&mut self, edges_hz: &[f32]) -> ConfigResult<()> {
        if let Err(err) = check_edges(edges_hz) {
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        self.edges_hz.clear();
        self.edges_hz.extend_from_slice(edges_hz);
        self.rebuild_bands();
        Ok(())
    }

    pub fn edges_hz(&self) -> &[f32] {
        &self.edges_hz
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn sums(&self) -> impl Iterator<Item = f32> + '_ {
        self.bands.iter().map(|b| b.sum)
    }

    pub fn peak_bins(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.bands.iter().map(|b| b.peak_bin)
    }

    pub fn analyze_window(&mut self, window: &[f32]) {
        let range = self.base.range_within(window.len());

        for band in self.bands.iter_mut() {
            let lower = band.lower_bin.max(range.start);
            let upper = band.upper_bin.min(range.end);
            band.sum = 0.0;
            band.peak_bin = None;
            if lower >= upper {
                continue;
            }

            band.sum = window[lower..upper].iter().sum();

            let mut strongest = 0.0;
            for bin in lower.max(1)..upper.min(window.len() - 1) {
                let value = window[bin];
                if value > window[bin - 1] && value > window[bin + 1] && value > strongest {
                    strongest = value;
                    band.peak_bin = Some(bin);
                }
            }
        }
    }

    /// Converts the edges to bins for the current window size and sample rate.
    fn rebuild_bands(&mut self) {
        let num_bins = self.base.num_bins();
        let bin_width = self.base.bin_width();
        let to_bin = |hz: f32| ((hz / bin_width).ceil() as usize).min(num_bins);

        self.bands.clear();
        let count = self.edges_hz.len().saturating_sub(1);
        for (k, edge) in self.edges_hz.windows(2).enumerate() {
            let lower_bin = to_bin(edge[0]);
            let mut upper_bin = to_bin(edge[1]);
            // the final bin would otherwise fall between the last band and nyquist
            if k + 1 == count && upper_bin + 1 >= num_bins {
                upper_bin = num_bins;
            }
            self.bands.push(FrequencyBand {
                lower_bin,
                upper_bin,
                sum: 0.0,
                peak_bin: None,
            });
        }
    }
}

fn check_edges(edges_hz: &[f32]) -> ConfigResult<()> {
    if edges_hz.len() < 2 {
        return Err(ConfigError::InvalidBands(format!(
            "need at least 2 edges, got {}",
            edges_hz.len()
        )));
    }
    if edges_hz.iter().any(|hz| !hz.is_finite() || *hz < 0.0) {
        return Err(ConfigError::InvalidBands(
            "edges must be finite and non-negative".into(),
        ));
    }
    if edges_hz.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::InvalidBands(
            "edges must be strictly ascending".into(),
        ));
    }
    Ok(())
}

impl AnalysisModule for BandSlicer {
    fn name(&self) -> &'static str {
        "band_slicer"
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
        ModuleOutput::Bands(&self.bands)
    }

    fn on_reconfigure(&mut self) {
        self.rebuild_bands();
    }
}
