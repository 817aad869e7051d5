//! JSON lines output, one object per analyzed frame.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::mapping::{interpolate_around_peak, map_amplitudes};
use crate::analysis::{AnalysisModule, MajorPeaks, ModuleOutput};
use crate::config::OutputConfig;
use crate::registry::Registry;

#[derive(Debug, Serialize)]
pub struct NamedOutput<'a> {
    pub name: &'static str,
    #[serde(flatten)]
    pub output: ModuleOutput<'a>,
}

/// Peak frequencies and weights ready for a haptic driver.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct HapticOutput {
    pub freqs: Vec<f32>,
    pub amps: Vec<f32>,
}

impl HapticOutput {
    /// Refines each peak's frequency, normalizes the amplitudes and folds the
    /// frequencies into the haptic range.
    pub fn from_peaks(
        peaks: &MajorPeaks,
        window: &[f32],
        sample_rate: u32,
        output: &OutputConfig,
    ) -> Self {
        let bin_width = peaks.base().bin_width();
        let mut haptic = Self {
            freqs: peaks
                .peaks()
                .iter()
                .map(|p| interpolate_around_peak(window, p.bin, bin_width))
                .collect(),
            amps: peaks.peaks().iter().map(|p| p.magnitude).collect(),
        };
        map_amplitudes(&mut haptic.amps, output.min_amplitude_sum);
        output
            .frequency_curve
            .apply(&mut haptic.freqs, sample_rate, output.haptic_max_hz);
        haptic
    }
}

#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    pub frame: u64,
    pub time_s: f32,
    pub dropped_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haptic: Option<HapticOutput>,
    pub modules: Vec<NamedOutput<'a>>,
}

impl<'a> FrameReport<'a> {
    pub fn new(
        frame: u64,
        dropped_samples: usize,
        registry: &'a Registry,
        output: &OutputConfig,
    ) -> Self {
        let window_size = registry.window_size() as f32;
        let haptic = registry.find::<MajorPeaks>().map(|peaks| {
            HapticOutput::from_peaks(
                peaks,
                registry.spectrogram().current(),
                registry.sample_rate(),
                output,
            )
        });
        Self {
            frame,
            time_s: frame as f32 * window_size / registry.sample_rate() as f32,
            dropped_samples,
            haptic,
            modules: registry
                .outputs()
                .map(|(name, output)| NamedOutput { name, output })
                .collect(),
        }
    }
}

pub struct ReportWriter<W: Write> {
    out: W,
    written: u64,
}

impl ReportWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_frame(&mut self, report: &FrameReport<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, report).context("Failed to serialize frame")?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush().context("Failed to flush report")?;
        Ok(self.out)
    }
}
