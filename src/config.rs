use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::bands::DEFAULT_BAND_EDGES;
use crate::analysis::mapping::{FrequencyCurve, DEFAULT_HAPTIC_MAX_HZ};
use crate::analysis::noisiness::{
    DEFAULT_DELTA_THRESHOLD, DEFAULT_LOUDNESS_THRESHOLD, DEFAULT_NOISE_THRESHOLD,
};
use crate::analysis::peaks::DEFAULT_MAX_PEAKS;
use crate::analysis::salience::DEFAULT_NUM_FREQS;
use crate::analysis::{
    AnalysisModule, BandSlicer, Centroid, DeltaAmplitudes, MajorPeaks, MaxAmplitude,
    MeanAmplitude, NoiseFloor, Noisiness, PercussionDetection, SalientFreqs, TotalAmplitude,
};
use crate::error::{ConfigError, ConfigResult};
use crate::registry::Registry;

/// Every `kind` a `[[modules]]` entry accepts, with a short description.
pub const MODULE_KINDS: &[(&str, &str)] = &[
    ("major_peaks", "strongest local maxima of the spectrum"),
    ("centroid", "amplitude weighted mean frequency"),
    ("band_slicer", "energy and peak per frequency band"),
    ("delta_amplitudes", "per bin change since the previous frame"),
    ("salient_freqs", "bins that changed the most"),
    ("total_amplitude", "sum of magnitudes"),
    ("mean_amplitude", "average magnitude per bin"),
    ("max_amplitude", "largest magnitude"),
    ("noisiness", "spectral flatness estimate"),
    ("percussion", "loud broadband onsets"),
];

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub noise_floor: NoiseFloor,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_history")]
    pub history: usize,
    /// Overrides the decoded file's rate in bin math
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_haptic_max_hz")]
    pub haptic_max_hz: f32,
    #[serde(default)]
    pub frequency_curve: FrequencyCurve,
    /// Floor for the amplitude normalization of haptic output
    #[serde(default)]
    pub min_amplitude_sum: f32,
}

/// One `[[modules]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleConfig {
    #[serde(flatten)]
    pub kind: ModuleKind,
    #[serde(default)]
    pub lower_hz: Option<f32>,
    #[serde(default)]
    pub upper_hz: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleKind {
    MajorPeaks {
        #[serde(default = "default_max_peaks")]
        max_peaks: usize,
    },
    Centroid,
    BandSlicer {
        #[serde(default = "default_band_edges")]
        edges_hz: Vec<f32>,
    },
    DeltaAmplitudes,
    SalientFreqs {
        #[serde(default = "default_num_freqs")]
        num_freqs: usize,
    },
    TotalAmplitude,
    MeanAmplitude,
    MaxAmplitude,
    Noisiness,
    Percussion {
        #[serde(default = "default_loudness_threshold")]
        loudness_threshold: f32,
        #[serde(default = "default_delta_threshold")]
        delta_threshold: f32,
        #[serde(default = "default_noise_threshold")]
        noise_threshold: f32,
        #[serde(default)]
        require_onset: bool,
    },
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            history: default_history(),
            sample_rate: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            haptic_max_hz: default_haptic_max_hz(),
            frequency_curve: FrequencyCurve::default(),
            min_amplitude_sum: 0.0,
        }
    }
}

fn default_window_size() -> usize { 256 }
fn default_history() -> usize { 8 }
fn default_haptic_max_hz() -> f32 { DEFAULT_HAPTIC_MAX_HZ }
fn default_max_peaks() -> usize { DEFAULT_MAX_PEAKS }
fn default_band_edges() -> Vec<f32> { DEFAULT_BAND_EDGES.to_vec() }
fn default_num_freqs() -> usize { DEFAULT_NUM_FREQS }
fn default_loudness_threshold() -> f32 { DEFAULT_LOUDNESS_THRESHOLD }
fn default_delta_threshold() -> f32 { DEFAULT_DELTA_THRESHOLD }
fn default_noise_threshold() -> f32 { DEFAULT_NOISE_THRESHOLD }

impl ModuleConfig {
    pub fn new(kind: ModuleKind) -> Self {
        Self {
            kind,
            lower_hz: None,
            upper_hz: None,
        }
    }

    /// Module set used when the config file lists none.
    pub fn default_set() -> Vec<Self> {
        [
            ModuleKind::MajorPeaks {
                max_peaks: DEFAULT_MAX_PEAKS,
            },
            ModuleKind::Centroid,
            ModuleKind::BandSlicer {
                edges_hz: default_band_edges(),
            },
            ModuleKind::SalientFreqs {
                num_freqs: DEFAULT_NUM_FREQS,
            },
            ModuleKind::MeanAmplitude,
            ModuleKind::Noisiness,
            ModuleKind::Percussion {
                loudness_threshold: DEFAULT_LOUDNESS_THRESHOLD,
                delta_threshold: DEFAULT_DELTA_THRESHOLD,
                noise_threshold: DEFAULT_NOISE_THRESHOLD,
                require_onset: false,
            },
        ]
        .into_iter()
        .map(Self::new)
        .collect()
    }

    /// Builds the module and adds it to `registry`.
    pub fn add_to(&self, registry: &mut Registry) -> ConfigResult<()> {
        let range = self.frequency_range(registry.sample_rate());
        match &self.kind {
            ModuleKind::MajorPeaks { max_peaks } => {
                let mut module = MajorPeaks::default();
                module.set_window_size(registry.window_size())?;
                module.set_max_peaks(*max_peaks)?;
                add(registry, module, range)
            }
            ModuleKind::Centroid => add(registry, Centroid::new(), range),
            ModuleKind::BandSlicer { edges_hz } => add(registry, BandSlicer::new(edges_hz)?, range),
            ModuleKind::DeltaAmplitudes => add(registry, DeltaAmplitudes::new(), range),
            ModuleKind::SalientFreqs { num_freqs } => {
                let mut module = SalientFreqs::default();
                module.set_num_freqs(*num_freqs)?;
                add(registry, module, range)
            }
            ModuleKind::TotalAmplitude => add(registry, TotalAmplitude::new(), range),
            ModuleKind::MeanAmplitude => add(registry, MeanAmplitude::new(), range),
            ModuleKind::MaxAmplitude => add(registry, MaxAmplitude::new(), range),
            ModuleKind::Noisiness => add(registry, Noisiness::new(), range),
            ModuleKind::Percussion {
                loudness_threshold,
                delta_threshold,
                noise_threshold,
                require_onset,
            } => {
                let mut module = PercussionDetection::with_thresholds(
                    *loudness_threshold,
                    *delta_threshold,
                    *noise_threshold,
                )?;
                module.set_require_onset(*require_onset);
                add(registry, module, range)
            }
        }
    }

    /// `[lower_hz, upper_hz]` with a missing end filled in, or `None` for the
    /// full spectrum.
    fn frequency_range(&self, sample_rate: u32) -> Option<(f32, f32)> {
        match (self.lower_hz, self.upper_hz) {
            (None, None) => None,
            (lower, upper) => Some((
                lower.unwrap_or(0.0),
                upper.unwrap_or(sample_rate as f32 / 2.0),
            )),
        }
    }
}

fn add<M: AnalysisModule>(
    registry: &mut Registry,
    module: M,
    range: Option<(f32, f32)>,
) -> ConfigResult<()> {
    match range {
        Some((lower, upper)) => registry.add_module_in_range(module, lower, upper).map(|_| ()),
        None => {
            registry.add_module(module);
            Ok(())
        }
    }
}

impl Config {
    /// Modules to run, falling back to the default set.
    pub fn module_set(&self) -> Vec<ModuleConfig> {
        if self.modules.is_empty() {
            ModuleConfig::default_set()
        } else {
            self.modules.clone()
        }
    }

    /// Registry for `sample_rate` holding every configured module.
    pub fn build_registry(&self, sample_rate: u32) -> ConfigResult<Registry> {
        let sample_rate = self.analysis.sample_rate.unwrap_or(sample_rate);
        if self.analysis.history == 0 {
            return Err(ConfigError::InvalidValue("history", "must be at least 1".into()));
        }
        let mut registry = Registry::new(self.analysis.window_size, sample_rate, self.analysis.history)?;
        for module in self.module_set() {
            module.add_to(&mut registry)?;
        }
        Ok(registry)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Explicit path, then `./audioprism.toml`, then the user's config directory.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("audioprism.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("audioprism").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("audioprism").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
