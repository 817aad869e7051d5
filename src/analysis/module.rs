use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use serde::Serialize;

use super::bands::FrequencyBand;
use super::peaks::PeakList;
use super::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

/// Window size a module starts with until a registry or parent configures it.
pub const DEFAULT_WINDOW_SIZE: usize = 256;
/// Sample rate a module starts with until a registry or parent configures it.
pub const DEFAULT_SAMPLE_RATE: u32 = 8192;

/// Bin math assumes the FFT length is a power of two.
pub fn is_valid_window_size(size: usize) -> bool {
    size.is_power_of_two()
}

/// Gives trait objects access to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed handle to a module owned by a parent module or a registry.
pub struct ModuleId<M> {
    index: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M> ModuleId<M> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl<M> Clone for ModuleId<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for ModuleId<M> {}

impl<M> fmt::Debug for ModuleId<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.index)
    }
}

impl<M> PartialEq for ModuleId<M> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<M> Eq for ModuleId<M> {}

pub(crate) fn downcast_ref<M: AnalysisModule>(module: &dyn AnalysisModule) -> Option<&M> {
    AsAny::as_any(module).downcast_ref::<M>()
}

pub(crate) fn downcast_mut<M: AnalysisModule>(module: &mut dyn AnalysisModule) -> Option<&mut M> {
    AsAny::as_any_mut(module).downcast_mut::<M>()
}

/// Result of a module's most recent analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModuleOutput<'a> {
    Scalar(f32),
    Flag(bool),
    /// One value per bin
    Values(&'a [f32]),
    /// Bin indices
    Bins(&'a [usize]),
    Peaks(&'a PeakList),
    Bands(&'a [FrequencyBand]),
}

impl<'a> ModuleOutput<'a> {
    pub fn as_scalar(&self) -> Option<f32> {
        match *self {
            ModuleOutput::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            ModuleOutput::Flag(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_values(&self) -> Option<&'a [f32]> {
        match *self {
            ModuleOutput::Values(v) => Some(v),
            _ => None,
        }
    }
}

/// Configuration shared by every module, plus the submodules it owns.
///
/// Configuration is pushed down to submodules when it is written, so analysis
/// never has to consult a parent.
pub struct ModuleBase {
    window_size: usize,
    sample_rate: u32,
    lower_bin: usize,
    upper_bin: usize,
    submodules: Vec<Box<dyn AnalysisModule>>,
}

impl Default for ModuleBase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.submodules.iter().map(|m| m.name()).collect();
        f.debug_struct("ModuleBase")
            .field("window_size", &self.window_size)
            .field("sample_rate", &self.sample_rate)
            .field("range", &(self.lower_bin..self.upper_bin))
            .field("submodules", &names)
            .finish()
    }
}

impl ModuleBase {
    pub fn new() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            lower_bin: 0,
            upper_bin: DEFAULT_WINDOW_SIZE / 2,
            submodules: Vec::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_bins(&self) -> usize {
        self.window_size / 2
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.window_size as f32
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn lower_bin(&self) -> usize {
        self.lower_bin
    }

    pub fn upper_bin(&self) -> usize {
        self.upper_bin
    }

    pub fn range(&self) -> Range<usize> {
        self.lower_bin..self.upper_bin
    }

    /// The analysis range clamped to a window of `len` bins. Never inverted.
    pub fn range_within(&self, len: usize) -> Range<usize> {
        let upper = self.upper_bin.min(len);
        self.lower_bin.min(upper)..upper
    }

    pub fn freq_to_bin(&self, hz: f32) -> usize {
        (hz / self.bin_width()).round() as usize
    }

    /// Center frequency of a bin.
    pub fn bin_center(&self, bin: usize) -> f32 {
        let width = self.bin_width();
        bin as f32 * width + width / 2.0
    }

    /// Takes ownership of `module`, hands it this module's current
    /// configuration and returns a handle to reach it again.
    pub fn add_submodule<M: AnalysisModule>(&mut self, mut module: M) -> ModuleId<M> {
        propagate_window_size(&mut module, self.window_size);
        propagate_sample_rate(&mut module, self.sample_rate);
        propagate_range(&mut module, self.lower_bin, self.upper_bin);

        self.submodules.push(Box::new(module));
        ModuleId::new(self.submodules.len() - 1)
    }

    pub fn submodule<M: AnalysisModule>(&self, id: ModuleId<M>) -> Option<&M> {
        let module: &dyn AnalysisModule = self.submodules.get(id.index)?.as_ref();
        downcast_ref(module)
    }

    pub fn submodule_mut<M: AnalysisModule>(&mut self, id: ModuleId<M>) -> Option<&mut M> {
        let module: &mut dyn AnalysisModule = self.submodules.get_mut(id.index)?.as_mut();
        downcast_mut(module)
    }

    pub fn submodules(&self) -> impl Iterator<Item = &dyn AnalysisModule> + '_ {
        self.submodules.iter().map(|m| m.as_ref())
    }

    pub fn num_submodules(&self) -> usize {
        self.submodules.len()
    }

    fn check_bin_range(&self, lower: usize, upper: usize) -> ConfigResult<()> {
        if lower > upper || upper > self.num_bins() {
            return Err(ConfigError::InvalidBinRange {
                lower,
                upper,
                num_bins: self.num_bins(),
            });
        }
        Ok(())
    }

    fn check_freq_range(&self, lower: f32, upper: f32) -> ConfigResult<(usize, usize)> {
        let nyquist = self.nyquist();
        // written so that NaN fails every comparison
        if !(lower >= 0.0 && lower <= upper && upper <= nyquist) {
            return Err(ConfigError::InvalidFreqRange {
                lower,
                upper,
                nyquist,
            });
        }
        let lower_bin = self.freq_to_bin(lower).min(self.num_bins());
        let upper_bin = self.freq_to_bin(upper).min(self.num_bins());
        Ok((lower_bin, upper_bin))
    }
}

/// One analysis behavior.
///
/// Implementors own a [`ModuleBase`] and write their result during
/// [`do_analysis`](AnalysisModule::do_analysis). The configuration setters are
/// provided: they validate, log and reject bad input, and cascade accepted
/// values through every owned submodule.
pub trait AnalysisModule: AsAny + Send {
    fn name(&self) -> &'static str;

    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    /// Analyzes the spectrogram's current state over the configured range.
    fn do_analysis(&mut self, spectrogram: &Spectrogram);

    fn output(&self) -> ModuleOutput<'_>;

    /// Called after the window size or sample rate changed, once the new
    /// values are in place. Resize output storage here.
    fn on_reconfigure(&mut self) {}

    fn analysis_range(&self) -> Range<usize> {
        self.base().range()
    }

    fn set_window_size(&mut self, size: usize) -> ConfigResult<()> {
        if !is_valid_window_size(size) {
            let err = ConfigError::InvalidWindowSize(size);
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        propagate_window_size(self, size);
        Ok(())
    }

    fn set_sample_rate(&mut self, rate: u32) -> ConfigResult<()> {
        if rate == 0 {
            let err = ConfigError::InvalidSampleRate(rate);
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        propagate_sample_rate(self, rate);
        Ok(())
    }

    fn set_analysis_range_by_bin(&mut self, lower: usize, upper: usize) -> ConfigResult<()> {
        if let Err(err) = self.base().check_bin_range(lower, upper) {
            log::warn!("{}: {}", self.name(), err);
            return Err(err);
        }
        propagate_range(self, lower, upper);
        Ok(())
    }

    fn set_analysis_range_by_freq(&mut self, lower_hz: f32, upper_hz: f32) -> ConfigResult<()> {
        match self.base().check_freq_range(lower_hz, upper_hz) {
            Ok((lower, upper)) => {
                propagate_range(self, lower, upper);
                Ok(())
            }
            Err(err) => {
                log::warn!("{}: {}", self.name(), err);
                Err(err)
            }
        }
    }

    fn add_submodule<M: AnalysisModule>(&mut self, module: M) -> ModuleId<M>
    where
        Self: Sized,
    {
        self.base_mut().add_submodule(module)
    }
}

/// Writes an already validated window size through `module` and its
/// descendants. A new window size resets the range to the full spectrum.
pub(crate) fn propagate_window_size<M: AnalysisModule + ?Sized>(module: &mut M, size: usize) {
    let base = module.base_mut();
    base.window_size = size;
    base.lower_bin = 0;
    base.upper_bin = size / 2;
    for child in base.submodules.iter_mut() {
        propagate_window_size(child.as_mut(), size);
    }
    module.on_reconfigure();
}

pub(crate) fn propagate_sample_rate<M: AnalysisModule + ?Sized>(module: &mut M, rate: u32) {
    let base = module.base_mut();
    base.sample_rate = rate;
    for child in base.submodules.iter_mut() {
        propagate_sample_rate(child.as_mut(), rate);
    }
    module.on_reconfigure();
}

pub(crate) fn propagate_range<M: AnalysisModule + ?Sized>(
    module: &mut M,
    lower: usize,
    upper: usize,
) {
    let base = module.base_mut();
    base.lower_bin = lower;
    base.upper_bin = upper;
    for child in base.submodules.iter_mut() {
        propagate_range(child.as_mut(), lower, upper);
    }
}
