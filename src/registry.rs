//! Owner of the spectrogram and of every top level analysis module.

use crate::analysis::module::{
    downcast_mut, downcast_ref, is_valid_window_size, propagate_sample_rate,
    propagate_window_size, AnalysisModule, ModuleId, ModuleOutput,
};
use crate::analysis::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

/// Room for a typical module set without reallocating.
const MODULE_CAPACITY: usize = 16;

/// Runs a fixed window size and sample rate through an ordered list of
/// modules. Modules run in the order they were added.
pub struct Registry {
    window_size: usize,
    sample_rate: u32,
    spectrogram: Spectrogram,
    modules: Vec<Box<dyn AnalysisModule>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("window_size", &self.window_size)
            .field("sample_rate", &self.sample_rate)
            .field("history", &self.spectrogram.num_windows())
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new(window_size: usize, sample_rate: u32, history: usize) -> ConfigResult<Self> {
        if !is_valid_window_size(window_size) {
            let err = ConfigError::InvalidWindowSize(window_size);
            log::warn!("Registry: {}", err);
            return Err(err);
        }
        if sample_rate == 0 {
            let err = ConfigError::InvalidSampleRate(sample_rate);
            log::warn!("Registry: {}", err);
            return Err(err);
        }
        log::debug!(
            "Registry: window {}, {} Hz, {} frames of history",
            window_size,
            sample_rate,
            history
        );
        Ok(Self {
            window_size,
            sample_rate,
            spectrogram: Spectrogram::new(history, window_size / 2),
            modules: Vec::with_capacity(MODULE_CAPACITY),
        })
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

    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.window_size as f32
    }

    /// Configures `module` for this registry's window and stores it.
    pub fn add_module<M: AnalysisModule>(&mut self, mut module: M) -> ModuleId<M> {
        propagate_window_size(&mut module, self.window_size);
        propagate_sample_rate(&mut module, self.sample_rate);
        self.push(module)
    }

    /// Like [`add_module`](Self::add_module) but restricts the module to
    /// `[lower_hz, upper_hz]`. A rejected range keeps the module out.
    pub fn add_module_in_range<M: AnalysisModule>(
        &mut self,
        mut module: M,
        lower_hz: f32,
        upper_hz: f32,
    ) -> ConfigResult<ModuleId<M>> {
        propagate_window_size(&mut module, self.window_size);
        propagate_sample_rate(&mut module, self.sample_rate);
        module.set_analysis_range_by_freq(lower_hz, upper_hz)?;
        Ok(self.push(module))
    }

    fn push<M: AnalysisModule>(&mut self, module: M) -> ModuleId<M> {
        log::debug!("Registry: added {} over bins {:?}", module.name(), module.analysis_range());
        self.modules.push(Box::new(module));
        ModuleId::new(self.modules.len() - 1)
    }

    pub fn module<M: AnalysisModule>(&self, id: ModuleId<M>) -> Option<&M> {
        downcast_ref(self.modules.get(id.index())?.as_ref())
    }

    pub fn module_mut<M: AnalysisModule>(&mut self, id: ModuleId<M>) -> Option<&mut M> {
        downcast_mut(self.modules.get_mut(id.index())?.as_mut())
    }

    /// First module of type `M`, for callers that did not keep its id.
    pub fn find<M: AnalysisModule>(&self) -> Option<&M> {
        self.modules.iter().find_map(|m| downcast_ref(m.as_ref()))
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn AnalysisModule> + '_ {
        self.modules.iter().map(|m| m.as_ref())
    }

    /// Name and latest result of every module, in insertion order.
    pub fn outputs(&self) -> impl Iterator<Item = (&'static str, ModuleOutput<'_>)> + '_ {
        self.modules.iter().map(|m| (m.name(), m.output()))
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn spectrogram(&self) -> &Spectrogram {
        &self.spectrogram
    }

    pub fn push_frame(&mut self, window: &[f32]) {
        self.spectrogram.push_window(window);
    }

    pub fn analyze_all(&mut self) {
        for module in self.modules.iter_mut() {
            module.do_analysis(&self.spectrogram);
        }
    }

    pub fn process_frame(&mut self, window: &[f32]) {
        self.push_frame(window);
        self.analyze_all();
    }

    /// Forgets all history. Modules keep their configuration.
    pub fn clear(&mut self) {
        self.spectrogram.clear();
    }
}
