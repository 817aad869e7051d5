use super::amplitude::{MaxAmplitude, MeanAmplitude, TotalAmplitude};
use super::delta::DeltaAmplitudes;
use super::module::{AnalysisModule, ModuleBase, ModuleId, ModuleOutput};
use super::spectrogram::Spectrogram;
use crate::error::{ConfigError, ConfigResult};

/// Peak to mean ratio at which a window stops counting as noise at all.
const TONAL_RATIO: f32 = 66.7;

pub const DEFAULT_LOUDNESS_THRESHOLD: f32 = 60.0;
pub const DEFAULT_DELTA_THRESHOLD: f32 = 0.8 * DEFAULT_LOUDNESS_THRESHOLD;
pub const DEFAULT_NOISE_THRESHOLD: f32 = 0.85;

/// How flat the spectrum is. Close to 1 for broadband noise, lower for
/// windows dominated by a few strong bins, 0 for near silence.
pub fn noisiness(mean: f32, max: f32) -> f32 {
    if mean > 1.0 {
        1.0 - (max / mean) / TONAL_RATIO
    } else {
        0.0
    }
}

#[derive(Debug)]
pub struct Noisiness {
    base: ModuleBase,
    mean: ModuleId<MeanAmplitude>,
    max: ModuleId<MaxAmplitude>,
    noisiness: f32,
}

impl Default for Noisiness {
    fn default() -> Self {
        let mut base = ModuleBase::new();
        let mean = base.add_submodule(MeanAmplitude::new());
        let max = base.add_submodule(MaxAmplitude::new());
        Self {
            base,
            mean,
            max,
            noisiness: 0.0,
        }
    }
}

impl Noisiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn noisiness(&self) -> f32 {
        self.noisiness
    }
}

impl AnalysisModule for Noisiness {
    fn name(&self) -> &'static str {
        "noisiness"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        let mean = match self.base.submodule_mut(self.mean) {
            Some(module) => {
                module.do_analysis(spectrogram);
                module.mean()
            }
            None => return,
        };
        let max = match self.base.submodule_mut(self.max) {
            Some(module) => {
                module.do_analysis(spectrogram);
                module.max()
            }
            None => return,
        };
        self.noisiness = noisiness(mean, max);
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Scalar(self.noisiness)
    }
}

/// Flags loud, broadband windows such as drum hits. With
/// [`set_require_onset`](Self::set_require_onset) the window must also differ
/// enough from the previous one, which keeps sustained noise from triggering.
#[derive(Debug)]
pub struct PercussionDetection {
    base: ModuleBase,
    total: ModuleId<TotalAmplitude>,
    noisiness: ModuleId<Noisiness>,
    delta: ModuleId<DeltaAmplitudes>,
    loudness_threshold: f32,
    delta_threshold: f32,
    noise_threshold: f32,
    require_onset: bool,
    detected: bool,
}

impl Default for PercussionDetection {
    fn default() -> Self {
        let mut base = ModuleBase::new();
        let total = base.add_submodule(TotalAmplitude::new());
        let noisiness = base.add_submodule(Noisiness::new());
        let delta = base.add_submodule(DeltaAmplitudes::new());
        Self {
            base,
            total,
            noisiness,
            delta,
            loudness_threshold: DEFAULT_LOUDNESS_THRESHOLD,
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            require_onset: false,
            detected: false,
        }
    }
}

impl PercussionDetection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(loudness: f32, delta: f32, noise: f32) -> ConfigResult<Self> {
        let mut module = Self::default();
        module.set_thresholds(loudness, delta, noise)?;
        Ok(module)
    }

    pub fn set_thresholds(&mut self, loudness: f32, delta: f32, noise: f32) -> ConfigResult<()> {
        for (name, value) in [
            ("loudness_threshold", loudness),
            ("delta_threshold", delta),
            ("noise_threshold", noise),
        ] {
            if !value.is_finite() || value < 0.0 {
                let err = ConfigError::InvalidValue(name, format!("{value} is not a valid threshold"));
                log::warn!("{}: {}", self.name(), err);
                return Err(err);
            }
        }
        self.loudness_threshold = loudness;
        self.delta_threshold = delta;
        self.noise_threshold = noise;
        Ok(())
    }

    pub fn thresholds(&self) -> (f32, f32, f32) {
        (
            self.loudness_threshold,
            self.delta_threshold,
            self.noise_threshold,
        )
    }

    /// Also require the summed frame-to-frame change to reach the delta
    /// threshold. Off by default.
    pub fn set_require_onset(&mut self, require: bool) {
        self.require_onset = require;
    }

    pub fn requires_onset(&self) -> bool {
        self.require_onset
    }

    pub fn detected(&self) -> bool {
        self.detected
    }
}

impl AnalysisModule for PercussionDetection {
    fn name(&self) -> &'static str {
        "percussion"
    }

    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    fn do_analysis(&mut self, spectrogram: &Spectrogram) {
        self.detected = false;

        let Some(total) = self.base.submodule_mut(self.total) else {
            return;
        };
        total.do_analysis(spectrogram);
        let total = total.total();

        let Some(noisiness) = self.base.submodule_mut(self.noisiness) else {
            return;
        };
        noisiness.do_analysis(spectrogram);
        let noisiness = noisiness.noisiness();

        let onset = if self.require_onset {
            let Some(delta) = self.base.submodule_mut(self.delta) else {
                return;
            };
            delta.do_analysis(spectrogram);
            delta.total() >= self.delta_threshold
        } else {
            true
        };

        self.detected =
            total >= self.loudness_threshold && noisiness >= self.noise_threshold && onset;
        if self.detected {
            log::trace!("percussion: total {total:.1}, noisiness {noisiness:.3}");
        }
    }

    fn output(&self) -> ModuleOutput<'_> {
        ModuleOutput::Flag(self.detected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_spectrum_is_noisy() {
        let mut spectrogram = Spectrogram::new(2, 8);
        spectrogram.push_window(&[10.0; 8]);

        let mut module = Noisiness::new();
        module.set_window_size(16).unwrap();
        module.do_analysis(&spectrogram);
        assert!((module.noisiness() - (1.0 - 1.0 / 66.7)).abs() < 1e-6);
    }

    #[test]
    fn quiet_window_has_zero_noisiness() {
        assert_eq!(noisiness(1.0, 50.0), 0.0);
        assert_eq!(noisiness(0.0, 0.0), 0.0);
    }

    #[test]
    fn single_tone_is_not_noisy() {
        // mean 2, max 128: ratio 64
        let value = noisiness(2.0, 128.0);
        assert!(value < 0.1);
    }

    #[test]
    fn sustained_noise_triggers_by_default() {
        let mut spectrogram = Spectrogram::new(4, 8);
        let mut module = PercussionDetection::new();
        module.set_window_size(16).unwrap();
        assert!(!module.requires_onset());

        spectrogram.push_window(&[10.0; 8]);
        spectrogram.push_window(&[10.0; 8]);
        module.do_analysis(&spectrogram);
        assert!(module.detected());
    }

    #[test]
    fn detects_loud_broadband_onset() {
        let mut spectrogram = Spectrogram::new(4, 8);
        let mut module = PercussionDetection::new();
        module.set_window_size(16).unwrap();
        module.set_require_onset(true);

        spectrogram.push_window(&[0.0; 8]);
        module.do_analysis(&spectrogram);
        assert!(!module.detected());

        spectrogram.push_window(&[10.0; 8]);
        module.do_analysis(&spectrogram);
        assert!(module.detected());
        assert_eq!(module.output().as_flag(), Some(true));

        // sustained: loud and noisy but unchanged
        spectrogram.push_window(&[10.0; 8]);
        module.do_analysis(&spectrogram);
        assert!(!module.detected());
    }

    #[test]
    fn tonal_onset_is_not_percussion() {
        // with 128 bins a lone tone pushes the peak to mean ratio past 66.7
        let mut spectrogram = Spectrogram::new(4, 128);
        let mut module = PercussionDetection::new();

        spectrogram.push_window(&[0.0; 128]);
        let mut tone = [1.0; 128];
        tone[3] = 500.0;
        spectrogram.push_window(&tone);
        module.do_analysis(&spectrogram);
        assert!(!module.detected());
    }

    #[test]
    fn rejects_negative_thresholds() {
        let mut module = PercussionDetection::new();
        assert!(module.set_thresholds(-1.0, 10.0, 0.5).is_err());
        assert!(module.set_thresholds(1.0, f32::NAN, 0.5).is_err());
        assert_eq!(
            module.thresholds(),
            (
                DEFAULT_LOUDNESS_THRESHOLD,
                DEFAULT_DELTA_THRESHOLD,
                DEFAULT_NOISE_THRESHOLD
            )
        );
        let module = PercussionDetection::with_thresholds(10.0, 5.0, 0.5).unwrap();
        assert_eq!(module.thresholds(), (10.0, 5.0, 0.5));
    }
}
