//! Helpers that squeeze analysis output into what a haptic driver can play.

use serde::Deserialize;

/// Default ceiling of the haptic frequency range in Hz.
pub const DEFAULT_HAPTIC_MAX_HZ: f32 = 250.0;

/// Offset added by the linear curve so no output lands below what a driver
/// can reproduce.
const LINEAR_FLOOR_HZ: f32 = 20.0;

/// Frequencies at or below this are already playable and left alone by the
/// exponential curve.
const HAPTIC_PASSTHROUGH_HZ: f32 = 50.0;

/// Normalizes `amps` so they sum to 1, or to less than 1 when their sum is
/// below `min_sum`. A silent buffer is left untouched.
pub fn map_amplitudes(amps: &mut [f32], min_sum: f32) {
    let sum: f32 = amps.iter().sum();
    if sum == 0.0 {
        return;
    }
    let scale = 1.0 / sum.max(min_sum);
    for amp in amps.iter_mut() {
        *amp *= scale;
    }
}

pub fn map_frequencies_linear(freqs: &mut [f32], sample_rate: u32, max_hz: f32) {
    let nyquist = sample_rate as f32 / 2.0;
    for freq in freqs.iter_mut() {
        *freq = (*freq / nyquist * max_hz).round() + LINEAR_FLOOR_HZ;
    }
}

/// Maps frequencies above 50 Hz onto `(f / nyquist)^exp * max_hz`.
pub fn map_frequencies_exponential(freqs: &mut [f32], sample_rate: u32, exp: f32, max_hz: f32) {
    let nyquist = sample_rate as f32 / 2.0;
    for freq in freqs.iter_mut() {
        if *freq <= HAPTIC_PASSTHROUGH_HZ {
            continue;
        }
        *freq = (*freq / nyquist).powf(exp) * max_hz;
    }
}

/// Refines the frequency of a peak using the balance of its two neighbors.
///
/// Returns whole Hz. Missing neighbors at the window edges count as zero.
pub fn interpolate_around_peak(window: &[f32], bin: usize, bin_width: f32) -> f32 {
    let Some(&at) = window.get(bin) else {
        return 0.0;
    };
    let before = if bin == 0 { 0.0 } else { window[bin - 1] };
    let after = window.get(bin + 1).copied().unwrap_or(0.0);

    let sum = before + at + after;
    let shift = (after - before) / if sum > 0.0 { sum } else { 1.0 };
    ((bin as f32 + shift) * bin_width).round()
}

/// How peak frequencies are folded into the haptic range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum FrequencyCurve {
    /// Report frequencies as analyzed
    #[default]
    None,
    Linear,
    Exponential { exponent: f32 },
}

impl FrequencyCurve {
    pub fn apply(&self, freqs: &mut [f32], sample_rate: u32, max_hz: f32) {
        match *self {
            FrequencyCurve::None => {}
            FrequencyCurve::Linear => map_frequencies_linear(freqs, sample_rate, max_hz),
            FrequencyCurve::Exponential { exponent } => {
                map_frequencies_exponential(freqs, sample_rate, exponent, max_hz)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitudes_sum_to_one() {
        let mut amps = [1.0, 3.0, 4.0];
        map_amplitudes(&mut amps, 0.0);
        assert_eq!(amps, [0.125, 0.375, 0.5]);
    }

    #[test]
    fn quiet_amplitudes_use_min_sum() {
        let mut amps = [1.0, 1.0];
        map_amplitudes(&mut amps, 8.0);
        assert_eq!(amps, [0.125, 0.125]);

        let mut silent = [0.0; 4];
        map_amplitudes(&mut silent, 8.0);
        assert_eq!(silent, [0.0; 4]);
    }

    #[test]
    fn linear_mapping_scales_to_haptic_range() {
        let mut freqs = [0.0, 2048.0, 4096.0];
        map_frequencies_linear(&mut freqs, 8192, 250.0);
        assert_eq!(freqs, [20.0, 145.0, 270.0]);
    }

    #[test]
    fn exponential_mapping_skips_low_frequencies() {
        let mut freqs = [40.0, 2048.0, 4096.0];
        map_frequencies_exponential(&mut freqs, 8192, 2.0, 250.0);
        assert_eq!(freqs[0], 40.0);
        assert!((freqs[1] - 62.5).abs() < 1e-4);
        assert!((freqs[2] - 250.0).abs() < 1e-4);
    }

    #[test]
    fn interpolation_leans_towards_heavier_neighbor() {
        let window = [0.0, 2.0, 6.0, 2.0, 0.0];
        assert_eq!(interpolate_around_peak(&window, 2, 32.0), 64.0);

        let window = [0.0, 0.0, 4.0, 4.0, 0.0];
        // shift of +0.5 bins
        assert_eq!(interpolate_around_peak(&window, 2, 32.0), 80.0);

        assert_eq!(interpolate_around_peak(&window, 0, 32.0), 0.0);
        assert_eq!(interpolate_around_peak(&window, 9, 32.0), 0.0);
    }

    #[test]
    fn curve_deserializes_from_tag() {
        let curve: FrequencyCurve = toml::from_str("curve = \"exponential\"\nexponent = 0.5").unwrap();
        assert_eq!(curve, FrequencyCurve::Exponential { exponent: 0.5 });
        let curve: FrequencyCurve = toml::from_str("curve = \"linear\"").unwrap();
        assert_eq!(curve, FrequencyCurve::Linear);
    }
}
