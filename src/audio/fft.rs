use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::analysis::module::is_valid_window_size;
use crate::error::{ConfigError, ConfigResult};

/// Turns blocks of `window_size` raw samples into `window_size / 2` bin
/// magnitudes. The block mean is removed and a Hamming window applied before
/// the transform. Buffers are planned once and reused for every block.
pub struct SpectrumAnalyzer {
    window_size: usize,
    fft: Arc<dyn Fft<f32>>,
    hamming: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize) -> ConfigResult<Self> {
        if !is_valid_window_size(window_size) {
            return Err(ConfigError::InvalidWindowSize(window_size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Ok(Self {
            window_size,
            fft,
            hamming: hamming_window(window_size),
            buffer: vec![Complex::default(); window_size],
            scratch,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn num_bins(&self) -> usize {
        self.window_size / 2
    }

    /// Writes the magnitudes of `samples` into `out`. Short input is zero
    /// padded; `out` is resized to the bin count.
    pub fn process(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let n = samples.len().min(self.window_size);
        let mean = if n == 0 {
            0.0
        } else {
            samples[..n].iter().sum::<f32>() / n as f32
        };

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < n { samples[i] - mean } else { 0.0 };
            *slot = Complex::new(sample * self.hamming[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        out.clear();
        out.extend(self.buffer[..self.num_bins()].iter().map(|c| c.norm()));
    }
}

fn hamming_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / (size - 1) as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(SpectrumAnalyzer::new(100).is_err());
        assert!(SpectrumAnalyzer::new(0).is_err());
    }

    #[test]
    fn constant_input_has_no_energy() {
        let mut analyzer = SpectrumAnalyzer::new(64).unwrap();
        let mut out = Vec::new();
        analyzer.process(&[2048.0; 64], &mut out);
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&m| m < 1e-2));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let size = 256;
        let mut analyzer = SpectrumAnalyzer::new(size).unwrap();
        let samples: Vec<f32> = (0..size)
            .map(|i| 2048.0 + 1000.0 * (2.0 * PI * 16.0 * i as f32 / size as f32).sin())
            .collect();
        let mut out = Vec::new();
        analyzer.process(&samples, &mut out);

        let loudest = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(16));
    }

    #[test]
    fn hamming_is_symmetric() {
        let window = hamming_window(8);
        assert!((window[0] - 0.08).abs() < 1e-6);
        for i in 0..4 {
            assert!((window[i] - window[7 - i]).abs() < 1e-6);
        }
    }
}
