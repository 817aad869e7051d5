//! Noise suppression policies applied to a magnitude window in place.

use serde::Deserialize;

/// How to decide which bins are noise. Bins judged to be noise are zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NoiseFloor {
    /// Leave every bin as is.
    #[default]
    None,
    /// Zero bins below an absolute threshold.
    Static { threshold: f32 },
    /// Zero bins at or below `mean * threshold`.
    Mean { threshold: f32 },
    /// Zero bins below `threshold` times a sliding RMS of the window.
    Smart { threshold: f32, window: usize },
    /// Constant false alarm rate: zero bins at or below `bias` times the mean
    /// of the reference cells beyond the guard cells on either side.
    Cfar {
        reference_cells: usize,
        guard_cells: usize,
        bias: f32,
    },
}

impl NoiseFloor {
    pub fn apply(&self, data: &mut [f32]) {
        let mut scratch = Vec::new();
        self.apply_with(data, &mut scratch);
    }

    /// Same as [`apply`](Self::apply) but reuses `scratch` for the policies
    /// that need a copy of the input.
    pub fn apply_with(&self, data: &mut [f32], scratch: &mut Vec<f32>) {
        match *self {
            NoiseFloor::None => {}
            NoiseFloor::Static { threshold } => static_floor(data, threshold),
            NoiseFloor::Mean { threshold } => mean_floor(data, threshold),
            NoiseFloor::Smart { threshold, window } => smart_floor(data, threshold, window, scratch),
            NoiseFloor::Cfar {
                reference_cells,
                guard_cells,
                bias,
            } => cfar_floor(data, reference_cells, guard_cells, bias, scratch),
        }
    }
}

fn mean(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f32>() / data.len() as f32
}

pub fn static_floor(data: &mut [f32], threshold: f32) {
    for value in data.iter_mut() {
        if *value < threshold {
            *value = 0.0;
        }
    }
}

pub fn mean_floor(data: &mut [f32], threshold: f32) {
    let cutoff = mean(data) * threshold;
    for value in data.iter_mut() {
        if *value <= cutoff {
            *value = 0.0;
        }
    }
}

/// Calls `f(i, rms)` with the RMS of a window of `size` squared values
/// starting `size / 2` before each bin. Positions outside the data count as
/// the mean square of the whole window so the edges are not biased towards
/// zero.
fn for_each_rms(squares: &[f32], size: usize, mut f: impl FnMut(usize, f32)) {
    if size == 0 {
        for (i, square) in squares.iter().enumerate() {
            f(i, square.sqrt());
        }
        return;
    }

    let len = squares.len() as isize;
    let pad = mean(squares);
    let at = |idx: isize| -> f32 {
        if idx < 0 || idx >= len {
            pad
        } else {
            squares[idx as usize]
        }
    };

    // summed per window, a running f32 sum cancels out after a strong peak
    let half = (size / 2) as isize;
    let size = size as isize;
    for i in 0..len {
        let start = i - half;
        let sum: f32 = (start..start + size).map(&at).sum();
        f(i as usize, (sum / size as f32).sqrt());
    }
}

pub fn sliding_rms(data: &[f32], size: usize) -> Vec<f32> {
    let squares: Vec<f32> = data.iter().map(|v| v * v).collect();
    let mut out = vec![0.0; data.len()];
    for_each_rms(&squares, size, |i, rms| out[i] = rms);
    out
}

pub fn smart_floor(data: &mut [f32], threshold: f32, size: usize, scratch: &mut Vec<f32>) {
    scratch.clear();
    scratch.extend(data.iter().map(|v| v * v));
    for_each_rms(scratch, size, |i, rms| {
        if data[i] < rms * threshold {
            data[i] = 0.0;
        }
    });
}

pub fn cfar_floor(
    data: &mut [f32],
    reference_cells: usize,
    guard_cells: usize,
    bias: f32,
    scratch: &mut Vec<f32>,
) {
    scratch.clear();
    scratch.extend_from_slice(data);
    let len = data.len();

    for (i, value) in data.iter_mut().enumerate() {
        let left_end = i.saturating_sub(guard_cells);
        let left_start = i.saturating_sub(guard_cells + reference_cells);
        let right_start = (i + guard_cells + 1).min(len);
        let right_end = (i + guard_cells + reference_cells + 1).min(len);

        let cells = (left_end - left_start) + (right_end - right_start);
        if cells == 0 {
            *value = 0.0;
            continue;
        }

        let noise: f32 = scratch[left_start..left_end].iter().sum::<f32>()
            + scratch[right_start..right_end].iter().sum::<f32>();
        let noise = noise / cells as f32;

        if scratch[i] <= noise * bias {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_floor_keeps_bins_above_scaled_mean() {
        let mut data = [10.0, 20.0, 5.0, 1.0];
        NoiseFloor::Mean { threshold: 1.5 }.apply(&mut data);
        assert_eq!(data, [0.0, 20.0, 0.0, 0.0]);
    }

    #[test]
    fn mean_floor_zeroes_values_equal_to_cutoff() {
        let mut data = [2.0, 2.0, 2.0];
        mean_floor(&mut data, 1.0);
        assert_eq!(data, [0.0; 3]);
    }

    #[test]
    fn static_floor_is_idempotent() {
        let original = [0.5, 3.0, 1.0, 0.99, 7.5, 0.0];
        let floor = NoiseFloor::Static { threshold: 1.0 };

        let mut once = original;
        floor.apply(&mut once);
        let mut twice = once;
        floor.apply(&mut twice);

        assert_eq!(once, [0.0, 3.0, 1.0, 0.0, 7.5, 0.0]);
        assert_eq!(once, twice);
    }

    #[test]
    fn sliding_rms_pads_edges_with_mean_square() {
        let rms = sliding_rms(&[2.0, 2.0, 2.0, 2.0], 3);
        for v in rms {
            assert!((v - 2.0).abs() < 1e-6);
        }

        // squares [0, 16, 4] have a mean of 20 / 3, used for out of range cells
        let pad = 20.0f32 / 3.0;
        let rms = sliding_rms(&[0.0, 4.0, 2.0], 3);
        assert!((rms[0] - ((pad + 16.0) / 3.0).sqrt()).abs() < 1e-5);
        assert!((rms[1] - (20.0f32 / 3.0).sqrt()).abs() < 1e-5);
        assert!((rms[2] - ((20.0 + pad) / 3.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn smart_floor_removes_bins_below_local_rms() {
        let mut data = [1.0, 1.0, 1.0, 30.0, 1.0, 1.0, 1.0, 1.0];
        NoiseFloor::Smart {
            threshold: 1.0,
            window: 4,
        }
        .apply(&mut data);
        assert_eq!(data[3], 30.0);
        assert!(data.iter().enumerate().all(|(i, &v)| i == 3 || v == 0.0 || v == 1.0));
        assert_eq!(data[0], 0.0);
    }

    /// Flat floor of 3.0 with one FFT-sized peak near the low end.
    fn floor_with_strong_peak() -> Vec<f32> {
        let mut data = vec![3.0; 128];
        data[4] = 70_000.0;
        data[5] = 141_000.0;
        data[6] = 70_000.0;
        data
    }

    #[test]
    fn sliding_rms_recovers_after_strong_peak() {
        let data = floor_with_strong_peak();
        let rms = sliding_rms(&data, 8);
        for (i, v) in rms.iter().enumerate().take(120).skip(20) {
            assert!((v - 3.0).abs() < 1e-3, "bin {i}: rms {v}");
        }
    }

    #[test]
    fn smart_floor_still_floors_bins_after_strong_peak() {
        let mut data = floor_with_strong_peak();
        smart_floor(&mut data, 1.2, 8, &mut Vec::new());
        assert_eq!(data[5], 141_000.0);
        assert!(data[20..120].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn cfar_keeps_peaks_above_local_noise() {
        let mut data = [1.0, 1.0, 1.0, 1.0, 9.0, 1.0, 1.0, 1.0, 1.0];
        NoiseFloor::Cfar {
            reference_cells: 2,
            guard_cells: 1,
            bias: 2.0,
        }
        .apply(&mut data);
        assert_eq!(data, [0.0, 0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn cfar_excludes_guard_cells_from_estimate() {
        // the neighbors of bin 3 are guard cells, only bins 0 and 6 are references
        let mut data = [1.0, 0.0, 50.0, 10.0, 50.0, 0.0, 1.0];
        cfar_floor(&mut data, 1, 2, 5.0, &mut Vec::new());
        assert_eq!(data[3], 10.0);
    }

    #[test]
    fn cfar_without_reference_cells_zeroes_everything() {
        let mut data = [3.0, 4.0, 5.0];
        NoiseFloor::Cfar {
            reference_cells: 0,
            guard_cells: 1,
            bias: 1.0,
        }
        .apply(&mut data);
        assert_eq!(data, [0.0; 3]);

        let mut single = [8.0];
        cfar_floor(&mut single, 4, 0, 1.0, &mut Vec::new());
        assert_eq!(single, [0.0]);
    }

    #[test]
    fn empty_windows_are_left_alone() {
        let mut empty: [f32; 0] = [];
        for floor in [
            NoiseFloor::Static { threshold: 1.0 },
            NoiseFloor::Mean { threshold: 1.0 },
            NoiseFloor::Smart {
                threshold: 1.0,
                window: 8,
            },
            NoiseFloor::Cfar {
                reference_cells: 2,
                guard_cells: 1,
                bias: 1.0,
            },
        ] {
            floor.apply(&mut empty);
        }
    }

    #[test]
    fn none_policy_is_a_no_op() {
        let mut data = [0.5, 3.0, 0.0];
        NoiseFloor::default().apply(&mut data);
        assert_eq!(data, [0.5, 3.0, 0.0]);
        let floor: NoiseFloor = toml::from_str("policy = \"none\"").unwrap();
        assert_eq!(floor, NoiseFloor::None);
    }

    #[test]
    fn deserializes_tagged_policy() {
        let floor: NoiseFloor =
            toml::from_str("policy = \"cfar\"\nreference_cells = 4\nguard_cells = 2\nbias = 1.5")
                .unwrap();
        assert_eq!(
            floor,
            NoiseFloor::Cfar {
                reference_cells: 4,
                guard_cells: 2,
                bias: 1.5
            }
        );
    }
}
