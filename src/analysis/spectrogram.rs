/// Rolling history of magnitude windows.
///
/// Windows live back to back in one flat buffer. Pushing a new window
/// overwrites the oldest one. `window(0)` is the most recent push, `window(-k)`
/// the one pushed `k` frames earlier.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    buffer: Vec<f32>,
    num_windows: usize,
    num_bins: usize,
    current: usize,
    /// Frames pushed since construction or the last clear, saturating
    pushed: usize,
}

impl Spectrogram {
    pub fn new(num_windows: usize, num_bins: usize) -> Self {
        if num_windows == 0 {
            log::warn!("Spectrogram created with zero capacity; pushes will be ignored");
        }
        Self {
            buffer: vec![0.0; num_windows * num_bins],
            num_windows,
            num_bins,
            current: 0,
            pushed: 0,
        }
    }

    pub fn num_windows(&self) -> usize {
        self.num_windows
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn frames_pushed(&self) -> usize {
        self.pushed
    }

    /// Advances the cursor and copies `data` into the new current slot.
    pub fn push_window(&mut self, data: &[f32]) {
        if self.num_windows == 0 {
            return;
        }
        if data.len() != self.num_bins {
            log::warn!(
                "Spectrogram: pushed window has {} bins, expected {}",
                data.len(),
                self.num_bins
            );
        }

        self.current += 1;
        if self.current == self.num_windows {
            self.current = 0;
        }

        let start = self.current * self.num_bins;
        let slot = &mut self.buffer[start..start + self.num_bins];
        let n = data.len().min(self.num_bins);
        slot[..n].copy_from_slice(&data[..n]);
        slot[n..].fill(0.0);

        self.pushed = self.pushed.saturating_add(1);
    }

    /// Window at `relative_index` frames from the current one. Negative
    /// indices look back in time, anything else wraps around the ring.
    pub fn window(&self, relative_index: isize) -> &[f32] {
        if self.num_windows == 0 {
            return &[];
        }
        let capacity = self.num_windows as isize;
        let index = (self.current as isize + relative_index.rem_euclid(capacity)) % capacity;
        let start = index as usize * self.num_bins;
        &self.buffer[start..start + self.num_bins]
    }

    pub fn current(&self) -> &[f32] {
        self.window(0)
    }

    /// The window pushed one frame ago. Until two frames have been pushed this
    /// is the current window, so frame-to-frame differences start at zero.
    pub fn previous(&self) -> &[f32] {
        if self.pushed < 2 {
            self.current()
        } else {
            self.window(-1)
        }
    }

    /// Zeroes every slot and resets the cursor.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.current = 0;
        self.pushed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_relative_indices() {
        let mut ring = Spectrogram::new(2, 2);
        ring.push_window(&[1.0, 2.0]);
        ring.push_window(&[3.0, 4.0]);
        assert_eq!(ring.window(0), &[3.0, 4.0]);
        assert_eq!(ring.window(-1), &[1.0, 2.0]);
        assert_eq!(ring.window(-2), &[3.0, 4.0]);
        assert_eq!(ring.window(1), &[1.0, 2.0]);
        assert_eq!(ring.window(-5), &[1.0, 2.0]);
        assert_eq!(ring.window(isize::MIN), &[3.0, 4.0]);
    }

    #[test]
    fn keeps_history_of_recent_pushes() {
        let capacity = 4;
        let mut ring = Spectrogram::new(capacity, 3);
        for n in 0..11 {
            let frame = [n as f32, n as f32 * 2.0, n as f32 * 3.0];
            ring.push_window(&frame);
            assert_eq!(ring.window(0), &frame);
            let depth = (n + 1).min(capacity);
            for k in 0..depth {
                let past = (n - k) as f32;
                assert_eq!(ring.window(-(k as isize)), &[past, past * 2.0, past * 3.0]);
            }
        }
    }

    #[test]
    fn previous_aliases_current_on_cold_start() {
        let mut ring = Spectrogram::new(2, 2);
        ring.push_window(&[5.0, 6.0]);
        assert_eq!(ring.previous(), ring.current());
        ring.push_window(&[7.0, 8.0]);
        assert_eq!(ring.previous(), &[5.0, 6.0]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut ring = Spectrogram::new(3, 2);
        ring.push_window(&[1.0, 1.0]);
        ring.push_window(&[2.0, 2.0]);
        ring.clear();
        assert_eq!(ring.current_index(), 0);
        assert_eq!(ring.frames_pushed(), 0);
        for k in 0..3 {
            assert_eq!(ring.window(-k), &[0.0, 0.0]);
        }
    }

    #[test]
    fn short_window_is_zero_padded() {
        let mut ring = Spectrogram::new(2, 4);
        ring.push_window(&[9.0, 9.0, 9.0, 9.0]);
        ring.push_window(&[1.0, 2.0]);
        ring.push_window(&[3.0]);
        assert_eq!(ring.current(), &[3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_capacity_never_indexes() {
        let mut ring = Spectrogram::new(0, 4);
        ring.push_window(&[1.0, 2.0, 3.0, 4.0]);
        assert!(ring.current().is_empty());
        assert!(ring.window(-3).is_empty());
        assert_eq!(ring.frames_pushed(), 0);
    }
}
