//! Lock-free hand-off of raw samples from a sampling callback to the
//! analysis thread.

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

/// Midpoint of a 12 bit ADC, the reading for silence.
pub const ADC_MIDPOINT: u16 = 2048;
/// Largest excursion from the midpoint a full scale sample produces.
pub const ADC_SCALE: f32 = 2047.0;

/// Converts a sample in `[-1, 1]` to the count a 12 bit ADC would read.
pub fn to_adc_counts(sample: f32) -> u16 {
    let centered = (sample.clamp(-1.0, 1.0) * ADC_SCALE).round();
    (ADC_MIDPOINT as f32 + centered) as u16
}

/// Fixed block of samples filled by a single producer and emptied by a
/// single consumer.
///
/// The producer never blocks. Samples arriving while the block is full are
/// dropped and counted until the consumer drains it.
#[derive(Debug)]
pub struct CaptureBuffer {
    samples: Box<[AtomicU16]>,
    write_index: AtomicUsize,
    dropped: AtomicUsize,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: (0..capacity).map(|_| AtomicU16::new(ADC_MIDPOINT)).collect(),
            write_index: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.write_index.load(Ordering::Acquire).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.write_index.load(Ordering::Acquire) >= self.capacity()
    }

    /// Samples lost to a full buffer since construction.
    pub fn dropped_samples(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stores one sample. Returns false if the buffer was full and the sample
    /// was dropped. Must only be called from one producer at a time.
    pub fn record(&self, sample: u16) -> bool {
        // pairs with the Release in reset so the drain is done before reuse
        let index = self.write_index.load(Ordering::Acquire);
        match self.samples.get(index) {
            Some(slot) => {
                slot.store(sample, Ordering::Relaxed);
                self.write_index.store(index + 1, Ordering::Release);
                true
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Copies the recorded samples into `out` as floats, then re-arms the
    /// buffer. Returns how many samples were copied.
    pub fn drain_into(&self, out: &mut Vec<f32>) -> usize {
        let count = self.len();
        out.clear();
        out.extend(
            self.samples[..count]
                .iter()
                .map(|s| s.load(Ordering::Relaxed) as f32),
        );
        self.reset();
        count
    }

    /// Discards whatever was recorded and lets the producer start over.
    pub fn reset(&self) {
        self.write_index.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn adc_conversion_spans_twelve_bits() {
        assert_eq!(to_adc_counts(0.0), 2048);
        assert_eq!(to_adc_counts(1.0), 4095);
        assert_eq!(to_adc_counts(-1.0), 1);
        assert_eq!(to_adc_counts(3.0), 4095);
        assert_eq!(to_adc_counts(0.5), 3072);
    }

    #[test]
    fn drops_samples_when_full() {
        let buffer = CaptureBuffer::new(3);
        assert!(buffer.record(1));
        assert!(buffer.record(2));
        assert!(!buffer.is_full());
        assert!(buffer.record(3));
        assert!(buffer.is_full());
        assert!(!buffer.record(4));
        assert!(!buffer.record(5));
        assert_eq!(buffer.dropped_samples(), 2);

        let mut out = Vec::new();
        assert_eq!(buffer.drain_into(&mut out), 3);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        assert!(buffer.is_empty());
        assert!(buffer.record(6));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn reset_rearms_capture() {
        let buffer = CaptureBuffer::new(2);
        buffer.record(7);
        buffer.record(8);
        buffer.reset();
        assert!(!buffer.is_full());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let buffer = CaptureBuffer::new(0);
        assert!(buffer.is_full());
        assert!(!buffer.record(1));
        assert_eq!(buffer.dropped_samples(), 1);
    }

    /// Streams `total` counter values through a buffer of `capacity` on a
    /// producer thread and returns what the consumer drained.
    fn hand_off(capacity: usize, total: u16) -> Vec<f32> {
        let buffer = Arc::new(CaptureBuffer::new(capacity));
        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                let mut sent = 0u16;
                while sent < total {
                    if buffer.record(sent) {
                        sent += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut received = Vec::new();
        let mut block = Vec::new();
        while received.len() < total as usize {
            if buffer.is_full() {
                buffer.drain_into(&mut block);
                received.extend_from_slice(&block);
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        received
    }

    #[test]
    fn small_blocks_are_never_overwritten_mid_drain() {
        let received = hand_off(4, 4000);
        let expected: Vec<f32> = (0..4000).map(|v| v as f32).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn producer_thread_hands_off_every_block() {
        let received = hand_off(64, 256);
        let expected: Vec<f32> = (0..256).map(|v| v as f32).collect();
        assert_eq!(received, expected);
    }
}
