use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Streams an audio file as mono `f32` samples, one packet at a time.
pub struct AudioStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    total_frames: Option<u64>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioStream {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Failed to probe audio format")?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio tracks found")?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
        let total_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        log::info!(
            "Opened {}: {}Hz, {} channel(s){}",
            path.display(),
            sample_rate,
            channels,
            total_frames
                .map(|n| format!(", {:.1}s", n as f32 / sample_rate as f32))
                .unwrap_or_default()
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            total_frames,
            sample_buf: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the track in mono samples, when the container reports it.
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Replaces `out` with the next packet's samples, downmixed to mono.
    /// Returns `false` once the stream is exhausted.
    pub fn next_chunk(&mut self, out: &mut Vec<f32>) -> Result<bool> {
        out.clear();
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let duration = decoded.capacity() as u64;
            let too_small = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| (buf.capacity() as u64) < duration * channels as u64);
            if too_small {
                self.sample_buf = None;
            }
            let sample_buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::<f32>::new(duration, spec));
            sample_buf.copy_interleaved_ref(decoded);

            let samples = sample_buf.samples();
            if channels == 1 {
                out.extend_from_slice(samples);
            } else {
                out.extend(
                    samples
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            return Ok(true);
        }
    }
}
