use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "audioprism", about = "Spectral analysis of audio files for haptic playback")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output report, one JSON object per analyzed frame
    #[arg(short, long, default_value = "analysis.jsonl")]
    pub output: PathBuf,

    /// Config file (defaults to ./audioprism.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// FFT window size in samples, a power of two
    #[arg(long, default_value_t = 256)]
    pub window_size: usize,

    /// Frames of spectrogram history
    #[arg(long, default_value_t = 8)]
    pub history: usize,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// List available analysis modules and exit
    #[arg(long)]
    pub list_modules: bool,
}
