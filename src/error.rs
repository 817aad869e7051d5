//! Configuration error types

use thiserror::Error;

/// Rejected configuration calls. The target keeps its previous valid state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Window size is zero or not a power of two
    #[error("window size {0} is not a positive power of two")]
    InvalidWindowSize(usize),

    /// Sample rate of zero
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(u32),

    /// Bin range outside `0 <= lower <= upper <= window_size / 2`
    #[error("invalid bin range [{lower}, {upper}) for {num_bins} bins")]
    InvalidBinRange {
        lower: usize,
        upper: usize,
        num_bins: usize,
    },

    /// Frequency range outside `0 <= lower <= upper <= sample_rate / 2`
    #[error("invalid frequency range [{lower} Hz, {upper} Hz) for nyquist {nyquist} Hz")]
    InvalidFreqRange { lower: f32, upper: f32, nyquist: f32 },

    /// Band boundary list that cannot partition a window
    #[error("invalid band boundaries: {0}")]
    InvalidBands(String),

    /// Module parameter out of its accepted domain
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
