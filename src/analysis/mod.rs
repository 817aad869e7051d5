pub mod amplitude;
pub mod bands;
pub mod centroid;
pub mod delta;
pub mod mapping;
pub mod module;
pub mod noise_floor;
pub mod noisiness;
pub mod peaks;
pub mod salience;
pub mod spectrogram;

pub use amplitude::{MaxAmplitude, MeanAmplitude, TotalAmplitude};
pub use bands::{BandSlicer, FrequencyBand};
pub use centroid::Centroid;
pub use delta::DeltaAmplitudes;
pub use mapping::FrequencyCurve;
pub use module::{AnalysisModule, ModuleBase, ModuleId, ModuleOutput};
pub use noise_floor::NoiseFloor;
pub use noisiness::{Noisiness, PercussionDetection};
pub use peaks::{MajorPeaks, Peak, PeakList, Plane};
pub use salience::SalientFreqs;
pub use spectrogram::Spectrogram;
