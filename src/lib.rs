pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod report;

pub use error::{ConfigError, ConfigResult};
pub use pipeline::Pipeline;
pub use registry::Registry;
