pub mod config;
pub mod gst_utils;
pub mod linker;
pub mod pipeline;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use linker::{LinkOutcome, MediaKind, PadLinker};
pub use pipeline::events::{BusEvent, SessionEnd};
pub use pipeline::Session;

// Common error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynamicPipelineError {
    #[error("GStreamer initialization failed: {0}")]
    Init(#[source] gst::glib::Error),

    #[error("Missing required GStreamer elements: {0:?}")]
    MissingElements(Vec<String>),

    #[error("Failed to create element '{name}' from factory '{factory}': {source}")]
    ElementCreation {
        factory: String,
        name: String,
        #[source]
        source: gst::glib::BoolError,
    },

    #[error("Failed to add elements to pipeline: {0}")]
    Assembly(#[source] gst::glib::BoolError),

    #[error("Elements could not be linked: {0}")]
    StaticLink(#[source] gst::glib::BoolError),

    #[error("State change error: {0}")]
    StateChange(#[from] gst::StateChangeError),

    #[error("Pipeline {0} has no bus")]
    NoBus(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, DynamicPipelineError>;
