//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and the scenario run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ciam_core::config::ConfigError,
    },

    /// A scenario document could not be read.
    #[error("document error in {}: {source}", path.display())]
    Document {
        /// The document that failed.
        path: std::path::PathBuf,
        /// The underlying document error.
        source: ciam_core::document::DocumentError,
    },

    /// The scenario is incomplete or its world rejected its definition.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: ciam_core::scenario::ScenarioError,
    },

    /// The run could not start.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: ciam_core::runner::RunError,
    },

    /// An output could not be opened.
    #[error("output error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: ciam_core::sinks::SinkError,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        /// The directory.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
