use thiserror::Error;

/// Errors produced by the relay library.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Reading a configuration file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file did not parse as TOML.
    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    /// An HTTP request to an OpenAI-compatible service failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
