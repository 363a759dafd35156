use std::io;

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Offending file.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A config file is not valid TOML or does not match the schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// Offending file, or a placeholder such as `<merged config>`.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// An environment variable could not be interpreted.
    #[error("invalid environment variable {var}: {message}")]
    EnvError {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        message: String,
    },

    /// The user's home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
