//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `strata.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A pass name given on the command line is not known.
    #[error("unknown pass '{0}'")]
    UnknownPass(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_pass() {
        let err = ConfigError::UnknownPass("annealing".to_string());
        assert_eq!(format!("{err}"), "unknown pass 'annealing'");
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("planes.max_plane must be in 1..=64".to_string());
        assert_eq!(
            format!("{err}"),
            "validation error: planes.max_plane must be in 1..=64"
        );
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
