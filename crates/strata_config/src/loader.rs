//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::OptimizerConfig;
use std::path::Path;

/// File name looked up next to the design when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Loads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<OptimizerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<OptimizerConfig, ConfigError> {
    let config: OptimizerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges the optimizer relies on.
pub(crate) fn validate_config(config: &OptimizerConfig) -> Result<(), ConfigError> {
    if config.planes.max_plane == 0 || config.planes.max_plane > 64 {
        return Err(ConfigError::ValidationError(format!(
            "planes.max_plane must be in 1..=64, got {}",
            config.planes.max_plane
        )));
    }
    if config.graph.max_nodes < 2 {
        return Err(ConfigError::ValidationError(
            "graph.max_nodes must be at least 2".to_string(),
        ));
    }
    if config.realization.plane_block.is_empty() {
        return Err(ConfigError::ValidationError(
            "realization.plane_block must not be empty".to_string(),
        ));
    }
    if !(config.relaxation.tolerance > 0.0) {
        return Err(ConfigError::ValidationError(
            "relaxation.tolerance must be positive".to_string(),
        ));
    }
    if let Some(command) = &config.flow.steiner_command {
        if command.is_empty() {
            return Err(ConfigError::ValidationError(
                "flow.steiner_command must name a program".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PassKind, RollbackPolicy};

    #[test]
    fn empty_file_is_default() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, OptimizerConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[planes]
max_plane = 4
max_distance = 6

[graph]
max_nodes = 32

[partition]
max_passes = 2
max_iterations = 5
rollback = "net"

[relaxation]
iterations = 3
max_solver_iterations = 100
tolerance = 1e-4

[flow]
passes = ["relaxation"]
steiner_command = ["flute", "-"]

[realization]
plane_block = "fle"
chain_port = "carry_in"
clb_types = ["clb", "lab"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.planes.max_plane, 4);
        assert_eq!(config.planes.max_distance, 6);
        assert_eq!(config.graph.max_nodes, 32);
        assert_eq!(config.partition.rollback, RollbackPolicy::Net);
        assert_eq!(config.relaxation.iterations, 3);
        assert_eq!(config.flow.passes, vec![PassKind::Relaxation]);
        assert_eq!(
            config.flow.steiner_command.as_deref(),
            Some(&["flute".to_string(), "-".to_string()][..])
        );
        assert_eq!(config.realization.plane_block, "fle");
        assert_eq!(config.realization.clb_types.len(), 2);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = load_config_from_str("[planes]\nmax_plane = 6\n").unwrap();
        assert_eq!(config.planes.max_plane, 6);
        assert_eq!(config.planes.max_distance, 10);
    }

    #[test]
    fn zero_planes_rejected() {
        let err = load_config_from_str("[planes]\nmax_plane = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn tiny_max_nodes_rejected() {
        let err = load_config_from_str("[graph]\nmax_nodes = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_pass_is_parse_error() {
        let err = load_config_from_str("[flow]\npasses = [\"annealing\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_key_is_parse_error() {
        let err = load_config_from_str("[planes]\nmax_layers = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[relaxation]\niterations = 7\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.relaxation.iterations, 7);
    }

    #[test]
    fn io_error_from_missing_file() {
        let err = load_config(Path::new("/nonexistent/strata.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
