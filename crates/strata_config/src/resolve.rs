//! Merging command-line overrides onto a loaded configuration.

use crate::error::ConfigError;
use crate::loader::validate_config;
use crate::types::{OptimizerConfig, PassKind};

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Pass names in order, e.g. `["relaxation", "partition"]`.
    pub passes: Option<Vec<String>>,
    /// External Steiner program and arguments.
    pub steiner_command: Option<Vec<String>>,
    /// Plane slots per site.
    pub max_plane: Option<u8>,
}

/// Applies `overrides` on top of `config` and re-validates the result.
///
/// An explicitly empty pass list is allowed and means "realize only".
pub fn resolve_config(
    mut config: OptimizerConfig,
    overrides: &Overrides,
) -> Result<OptimizerConfig, ConfigError> {
    if let Some(names) = &overrides.passes {
        config.flow.passes = names
            .iter()
            .map(|name| parse_pass(name))
            .collect::<Result<_, _>>()?;
    }
    if let Some(command) = &overrides.steiner_command {
        config.flow.steiner_command = Some(command.clone());
    }
    if let Some(max_plane) = overrides.max_plane {
        config.planes.max_plane = max_plane;
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse_pass(name: &str) -> Result<PassKind, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "partition" | "kl" => Ok(PassKind::Partition),
        "relaxation" | "relax" => Ok(PassKind::Relaxation),
        _ => Err(ConfigError::UnknownPass(name.to_string())),
    }
}
