//! Loading deployer parameters from a TOML file, the environment and
//! `--param` flags.
//!
//! ```toml
//! deployer = "awss3"
//!
//! [params]
//! BucketName = "site-bucket"
//! Region = "eu-west-1"
//! EmptyBucket = "yes"
//! ```
//!
//! Secrets are better supplied as `SITE_DEPLOY_<FIELD>` environment
//! variables (e.g. `SITE_DEPLOY_SECRETKEY`). Precedence, highest first:
//! `--param`, environment, file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use site_deploy::{DeployParams, DeployerDefinition};

/// Prefix of environment variables that supply deployer fields.
pub const ENV_PREFIX: &str = "SITE_DEPLOY_";

/// Errors loading the deploy configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A `--param` flag is not `KEY=VALUE`.
    #[error("Invalid --param '{0}': expected KEY=VALUE")]
    InvalidParam(String),
}

/// Contents of a deploy config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Deployer id; may be overridden on the command line.
    pub deployer: Option<String>,
    /// Deployer fields.
    #[serde(default)]
    pub params: DeployParams,
}

impl DeployConfig {
    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Splits a `KEY=VALUE` flag. The value may itself contain `=`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidParam`] if there is no `=` or the key is
/// blank.
pub fn parse_param(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidParam(raw.to_string())),
    }
}

/// Environment variable name for a deployer field.
#[must_use]
pub fn env_var_name(field: &str) -> String {
    format!("{ENV_PREFIX}{}", field.to_ascii_uppercase())
}

/// Collects the fields of `definition` that `lookup` (normally
/// `std::env::var`) provides.
pub fn env_params(
    definition: &DeployerDefinition,
    lookup: impl Fn(&str) -> Option<String>,
) -> DeployParams {
    definition
        .fields
        .iter()
        .filter_map(|field| lookup(&env_var_name(field.name)).map(|v| (field.name.to_string(), v)))
        .collect()
}

/// Merges parameter layers; later layers win.
#[must_use]
pub fn merge(layers: impl IntoIterator<Item = DeployParams>) -> DeployParams {
    let mut merged = DeployParams::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

/// Renders `params` for logging with secret fields masked.
#[must_use]
pub fn redacted(params: &DeployParams, definition: &DeployerDefinition) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let secret = definition.field(key).is_some_and(|f| f.secret);
            if secret {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
