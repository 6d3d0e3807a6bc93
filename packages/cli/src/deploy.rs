//! The `deploy` subcommand: resolve a deployer, gather its parameters,
//! confirm destructive options and run it.

use std::path::{Path, PathBuf};

use site_deploy::registry::DeployerRegistry;
use site_deploy::{DeployError, DeployParams, DeployerDefinition};
use site_deploy_cli_utils::{IndicatifProgress, MultiProgress};
use site_deploy_models::param_flag;

use crate::config::{self, ConfigError, DeployConfig};

/// Inputs to one deploy, as given on the command line.
#[derive(Debug, Default)]
pub struct DeployArgs {
    /// Directory to publish.
    pub root: PathBuf,
    /// Deployer id from `--deployer`.
    pub deployer: Option<String>,
    /// Config file from `--config`.
    pub config: Option<PathBuf>,
    /// Raw `--param KEY=VALUE` flags.
    pub params: Vec<String>,
    /// Skip confirmation prompts.
    pub yes: bool,
}

/// Errors that stop a deploy before the deployer runs.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("No deployer selected; pass --deployer (available: {available})")]
    NoDeployer { available: String },

    #[error("Site root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Confirmation prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Picks the deployer: `--deployer`, then the config file, then the only
/// registered deployer if there is exactly one.
///
/// # Errors
///
/// Returns [`DeployError::UnknownDeployer`] for an unregistered id and
/// [`CliError::NoDeployer`] when nothing selects one.
pub fn resolve_deployer(
    registry: &DeployerRegistry,
    flag: Option<&str>,
    file: Option<&str>,
) -> Result<&'static DeployerDefinition, CliError> {
    if let Some(id) = flag.or(file) {
        return registry.definition(id).ok_or_else(|| {
            DeployError::UnknownDeployer {
                id: id.to_string(),
            }
            .into()
        });
    }

    match registry.definitions().as_slice() {
        [only] => Ok(*only),
        all => Err(CliError::NoDeployer {
            available: all.iter().map(|d| d.id).collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Merges file, environment and flag parameters for `definition`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidParam`] for a malformed flag.
pub fn gather_params(
    definition: &DeployerDefinition,
    file: DeployParams,
    flags: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> Result<DeployParams, CliError> {
    let flags = flags
        .iter()
        .map(|raw| config::parse_param(raw))
        .collect::<Result<DeployParams, _>>()?;
    let env = config::env_params(definition, env);

    for key in file.keys().chain(flags.keys()) {
        if definition.field(key).is_none() {
            log::warn!("Ignoring unknown field '{key}' for deployer '{}'", definition.id);
        }
    }

    Ok(config::merge([file, env, flags]))
}

/// Whether `params` turn on any of the deployer's destructive fields.
#[must_use]
pub fn erases_existing(definition: &DeployerDefinition, params: &DeployParams) -> bool {
    definition
        .fields
        .iter()
        .any(|field| field.destructive && param_flag(params, field.name))
}

/// Runs a deploy. Returns whether the site was published.
///
/// # Errors
///
/// Returns [`CliError`] for problems found before the deployer starts.
/// Failures during the deploy itself are logged and reported as `false`.
pub async fn run(
    args: DeployArgs,
    registry: &DeployerRegistry,
    multi: &MultiProgress,
) -> Result<bool, CliError> {
    let file = match &args.config {
        Some(path) => DeployConfig::load(path)?,
        None => DeployConfig::default(),
    };

    let definition =
        resolve_deployer(registry, args.deployer.as_deref(), file.deployer.as_deref())?;
    let params = gather_params(definition, file.params, &args.params, |name| {
        std::env::var(name).ok()
    })?;
    log::debug!(
        "Deployer '{}' params: {}",
        definition.id,
        config::redacted(&params, definition)
    );

    let deployer = registry.create(definition.id, &params)?;
    check_root(&args.root)?;

    if erases_existing(definition, &params) {
        let prompt = format!(
            "Delete everything in the target of '{}' before uploading?",
            definition.name
        );
        if !site_deploy_cli_utils::confirm(&prompt, args.yes)? {
            log::warn!("Deploy cancelled");
            return Ok(false);
        }
    }

    log::info!(
        "Deploying {} with {}",
        args.root.display(),
        definition.name
    );
    let progress = IndicatifProgress::deploy_bar(multi, &format!("Deploying to {}", definition.name));
    let result = deployer.deploy(&args.root, &progress).await;

    if result.is_success() {
        log::info!("{result}");
    } else {
        log::error!("{result}");
    }

    Ok(result.is_success())
}

fn check_root(root: &Path) -> Result<(), CliError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(CliError::NotADirectory(root.to_path_buf()))
    }
}
