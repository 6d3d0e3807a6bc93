#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deployer abstraction for publishing a generated site.
//!
//! A [`Deployer`] takes a local directory and publishes it somewhere. Backends
//! are registered in a [`registry::DeployerRegistry`] under a string key and
//! constructed from a [`DeployParams`] map, so the host can pick a backend by
//! name without knowing its concrete type.
//!
//! Construction validates that required fields are present; everything that
//! can go wrong afterwards is reported through [`DeployResult`] rather than
//! as an error.

pub mod registry;

use std::path::Path;
use std::sync::Arc;

use site_deploy_models::progress::{ProgressCallback, null_progress};

pub use site_deploy_models::{DeployParams, DeployResult, DeployerDefinition};

/// Errors raised while selecting or constructing a deployer.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required configuration field is absent or blank.
    #[error("Missing required field: {name}")]
    MissingField {
        /// Name of the missing field.
        name: String,
    },

    /// A configuration field has a value the deployer cannot use.
    #[error("Invalid value for {name}: {message}")]
    InvalidField {
        /// Name of the offending field.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// No deployer is registered under the requested key.
    #[error("Unknown deployer: {id}")]
    UnknownDeployer {
        /// The requested key.
        id: String,
    },
}

/// Reads a required field from `params`, rejecting absent or blank values.
///
/// # Errors
///
/// Returns [`DeployError::MissingField`] if the field is absent or blank.
pub fn require_param<'a>(params: &'a DeployParams, name: &str) -> Result<&'a str, DeployError> {
    site_deploy_models::param_optional(params, name).ok_or_else(|| DeployError::MissingField {
        name: name.to_string(),
    })
}

/// A publishing backend.
///
/// `deploy` runs to completion before returning, however the backend
/// schedules its I/O internally. Implementations own any client they create
/// for the duration of one call and release it on every exit path.
#[async_trait::async_trait]
pub trait Deployer: Send + Sync {
    /// Returns the static description of this backend.
    fn definition(&self) -> &'static DeployerDefinition;

    /// Publishes the directory tree rooted at `root`.
    ///
    /// Never fails with an error: problems are reported as
    /// [`DeployResult::Failure`].
    async fn deploy(&self, root: &Path, progress: &Arc<dyn ProgressCallback>) -> DeployResult;
}

/// Runs `deployer` against `root` on a dedicated current-thread runtime and
/// blocks until the deploy finishes.
///
/// Must not be called from inside an async context.
#[must_use]
pub fn deploy_blocking(deployer: &dyn Deployer, root: &Path) -> DeployResult {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start deploy runtime: {e}");
            return DeployResult::failure_with(
                format!(
                    "Error deploying the site using {} deploy. Unable to start runtime.",
                    deployer.definition().name
                ),
                e,
            );
        }
    };

    let progress = null_progress();
    runtime.block_on(deployer.deploy(root, &progress))
}
