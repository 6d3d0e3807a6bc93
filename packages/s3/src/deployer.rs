//! The `awss3` deployer: erase (optionally), then upload.
//!
//! A deploy moves through `Idle -> ClientResolved -> [Erasing] -> Uploading`
//! and ends in `Succeeded` or `Failed`. Nothing is retried and nothing is
//! rolled back: a failure after the erase or upload has started leaves the
//! bucket in an indeterminate state.

use std::path::Path;
use std::sync::Arc;

use site_deploy::{DeployError, DeployParams, DeployResult, Deployer, DeployerDefinition};
use site_deploy_models::FieldDefinition;
use site_deploy_models::progress::ProgressCallback;
use strum_macros::Display;

use crate::target::{
    FIELD_ACCESS_KEY, FIELD_BUCKET_NAME, FIELD_EMPTY_BUCKET, FIELD_ENDPOINT, FIELD_REGION,
    FIELD_SECRET_KEY,
};
use crate::{
    DeploymentTarget, ObjectStore, Region, S3Error, S3Store, TransferConfig, erase, upload,
};

/// Registry key of this deployer.
pub const DEPLOYER_KEY: &str = "awss3";

/// Static description of the S3 deployer.
pub static DEFINITION: DeployerDefinition = DeployerDefinition {
    id: DEPLOYER_KEY,
    name: "AWS S3",
    help: "The AWS S3 bucket will be mirrored to match the generated site.",
    fields: &[
        FieldDefinition::required(FIELD_BUCKET_NAME),
        FieldDefinition::required(FIELD_ACCESS_KEY),
        FieldDefinition::secret(FIELD_SECRET_KEY),
        FieldDefinition::required(FIELD_REGION),
        FieldDefinition::destructive(FIELD_EMPTY_BUCKET),
        FieldDefinition::optional(FIELD_ENDPOINT),
    ],
};

const ERROR_PREFIX: &str = "Error deploying the site using AWS S3 deploy.";

/// Where a deploy currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeployPhase {
    /// Nothing has happened yet.
    Idle,
    /// The region is known and a client exists; no request sent.
    ClientResolved,
    /// Deleting the bucket's existing objects.
    Erasing,
    /// Uploading the local tree.
    Uploading,
    /// Every phase completed.
    Succeeded,
    /// A phase failed; the bucket is left as the failing call left it.
    Failed,
}

/// Mirrors a local directory onto an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Deployer {
    target: DeploymentTarget,
    transfer: TransferConfig,
}

impl S3Deployer {
    /// Builds the deployer from its configuration fields.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::MissingField`] if a required field is absent.
    pub fn from_params(params: &DeployParams) -> Result<Self, DeployError> {
        Ok(Self::new(DeploymentTarget::from_params(params)?))
    }

    /// Builds the deployer for an already-validated target.
    #[must_use]
    pub fn new(target: DeploymentTarget) -> Self {
        Self {
            target,
            transfer: TransferConfig::default(),
        }
    }

    /// Registry factory.
    ///
    /// # Errors
    ///
    /// See [`S3Deployer::from_params`].
    pub fn factory(params: &DeployParams) -> Result<Box<dyn Deployer>, DeployError> {
        Ok(Box::new(Self::from_params(params)?))
    }

    /// Overrides the large-file transfer settings.
    #[must_use]
    pub const fn with_transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// The target this deployer writes to.
    #[must_use]
    pub const fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Resolves the region and builds a client. No request is sent.
    fn connect(&self) -> Result<S3Store, S3Error> {
        let region =
            Region::resolve(self.target.region()).ok_or_else(|| S3Error::UnknownRegion {
                region: self.target.region().to_string(),
            })?;
        S3Store::connect(&self.target, region)
    }

    /// Runs the erase and upload phases against an already-resolved store.
    pub async fn deploy_to(
        &self,
        store: &dyn ObjectStore,
        root: &Path,
        progress: &Arc<dyn ProgressCallback>,
    ) -> DeployResult {
        let bucket = self.target.bucket();
        let mut phase = DeployPhase::ClientResolved;
        log::debug!("s3://{bucket}: {phase}");

        let mut deleted = 0;
        if self.target.empty_bucket() {
            phase = advance(bucket, phase, DeployPhase::Erasing);
            match erase::erase(store, bucket, progress).await {
                Ok(count) => deleted = count,
                Err(e) => {
                    advance(bucket, phase, DeployPhase::Failed);
                    log::error!("Failed to empty s3://{bucket}: {e}");
                    progress.finish(format!("Failed to empty {bucket}"));
                    return DeployResult::failure_with(
                        format!("{ERROR_PREFIX} Unable to delete existing contents."),
                        e,
                    );
                }
            }
        }

        phase = advance(bucket, phase, DeployPhase::Uploading);
        match upload::upload_tree(store, bucket, root, &self.transfer, progress).await {
            Ok(uploaded) => {
                advance(bucket, phase, DeployPhase::Succeeded);
                progress.finish(format!("Deployed {uploaded} files to {bucket}"));
                DeployResult::success(success_message(self.target.empty_bucket(), deleted, uploaded))
            }
            Err(e) => {
                advance(bucket, phase, DeployPhase::Failed);
                log::error!("Failed to upload to s3://{bucket}: {e}");
                progress.finish(format!("Failed to upload to {bucket}"));
                DeployResult::failure_with(ERROR_PREFIX, e)
            }
        }
    }
}

fn advance(bucket: &str, from: DeployPhase, to: DeployPhase) -> DeployPhase {
    log::debug!("s3://{bucket}: {from} -> {to}");
    to
}

fn success_message(erased: bool, deleted: usize, uploaded: usize) -> String {
    if erased {
        format!(
            "Site deployed using AWS S3 deploy (deleted {deleted} objects, uploaded {uploaded} files)."
        )
    } else {
        format!("Site deployed using AWS S3 deploy (uploaded {uploaded} files).")
    }
}

#[async_trait::async_trait]
impl Deployer for S3Deployer {
    fn definition(&self) -> &'static DeployerDefinition {
        &DEFINITION
    }

    async fn deploy(&self, root: &Path, progress: &Arc<dyn ProgressCallback>) -> DeployResult {
        log::debug!("s3://{}: {}", self.target.bucket(), DeployPhase::Idle);

        // The client lives for this call only and is dropped on every path.
        let store = match self.connect() {
            Ok(store) => store,
            Err(e) => {
                log::error!("Unable to get S3 client: {e}");
                return DeployResult::failure_with(
                    format!("{ERROR_PREFIX} Unable to get S3 client."),
                    e,
                );
            }
        };

        self.deploy_to(&store, root, progress).await
    }
}
