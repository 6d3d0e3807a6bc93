//! The bucket, credentials and options a deploy writes to.

use site_deploy::{DeployError, DeployParams, require_param};
use site_deploy_models::{param_flag, param_optional};

/// Field holding the bucket name.
pub const FIELD_BUCKET_NAME: &str = "BucketName";
/// Field holding the access key id.
pub const FIELD_ACCESS_KEY: &str = "AccessKey";
/// Field holding the secret access key.
pub const FIELD_SECRET_KEY: &str = "SecretKey";
/// Field holding the region code.
pub const FIELD_REGION: &str = "Region";
/// Field enabling the pre-upload erase.
pub const FIELD_EMPTY_BUCKET: &str = "EmptyBucket";
/// Field holding an optional custom endpoint.
pub const FIELD_ENDPOINT: &str = "Endpoint";

/// Where and how a deploy publishes. Built once per deploy from
/// configuration and never modified.
#[derive(Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    bucket: String,
    access_key: String,
    secret_key: String,
    region: String,
    endpoint: Option<String>,
    empty_bucket: bool,
}

impl DeploymentTarget {
    /// Reads the target from deployer parameters.
    ///
    /// The region is only checked for presence here; whether it names a
    /// known region is decided when the client is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::MissingField`] if `BucketName`, `AccessKey`,
    /// `SecretKey` or `Region` is absent or blank.
    pub fn from_params(params: &DeployParams) -> Result<Self, DeployError> {
        Ok(Self {
            bucket: require_param(params, FIELD_BUCKET_NAME)?.to_string(),
            access_key: require_param(params, FIELD_ACCESS_KEY)?.to_string(),
            secret_key: require_param(params, FIELD_SECRET_KEY)?.to_string(),
            region: require_param(params, FIELD_REGION)?.to_string(),
            endpoint: param_optional(params, FIELD_ENDPOINT).map(String::from),
            empty_bucket: param_flag(params, FIELD_EMPTY_BUCKET),
        })
    }

    /// Target bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Access key id.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Secret access key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Region code as configured (not yet validated).
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Custom endpoint, if configured.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Whether the bucket is erased before uploading.
    #[must_use]
    pub const fn empty_bucket(&self) -> bool {
        self.empty_bucket
    }
}

impl std::fmt::Debug for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentTarget")
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("empty_bucket", &self.empty_bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> DeployParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn complete() -> DeployParams {
        params(&[
            (FIELD_BUCKET_NAME, "site-bucket"),
            (FIELD_ACCESS_KEY, "AKIDEXAMPLE"),
            (FIELD_SECRET_KEY, "secret"),
            (FIELD_REGION, "eu-west-1"),
        ])
    }

    #[test]
    fn reads_complete_params() {
        let target = DeploymentTarget::from_params(&complete()).unwrap();
        assert_eq!(target.bucket(), "site-bucket");
        assert_eq!(target.region(), "eu-west-1");
        assert_eq!(target.endpoint(), None);
        assert!(!target.empty_bucket());
    }

    #[test]
    fn each_required_field_is_enforced() {
        for field in [
            FIELD_BUCKET_NAME,
            FIELD_ACCESS_KEY,
            FIELD_SECRET_KEY,
            FIELD_REGION,
        ] {
            let mut params = complete();
            params.remove(field);
            let err = DeploymentTarget::from_params(&params).unwrap_err();
            assert!(
                matches!(err, DeployError::MissingField { ref name } if name == field),
                "expected {field} to be required, got {err}"
            );
        }
    }

    #[test]
    fn empty_bucket_uses_truthy_parsing() {
        for (value, expected) in [("Empty", true), ("TRUE", true), ("no", false), ("", false)] {
            let mut params = complete();
            params.insert(FIELD_EMPTY_BUCKET.to_string(), value.to_string());
            let target = DeploymentTarget::from_params(&params).unwrap();
            assert_eq!(target.empty_bucket(), expected, "EmptyBucket={value:?}");
        }
    }

    #[test]
    fn debug_masks_secret() {
        let target = DeploymentTarget::from_params(&complete()).unwrap();
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("***"));
    }
}
