#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! AWS S3 deployer.
//!
//! Mirrors a local directory tree onto an S3 bucket: optionally deletes
//! everything already in the bucket, then uploads every file under the
//! local root as an object keyed by its relative path.
//!
//! ## Phases
//!
//! 1. **Resolve** the region and build a client. An unknown region fails
//!    here, before any request is sent.
//! 2. **Erase** (only when `EmptyBucket` is truthy): list the whole bucket
//!    page by page, then delete the keys with `DeleteObjects` in batches of
//!    at most [`erase::MAX_DELETE_BATCH`].
//! 3. **Upload**: walk the local root and transfer each file, switching to
//!    multipart uploads above [`transfer::TransferConfig::multipart_threshold`].
//!
//! There is no rollback. If a phase fails after it has started changing the
//! bucket, the bucket is left as the failing call left it.
//!
//! # Configuration
//!
//! | Field | Required | Description |
//! |---|---|---|
//! | `BucketName` | Yes | Target bucket |
//! | `AccessKey` | Yes | Access key id |
//! | `SecretKey` | Yes | Secret access key |
//! | `Region` | Yes | Region code, e.g. `eu-west-1` |
//! | `EmptyBucket` | No | `y`, `yes`, `true` or `empty` to erase before upload |
//! | `Endpoint` | No | Custom S3-compatible endpoint (path-style addressing) |

pub mod deployer;
pub mod erase;
pub mod region;
pub mod store;
pub mod target;
pub mod transfer;
pub mod upload;

#[cfg(test)]
mod memory;

use std::path::PathBuf;

pub use deployer::{DEFINITION, DEPLOYER_KEY, S3Deployer};
pub use region::Region;
pub use store::{ListPage, ObjectStore, S3Store, UploadedPart};
pub use target::DeploymentTarget;
pub use transfer::TransferConfig;
pub use upload::UploadUnit;

/// Errors that can occur while talking to S3 or reading the local tree.
#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    /// The region code does not name a known S3 region.
    #[error("Unknown region: {region}")]
    UnknownRegion {
        /// The rejected region code.
        region: String,
    },

    /// The custom endpoint is not an `http(s)` URL.
    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        message: String,
    },

    /// S3 `ListObjectsV2` failed.
    #[error("Failed to list s3://{bucket}: {source}")]
    List {
        /// Bucket name.
        bucket: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A listing page was marked truncated but carried no continuation token.
    #[error("Listing of s3://{bucket} was truncated without a continuation token")]
    MissingContinuationToken {
        /// Bucket name.
        bucket: String,
    },

    /// S3 `DeleteObjects` failed as a whole.
    #[error("Failed to delete {count} objects from s3://{bucket}: {source}")]
    Delete {
        /// Bucket name.
        bucket: String,
        /// Number of keys in the failed batch.
        count: usize,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `DeleteObjects` succeeded but reported per-key failures.
    #[error("Failed to delete {failed} objects from s3://{bucket} (first: {key}: {message})")]
    DeleteRejected {
        /// Bucket name.
        bucket: String,
        /// Number of keys the store refused to delete.
        failed: usize,
        /// First refused key.
        key: String,
        /// Store message for the first refused key.
        message: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// One of the multipart upload calls failed.
    #[error("Multipart upload of s3://{bucket}/{key} failed: {source}")]
    Multipart {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A local file or directory could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Local path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A local path cannot be expressed as an object key.
    #[error("Cannot derive an object key from {}", path.display())]
    InvalidKey {
        /// Local path.
        path: PathBuf,
    },

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
