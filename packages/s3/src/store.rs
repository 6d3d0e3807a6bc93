//! Object-store operations used by the eraser and uploader.
//!
//! [`ObjectStore`] is the seam between the deploy logic and the network:
//! [`S3Store`] implements it over `aws-sdk-s3`, and tests substitute an
//! in-memory store.

use std::path::Path;

use async_trait::async_trait;
use aws_config::Region as SdkRegion;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};

use crate::{DeploymentTarget, Region, S3Error};

/// Smallest part S3 accepts in a multipart upload (except the last part).
pub const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Object keys on this page.
    pub keys: Vec<String>,
    /// Token for the next page; `Some` exactly when more pages remain.
    pub next_token: Option<String>,
}

/// A part that has been uploaded as part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// 1-based part number.
    pub part_number: i32,
    /// `ETag` returned for the part.
    pub etag: String,
}

/// Bucket operations needed to erase and upload.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists one page of object keys, continuing from `continuation_token`.
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, S3Error>;

    /// Deletes `keys` in one bulk call. Keys that do not exist are not an
    /// error.
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<(), S3Error>;

    /// Uploads the file at `path` as a single object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), S3Error>;

    /// Starts a multipart upload and returns its upload id.
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3Error>;

    /// Uploads one part of a multipart upload.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<UploadedPart, S3Error>;

    /// Assembles the uploaded parts into the final object.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), S3Error>;

    /// Discards a multipart upload and its parts.
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<(), S3Error>;

    /// Smallest part size the store accepts.
    fn min_part_size(&self) -> u64 {
        S3_MIN_PART_SIZE
    }
}

/// [`ObjectStore`] backed by an `aws-sdk-s3` client.
///
/// Objects are written without an ACL, so access is governed by the bucket
/// policy alone.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Builds a client for `target` in `region`.
    ///
    /// Purely local: no request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`S3Error::InvalidEndpoint`] if the target's custom endpoint
    /// is not an `http` or `https` URL.
    pub fn connect(target: &DeploymentTarget, region: Region) -> Result<Self, S3Error> {
        let creds = Credentials::new(
            target.access_key(),
            target.secret_key(),
            None,
            None,
            "site-deploy",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .region(SdkRegion::new(region.code()))
            .credentials_provider(creds)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());

        if let Some(endpoint) = target.endpoint() {
            validate_endpoint(endpoint)?;
            builder = builder.endpoint_url(endpoint).force_path_style(true);
            log::debug!("Using custom endpoint {endpoint} for region {region}");
        } else {
            log::debug!("Using endpoint {} for region {region}", region.endpoint());
        }

        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(builder.build())))
    }

    /// Wraps an already-configured client.
    #[must_use]
    pub const fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

/// Checks that `endpoint` looks like an `http(s)` URL with a host.
fn validate_endpoint(endpoint: &str) -> Result<(), S3Error> {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"));

    match host {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        Some(_) => Err(S3Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: "missing host".to_string(),
        }),
        None => Err(S3Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: "expected an http:// or https:// URL".to_string(),
        }),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, S3Error> {
        let mut request = self.client.list_objects_v2().bucket(bucket);
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let output = request.send().await.map_err(|e| S3Error::List {
            bucket: bucket.to_string(),
            source: Box::new(e),
        })?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|obj| obj.key())
            .map(String::from)
            .collect();

        let next_token = if output.is_truncated() == Some(true) {
            let token = output.next_continuation_token().ok_or_else(|| {
                S3Error::MissingContinuationToken {
                    bucket: bucket.to_string(),
                }
            })?;
            Some(token.to_string())
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<(), S3Error> {
        let delete_err = |source: Box<dyn std::error::Error + Send + Sync>| S3Error::Delete {
            bucket: bucket.to_string(),
            count: keys.len(),
            source,
        };

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| delete_err(Box::new(e)))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| delete_err(Box::new(e)))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| delete_err(Box::new(e)))?;

        // Quiet mode: only failures are reported back.
        let errors = output.errors();
        if let Some(first) = errors.first() {
            return Err(S3Error::DeleteRejected {
                bucket: bucket.to_string(),
                failed: errors.len(),
                key: first.key().unwrap_or_default().to_string(),
                message: first.message().unwrap_or("unknown error").to_string(),
            });
        }

        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), S3Error> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| S3Error::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| S3Error::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3Error> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| multipart_err(bucket, key, Box::new(e)))?;

        output
            .upload_id()
            .map(String::from)
            .ok_or_else(|| multipart_err(bucket, key, "no upload id returned".into()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<UploadedPart, S3Error> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| multipart_err(bucket, key, Box::new(e)))?;

        let etag = output
            .e_tag()
            .ok_or_else(|| {
                multipart_err(bucket, key, format!("no ETag for part {part_number}").into())
            })?
            .to_string();

        Ok(UploadedPart { part_number, etag })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), S3Error> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| multipart_err(bucket, key, Box::new(e)))?;

        Ok(())
    }

    async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3Error> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| multipart_err(bucket, key, Box::new(e)))?;

        Ok(())
    }
}

fn multipart_err(
    bucket: &str,
    key: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> S3Error {
    S3Error::Multipart {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source,
    }
}
