//! Single-file transfer: one `PutObject` for small files, a multipart
//! upload with concurrent parts for large ones.

use std::io::SeekFrom;
use std::path::Path;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};

use crate::{ObjectStore, S3Error, UploadUnit, UploadedPart};

/// Most parts S3 allows in one multipart upload.
const MAX_PARTS: u64 = 10_000;

const MIB: u64 = 1024 * 1024;

/// Tuning for large-file transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Files of at least this many bytes use a multipart upload.
    pub multipart_threshold: u64,
    /// Preferred part size; raised to the store minimum, and further if
    /// the file would otherwise need more than 10,000 parts.
    pub part_size: u64,
    /// Parts of one file uploaded at once.
    pub part_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 16 * MIB,
            part_size: 8 * MIB,
            part_concurrency: 4,
        }
    }
}

impl TransferConfig {
    /// Part size actually used for a file of `file_size` bytes.
    #[must_use]
    pub fn effective_part_size(&self, file_size: u64, min_part_size: u64) -> u64 {
        self.part_size
            .max(min_part_size)
            .max(file_size.div_ceil(MAX_PARTS))
            .max(1)
    }
}

/// Returns the `Content-Type` for an object key, from its extension.
#[must_use]
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Uploads one file to `bucket` under its unit's key.
///
/// # Errors
///
/// Returns [`S3Error::Read`] if the file cannot be read, or the store's
/// error if any upload call fails. A failed multipart upload is aborted
/// before returning.
pub async fn transfer_file(
    store: &dyn ObjectStore,
    bucket: &str,
    unit: &UploadUnit,
    config: &TransferConfig,
) -> Result<(), S3Error> {
    let size = tokio::fs::metadata(&unit.path)
        .await
        .map_err(|source| S3Error::Read {
            path: unit.path.clone(),
            source,
        })?
        .len();
    let content_type = content_type_for(&unit.key);

    if size == 0 || size < config.multipart_threshold {
        log::debug!(
            "Pushing {} -> s3://{bucket}/{} ({size} bytes)",
            unit.path.display(),
            unit.key
        );
        return store
            .put_object(bucket, &unit.key, &unit.path, content_type)
            .await;
    }

    let part_size = config.effective_part_size(size, store.min_part_size());
    let part_count = size.div_ceil(part_size);
    #[allow(clippy::cast_precision_loss)] // display-only MB value
    let mb = size as f64 / 1_048_576.0;
    log::info!(
        "Pushing {} -> s3://{bucket}/{} ({mb:.1} MB, {part_count} parts)",
        unit.path.display(),
        unit.key
    );

    let upload_id = store
        .create_multipart(bucket, &unit.key, content_type)
        .await?;

    let result = match upload_parts(store, bucket, unit, &upload_id, size, part_size, config).await
    {
        Ok(parts) => {
            store
                .complete_multipart(bucket, &unit.key, &upload_id, &parts)
                .await
        }
        Err(e) => Err(e),
    };

    if result.is_err()
        && let Err(abort_err) = store.abort_multipart(bucket, &unit.key, &upload_id).await
    {
        log::warn!("  failed to abort multipart upload of {}: {abort_err}", unit.key);
    }

    result
}

/// Uploads every part of `unit` and returns them in part order.
async fn upload_parts(
    store: &dyn ObjectStore,
    bucket: &str,
    unit: &UploadUnit,
    upload_id: &str,
    size: u64,
    part_size: u64,
    config: &TransferConfig,
) -> Result<Vec<UploadedPart>, S3Error> {
    let part_count = size.div_ceil(part_size);

    let uploads: Vec<BoxFuture<'_, Result<UploadedPart, S3Error>>> = (1..=part_count)
        .map(|n| upload_one_part(store, bucket, unit, upload_id, n, size, part_size).boxed())
        .collect();

    let mut parts: Vec<UploadedPart> = stream::iter(uploads)
        .buffer_unordered(config.part_concurrency.max(1))
        .try_collect()
        .await?;

    parts.sort_by_key(|part| part.part_number);
    Ok(parts)
}

/// Reads and uploads part `n` (1-based) of `unit`.
async fn upload_one_part(
    store: &dyn ObjectStore,
    bucket: &str,
    unit: &UploadUnit,
    upload_id: &str,
    n: u64,
    size: u64,
    part_size: u64,
) -> Result<UploadedPart, S3Error> {
    let offset = (n - 1) * part_size;
    let len = part_size.min(size - offset);
    let data = read_range(&unit.path, offset, len).await?;
    let part_number = i32::try_from(n).map_err(|e| S3Error::Multipart {
        bucket: bucket.to_string(),
        key: unit.key.clone(),
        source: Box::new(e),
    })?;
    store
        .upload_part(bucket, &unit.key, upload_id, part_number, data)
        .await
}

/// Reads `len` bytes starting at `offset`.
async fn read_range(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>, S3Error> {
    let read_err = |source| S3Error::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(read_err)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(read_err)?;

    let len = usize::try_from(len).map_err(|e| read_err(std::io::Error::other(e)))?;
    let mut buffer = vec![0u8; len];
    file.read_exact(&mut buffer).await.map_err(read_err)?;
    Ok(buffer)
}
