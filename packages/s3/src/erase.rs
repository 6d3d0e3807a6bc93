//! Bucket eraser: deletes every object in a bucket.
//!
//! The full key set is enumerated first, following continuation tokens for
//! as long as the store reports more pages, and only then deleted in
//! `DeleteObjects` batches. Batches are independent, so a few run at once.

use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use site_deploy_models::progress::ProgressCallback;

use crate::{ObjectStore, S3Error};

/// Maximum number of keys S3 accepts in one `DeleteObjects` call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Number of `DeleteObjects` calls in flight at once.
const DELETE_CONCURRENCY: usize = 4;

/// Lists every object key in `bucket`.
///
/// # Errors
///
/// Returns [`S3Error::List`] if any listing call fails (including when the
/// bucket does not exist).
pub async fn list_all_keys(store: &dyn ObjectStore, bucket: &str) -> Result<Vec<String>, S3Error> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_page(bucket, continuation_token.as_deref())
            .await?;
        pages += 1;
        keys.extend(page.keys);

        match page.next_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    log::debug!("Listed {} objects in s3://{bucket} over {pages} page(s)", keys.len());
    Ok(keys)
}

/// Splits `keys` into `DeleteObjects` batches of at most
/// [`MAX_DELETE_BATCH`] keys.
pub fn deletion_batches(keys: &[String]) -> impl Iterator<Item = &[String]> {
    keys.chunks(MAX_DELETE_BATCH)
}

/// Deletes every object in `bucket` and returns how many were deleted.
///
/// An empty bucket is a no-op. The first failing batch fails the erase;
/// batches that already completed stay deleted, so after an error the
/// bucket may be partially erased.
///
/// # Errors
///
/// Returns [`S3Error::List`] if enumeration fails, or
/// [`S3Error::Delete`] / [`S3Error::DeleteRejected`] if a batch fails.
pub async fn erase(
    store: &dyn ObjectStore,
    bucket: &str,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<usize, S3Error> {
    log::info!("Erasing s3://{bucket}");

    let keys = list_all_keys(store, bucket).await?;
    if keys.is_empty() {
        log::info!("  s3://{bucket} is already empty");
        return Ok(0);
    }

    let batches: Vec<&[String]> = deletion_batches(&keys).collect();
    log::info!(
        "  deleting {} objects in {} batch(es)",
        keys.len(),
        batches.len()
    );

    progress.set_total(keys.len() as u64);
    progress.set_message(format!("Deleting objects from {bucket}"));

    let deletes: Vec<BoxFuture<'_, Result<(), S3Error>>> = batches
        .into_iter()
        .map(|batch| delete_one(store, bucket, batch, progress).boxed())
        .collect();

    stream::iter(deletes)
        .buffer_unordered(DELETE_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    log::info!("  erased {} objects from s3://{bucket}", keys.len());
    Ok(keys.len())
}

async fn delete_one(
    store: &dyn ObjectStore,
    bucket: &str,
    batch: &[String],
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(), S3Error> {
    store.delete_batch(bucket, batch).await?;
    progress.inc(batch.len() as u64);
    log::debug!("  deleted batch of {} objects", batch.len());
    Ok(())
}
