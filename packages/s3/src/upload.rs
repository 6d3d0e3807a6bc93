//! Tree uploader: uploads every file under a local root.
//!
//! Each file becomes one object whose key is the file's path relative to
//! the root, with `/` separators regardless of platform.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use site_deploy_models::progress::ProgressCallback;

use crate::transfer::{TransferConfig, transfer_file};
use crate::{ObjectStore, S3Error};

/// Files uploaded at once.
const FILE_CONCURRENCY: usize = 8;

/// A local file and the object key it is uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadUnit {
    /// Path of the local file.
    pub path: PathBuf,
    /// Object key: the path relative to the upload root, `/`-separated.
    pub key: String,
}

/// Derives the object key for `path`, which must lie under `root`.
///
/// # Errors
///
/// Returns [`S3Error::InvalidKey`] if `path` is not under `root`, is the
/// root itself, or has a component that is not valid UTF-8.
pub fn object_key(root: &Path, path: &Path) -> Result<String, S3Error> {
    let invalid = || S3Error::InvalidKey {
        path: path.to_path_buf(),
    };

    let relative = path.strip_prefix(root).map_err(|_| invalid())?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str().ok_or_else(invalid),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments.join("/"))
}

/// Walks `root` recursively and returns one [`UploadUnit`] per file,
/// sorted by key.
///
/// Symlinks to files are followed; symlinks to directories are skipped so
/// a link cycle cannot make the walk endless. Anything else that is not a
/// directory is passed through as a file.
///
/// # Errors
///
/// Returns [`S3Error::Read`] if any directory under the root cannot be
/// read (including a missing root), or [`S3Error::InvalidKey`] for a path
/// that cannot be expressed as a key.
pub fn collect_upload_units(root: &Path) -> Result<Vec<UploadUnit>, S3Error> {
    let mut units = Vec::new();
    walk(root, root, &mut units)?;
    units.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(units)
}

fn walk(root: &Path, dir: &Path, units: &mut Vec<UploadUnit>) -> Result<(), S3Error> {
    let read_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| S3Error::Read { path, source }
    };

    for entry in std::fs::read_dir(dir).map_err(read_err(dir))? {
        let entry = entry.map_err(read_err(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_err(&path))?;

        if file_type.is_dir() {
            walk(root, &path, units)?;
            continue;
        }

        if file_type.is_symlink() {
            let target = std::fs::metadata(&path).map_err(read_err(&path))?;
            if target.is_dir() {
                log::warn!("Skipping symlinked directory {}", path.display());
                continue;
            }
        }

        let key = object_key(root, &path)?;
        units.push(UploadUnit { path, key });
    }

    Ok(())
}

/// Uploads every file under `root` to `bucket` and returns how many files
/// were uploaded.
///
/// An empty tree uploads nothing and succeeds. The first failing file
/// fails the whole upload; files that finished before it stay in the
/// bucket.
///
/// # Errors
///
/// Returns the walk error if the tree cannot be enumerated, or the first
/// transfer error.
pub async fn upload_tree(
    store: &dyn ObjectStore,
    bucket: &str,
    root: &Path,
    config: &TransferConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<usize, S3Error> {
    log::info!("Uploading {} -> s3://{bucket}", root.display());

    let walk_root = root.to_path_buf();
    let units = tokio::task::spawn_blocking(move || collect_upload_units(&walk_root)).await??;

    if units.is_empty() {
        log::info!("  nothing to upload");
        return Ok(0);
    }

    progress.set_total(units.len() as u64);
    progress.set_message(format!("Uploading to {bucket}"));

    let uploads: Vec<BoxFuture<'_, Result<(), S3Error>>> = units
        .iter()
        .map(|unit| upload_one(store, bucket, unit, config, progress).boxed())
        .collect();

    stream::iter(uploads)
        .buffer_unordered(FILE_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    log::info!("  uploaded {} files to s3://{bucket}", units.len());
    Ok(units.len())
}

async fn upload_one(
    store: &dyn ObjectStore,
    bucket: &str,
    unit: &UploadUnit,
    config: &TransferConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(), S3Error> {
    transfer_file(store, bucket, unit, config).await?;
    progress.inc(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use site_deploy_models::progress::null_progress;

    use super::*;
    use crate::erase::list_all_keys;
    use crate::memory::MemoryStore;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn keys_are_relative_and_slash_separated() {
        let root = Path::new("site");
        let path = root.join("assets").join("css").join("style.css");
        assert_eq!(object_key(root, &path).unwrap(), "assets/css/style.css");
    }

    #[test]
    fn key_outside_root_is_rejected() {
        let err = object_key(Path::new("site"), Path::new("other/file.txt")).unwrap_err();
        assert!(matches!(err, S3Error::InvalidKey { .. }));
        assert!(object_key(Path::new("site"), Path::new("site")).is_err());
    }

    #[test]
    fn walk_yields_one_unit_per_file_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "home");
        write(dir.path(), "about/index.html", "about");
        write(dir.path(), "assets/img/deep/logo.png", "png");
        write(dir.path(), "no_extension", "x");
        std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

        let keys: Vec<String> = collect_upload_units(dir.path())
            .unwrap()
            .into_iter()
            .map(|u| u.key)
            .collect();

        assert_eq!(
            keys,
            vec![
                "about/index.html",
                "assets/img/deep/logo.png",
                "index.html",
                "no_extension",
            ]
        );
    }

    #[test]
    fn missing_root_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_upload_units(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, S3Error::Read { .. }));
    }

    #[tokio::test]
    async fn uploaded_keys_match_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let expected: BTreeSet<String> = [
            "index.html",
            "a/b.txt",
            "a/b/c.css",
            "a/b/c/d/e.js",
            "x/y/z/w/v/u.json",
        ]
        .iter()
        .map(|k| (*k).to_string())
        .collect();
        for key in &expected {
            write(dir.path(), key, key);
        }
        let store = MemoryStore::new(2);
        store.create_bucket("b");

        let uploaded = upload_tree(
            &store,
            "b",
            dir.path(),
            &TransferConfig::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(uploaded, expected.len());
        let listed: BTreeSet<String> = list_all_keys(&store, "b").await.unwrap().into_iter().collect();
        assert_eq!(listed, expected);
        assert_eq!(store.object("b", "a/b/c.css").unwrap().data, b"a/b/c.css");
    }

    #[tokio::test]
    async fn empty_tree_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(10);
        store.create_bucket("b");

        let uploaded = upload_tree(
            &store,
            "b",
            dir.path(),
            &TransferConfig::default(),
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(uploaded, 0);
        assert!(store.ops().is_empty());
    }

    #[tokio::test]
    async fn one_failing_file_fails_upload() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "home");
        write(dir.path(), "broken.css", "body {}");
        let store = MemoryStore::new(10).failing_put("broken.css");
        store.create_bucket("b");

        let err = upload_tree(
            &store,
            "b",
            dir.path(),
            &TransferConfig::default(),
            &null_progress(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, S3Error::Upload { ref key, .. } if key == "broken.css"));
    }
}
