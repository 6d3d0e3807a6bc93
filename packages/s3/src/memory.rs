//! In-memory [`ObjectStore`] for tests.
//!
//! Lists in key order with a configurable page size, records every call,
//! and can be told to fail specific operations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::erase::MAX_DELETE_BATCH;
use crate::{ListPage, ObjectStore, S3Error, UploadedPart};

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// A store operation, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List,
    Delete(usize),
    Put(String),
    CreateMultipart(String),
    UploadPart(String, i32),
    Complete(String),
    Abort(String),
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: BTreeMap<String, PendingUpload>,
    next_upload_id: usize,
    delete_calls: usize,
    ops: Vec<Op>,
}

#[derive(Debug)]
pub struct MemoryStore {
    page_size: usize,
    fail_delete_call: Option<usize>,
    fail_put_key: Option<String>,
    fail_part: Option<i32>,
    vanish_after_list: Vec<String>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            fail_delete_call: None,
            fail_put_key: None,
            fail_part: None,
            vanish_after_list: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Creates `bucket` holding `count` objects named `obj-00000`, ...
    pub fn with_objects(self, bucket: &str, count: usize) -> Self {
        self.create_bucket(bucket);
        {
            let mut state = self.state.lock().unwrap();
            let objects = state.buckets.get_mut(bucket).unwrap();
            for i in 0..count {
                objects.insert(
                    format!("obj-{i:05}"),
                    StoredObject {
                        data: Vec::new(),
                        content_type: "application/octet-stream".to_string(),
                    },
                );
            }
        }
        self
    }

    /// Makes the `call`-th (0-based) `delete_batch` call fail.
    pub const fn failing_delete_call(mut self, call: usize) -> Self {
        self.fail_delete_call = Some(call);
        self
    }

    /// Makes single-shot uploads of `key` fail.
    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_put_key = Some(key.to_string());
        self
    }

    /// Makes uploads of part `part_number` fail.
    pub const fn failing_part(mut self, part_number: i32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    /// Removes `keys` right after they are listed, as if another writer
    /// deleted them between listing and deletion.
    pub fn vanishing_after_list(mut self, keys: &[&str]) -> Self {
        self.vanish_after_list = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.state
            .lock()
            .unwrap()
            .buckets
            .entry(bucket.to_string())
            .or_default();
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state.lock().unwrap().buckets[bucket]
            .keys()
            .cloned()
            .collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state.lock().unwrap().buckets[bucket].get(key).cloned()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Delete(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn pending_uploads(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }
}

fn no_such_bucket(bucket: &str) -> S3Error {
    S3Error::List {
        bucket: bucket.to_string(),
        source: "NoSuchBucket: The specified bucket does not exist".into(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, S3Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::List);
        let objects = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let mut remaining = objects
            .keys()
            .filter(|key| continuation_token.is_none_or(|token| key.as_str() > token));
        let keys: Vec<String> = remaining.by_ref().take(self.page_size).cloned().collect();
        let next_token = if remaining.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        if let Some(objects) = state.buckets.get_mut(bucket) {
            for key in keys.iter().filter(|key| self.vanish_after_list.contains(*key)) {
                objects.remove(key);
            }
        }

        Ok(ListPage { keys, next_token })
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<(), S3Error> {
        let mut state = self.state.lock().unwrap();
        let call = state.delete_calls;
        state.delete_calls += 1;
        state.ops.push(Op::Delete(keys.len()));

        if keys.len() > MAX_DELETE_BATCH || self.fail_delete_call == Some(call) {
            return Err(S3Error::Delete {
                bucket: bucket.to_string(),
                count: keys.len(),
                source: "InternalError: injected fault".into(),
            });
        }

        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        for key in keys {
            objects.remove(key);
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
        let data = tokio::fs::read(path).await.map_err(|source| S3Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Put(key.to_string()));
        if self.fail_put_key.as_deref() == Some(key) {
            return Err(S3Error::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "SlowDown: injected fault".into(),
            });
        }

        state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .insert(
                key.to_string(),
                StoredObject {
                    data,
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }

    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::CreateMultipart(key.to_string()));
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<UploadedPart, S3Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::UploadPart(key.to_string(), part_number));
        if self.fail_part == Some(part_number) {
            return Err(S3Error::Multipart {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "RequestTimeout: injected fault".into(),
            });
        }

        let upload = state.uploads.get_mut(upload_id).ok_or_else(|| S3Error::Multipart {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: "NoSuchUpload".into(),
        })?;
        upload.parts.insert(part_number, data);
        Ok(UploadedPart {
            part_number,
            etag: format!("\"etag-{part_number}\""),
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), S3Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Complete(key.to_string()));
        let upload = state.uploads.remove(upload_id).ok_or_else(|| S3Error::Multipart {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: "NoSuchUpload".into(),
        })?;

        let listed: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        let stored: Vec<i32> = upload.parts.keys().copied().collect();
        if listed != stored {
            return Err(S3Error::Multipart {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: format!("InvalidPartOrder: {listed:?} vs {stored:?}").into(),
            });
        }

        let data = upload.parts.into_values().flatten().collect();
        state
            .buckets
            .get_mut(&upload.bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .insert(
                upload.key,
                StoredObject {
                    data,
                    content_type: upload.content_type,
                },
            );
        Ok(())
    }

    async fn abort_multipart(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3Error> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Abort(key.to_string()));
        state.uploads.remove(upload_id);
        Ok(())
    }

    fn min_part_size(&self) -> u64 {
        1
    }
}
