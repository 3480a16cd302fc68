//! In-memory object store.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::{
    DeleteResponse, ObjectBody, ObjectHead, ObjectStore, PutOptions, PutResponse, Result,
    StorageError, calculate_checksum,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    content_disposition: Option<String>,
    e_tag: String,
    last_modified: SystemTime,
}

impl StoredObject {
    fn head(&self) -> ObjectHead {
        ObjectHead {
            content_type: self.content_type.clone(),
            content_disposition: self.content_disposition.clone(),
            content_length: Some(self.data.len() as u64),
            e_tag: Some(format!("\"{}\"", self.e_tag)),
            last_modified: Some(httpdate::fmt_http_date(self.last_modified)),
        }
    }
}

/// Object store that keeps everything in process memory.
///
/// Cloning shares the underlying objects, so a test can hold one handle
/// while a route holds another.
///
/// ```
/// use armature_bucket::{MemoryStore, ObjectStore, PutOptions};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store
///     .put_object("media", "a.txt", "hello".into(), PutOptions::default())
///     .await
///     .unwrap();
/// assert!(store.exists("media", "a.txt").await.unwrap());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of an object, if present.
    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// Head of an object, if present.
    pub fn object_head(&self, bucket: &str, key: &str) -> Option<ObjectHead> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(StoredObject::head)
    }

    /// Keys stored in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        debug!(bucket = %bucket, key = %key, "Memory head");
        self.object_head(bucket, key)
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        debug!(bucket = %bucket, key = %key, "Memory get");
        let object = self
            .objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(bucket, key))?;

        Ok(ObjectBody::from_bytes(object.head(), object.data))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<PutResponse> {
        let e_tag = calculate_checksum(&body);
        debug!(bucket = %bucket, key = %key, size = body.len(), "Memory put");

        self.objects.write().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body,
                content_type: options.content_type,
                content_disposition: options.content_disposition,
                e_tag: e_tag.clone(),
                last_modified: SystemTime::now(),
            },
        );

        Ok(PutResponse {
            e_tag: Some(format!("\"{}\"", e_tag)),
            version_id: None,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteResponse> {
        debug!(bucket = %bucket, key = %key, "Memory delete");
        self.objects
            .write()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| DeleteResponse::default())
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_head_get_delete() {
        let store = MemoryStore::new();
        let options = PutOptions {
            content_type: Some("text/plain".into()),
            content_disposition: Some("inline".into()),
        };
        let put = store
            .put_object("b", "k.txt", Bytes::from_static(b"data"), options)
            .await
            .unwrap();
        assert!(put.e_tag.is_some());

        let head = store.head_object("b", "k.txt").await.unwrap();
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
        assert_eq!(head.content_disposition.as_deref(), Some("inline"));
        assert_eq!(head.content_length, Some(4));
        assert_eq!(head.e_tag, put.e_tag);

        let body = store.get_object("b", "k.txt").await.unwrap();
        assert_eq!(body.collect().await.unwrap(), Bytes::from_static(b"data"));

        store.delete_object("b", "k.txt").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.head_object("b", "nope").await.unwrap_err().is_not_found());
        assert!(store.delete_object("b", "nope").await.unwrap_err().is_not_found());
        assert!(!store.exists("b", "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let store = MemoryStore::new();
        store
            .put_object("a", "k", Bytes::new(), PutOptions::default())
            .await
            .unwrap();
        assert!(store.exists("a", "k").await.unwrap());
        assert!(!store.exists("b", "k").await.unwrap());
        assert_eq!(store.keys("a"), vec!["k".to_string()]);
    }
}
