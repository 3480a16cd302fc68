//! Object store trait and common types.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

use crate::Result;

/// Streaming object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// Facts about an existing object, as reported by a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Stored content type.
    pub content_type: Option<String>,
    /// Stored content disposition header value.
    pub content_disposition: Option<String>,
    /// Object size in bytes.
    pub content_length: Option<u64>,
    /// Entity tag.
    pub e_tag: Option<String>,
    /// Last modification time, already formatted as an HTTP date.
    pub last_modified: Option<String>,
}

/// Streaming read of an object.
pub struct ObjectBody {
    /// Status reported by the backend for the read.
    pub status: u16,
    /// Object facts returned alongside the body.
    pub head: ObjectHead,
    /// Body bytes.
    pub stream: ByteStream,
}

impl ObjectBody {
    /// Wrap an in-memory body.
    pub fn from_bytes(head: ObjectHead, data: Bytes) -> Self {
        Self {
            status: 200,
            head,
            stream: Box::pin(futures::stream::once(async move { Ok(data) })),
        }
    }

    /// Drain the body into a single buffer.
    pub async fn collect(self) -> std::io::Result<Bytes> {
        use futures::TryStreamExt;

        let chunks: Vec<Bytes> = self.stream.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("status", &self.status)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Storage-side metadata written with an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Content type to store.
    pub content_type: Option<String>,
    /// Content disposition header value to store.
    pub content_disposition: Option<String>,
}

/// Backend response to a successful put.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutResponse {
    /// Entity tag of the new object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    /// Version id, if the bucket is versioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// Backend response to a successful delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    /// Whether a delete marker was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_marker: Option<bool>,
    /// Version id of the removed object or marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// Object store backend.
///
/// The four primitives the route pipelines are built on. Implementations
/// report a missing object as [`StorageError::NotFound`](crate::StorageError::NotFound)
/// and any other failing backend status as
/// [`StorageError::Status`](crate::StorageError::Status).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch object facts without the body.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;

    /// Open a streaming read of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Store bytes under a key.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<PutResponse>;

    /// Delete an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteResponse>;

    /// Check if an object exists.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Calculate SHA-256 checksum of data.
pub fn calculate_checksum(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
