//! AWS S3 object store.

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region, http::HttpResponse},
    error::{DisplayErrorContext, SdkError},
    primitives::{ByteStream as SdkByteStream, DateTimeFormat},
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::{
    ConnectionConfig, CredentialsSource, DeleteResponse, ObjectBody, ObjectHead, ObjectStore,
    PutOptions, PutResponse, Result, StorageError,
};

/// S3 (or S3-compatible) object store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a store from connection settings.
    pub async fn new(connection: &ConnectionConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(connection.region.clone()));

        if let CredentialsSource::Explicit {
            access_key_id,
            secret_access_key,
            session_token,
        } = &connection.credentials
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                "armature-bucket",
            ));
        }

        let aws_config = loader.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(connection.force_path_style);

        let endpoint = connection.endpoint_url();
        if let Some(endpoint) = &endpoint {
            s3_config = s3_config.endpoint_url(endpoint);
        }

        info!(region = %connection.region, endpoint = ?endpoint, "Initialized S3 store");

        Ok(Self {
            client: Client::from_conf(s3_config.build()),
        })
    }

    /// Wrap an existing SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map an SDK failure to a storage error carrying the HTTP status.
fn sdk_error<E>(err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let message = DisplayErrorContext(&err).to_string();
    match status {
        Some(status) => StorageError::status(status, message),
        None => StorageError::Network(message),
    }
}

fn is_404<E>(err: &SdkError<E, HttpResponse>) -> bool {
    err.raw_response()
        .is_some_and(|r| r.status().as_u16() == 404)
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        debug!(bucket = %bucket, key = %key, "S3 HeadObject");

        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) || is_404(&e) {
                    StorageError::not_found(bucket, key)
                } else {
                    sdk_error(e)
                }
            })?;

        Ok(ObjectHead {
            content_type: output.content_type().map(String::from),
            content_disposition: output.content_disposition().map(String::from),
            content_length: output.content_length().and_then(|l| u64::try_from(l).ok()),
            e_tag: output.e_tag().map(String::from),
            last_modified: output
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::HttpDate).ok()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        debug!(bucket = %bucket, key = %key, "S3 GetObject");

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) || is_404(&e) {
                    StorageError::not_found(bucket, key)
                } else {
                    sdk_error(e)
                }
            })?;

        let head = ObjectHead {
            content_type: output.content_type().map(String::from),
            content_disposition: output.content_disposition().map(String::from),
            content_length: output.content_length().and_then(|l| u64::try_from(l).ok()),
            e_tag: output.e_tag().map(String::from),
            last_modified: output
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::HttpDate).ok()),
        };

        Ok(ObjectBody {
            status: 200,
            head,
            stream: Box::pin(ReaderStream::new(output.body.into_async_read())),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<PutResponse> {
        let size = body.len();

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(SdkByteStream::from(body))
            .set_content_type(options.content_type)
            .set_content_disposition(options.content_disposition)
            .send()
            .await
            .map_err(sdk_error)?;

        debug!(bucket = %bucket, key = %key, size = size, "Uploaded to S3");

        Ok(PutResponse {
            e_tag: output.e_tag().map(String::from),
            version_id: output.version_id().map(String::from),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteResponse> {
        let output = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_404(&e) {
                    StorageError::not_found(bucket, key)
                } else {
                    sdk_error(e)
                }
            })?;

        debug!(bucket = %bucket, key = %key, "Deleted from S3");

        Ok(DeleteResponse {
            delete_marker: output.delete_marker(),
            version_id: output.version_id().map(String::from),
        })
    }
}
