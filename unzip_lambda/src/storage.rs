use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, types::ObjectCannedAcl, Client as S3Client};
use bytes::Bytes;

use crate::error::UnpackError;
use crate::keys::copy_source;

/// Result of a prefix listing, truncated to the requested page size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub count: usize,
    pub first_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub content_encoding: String,
    pub acl: ObjectCannedAcl,
}

/// Object storage operations the unpacker depends on.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_results: i32,
    ) -> Result<ObjectListing, UnpackError>;

    async fn copy_object(
        &self,
        bucket: &str,
        source_bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), UnpackError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, UnpackError>;

    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), UnpackError>;
}

/// [`ObjectStorage`] backed by Amazon S3.
pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_results: i32,
    ) -> Result<ObjectListing, UnpackError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_results)
            .send()
            .await
            .map_err(|e| UnpackError::from_sdk("ListObjectsV2", e))?;

        let first_key = resp
            .contents()
            .first()
            .and_then(|object| object.key())
            .map(str::to_string);
        let count = resp
            .key_count()
            .map(|count| count.max(0) as usize)
            .unwrap_or_else(|| resp.contents().len());

        Ok(ObjectListing { count, first_key })
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source_bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), UnpackError> {
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source(source_bucket, source_key))
            .key(destination_key)
            .send()
            .await
            .map_err(|e| UnpackError::from_sdk("CopyObject", e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, UnpackError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| UnpackError::from_sdk("GetObject", e))?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| UnpackError::Uncategorized(format!("failed to read body of {key}: {e}")))?;
        Ok(body.into_bytes())
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), UnpackError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(object.key)
            .body(ByteStream::from(object.body))
            .content_type(object.content_type)
            .content_encoding(object.content_encoding)
            .acl(object.acl)
            .send()
            .await
            .map_err(|e| UnpackError::from_sdk("PutObject", e))?;
        Ok(())
    }
}
