//! The narrow S3 client surface the store is built on.

use std::collections::HashMap;

use crate::encryption::EncryptionConfiguration;
use crate::error::StoreResult;
use crate::types::{DeleteFailure, ObjectOwnership};

/// The S3 operations the bucket store needs.
///
/// Implemented by the real SDK client wrapper and by scripted doubles in
/// tests.
#[async_trait::async_trait]
pub trait S3Api: Send + Sync {
    /// The region a bucket lives in. An absent location constraint means
    /// `us-east-1`.
    async fn bucket_location(&self, bucket: &str) -> StoreResult<String>;

    /// Create a bucket in `region`, returning the service-reported
    /// location.
    async fn create_bucket(
        &self,
        bucket: &str,
        region: &str,
        ownership: ObjectOwnership,
    ) -> StoreResult<String>;

    /// Replace the bucket's tag set.
    async fn put_bucket_tags(&self, bucket: &str, tags: &HashMap<String, String>) -> StoreResult<()>;

    /// Apply a server-side encryption configuration.
    async fn put_bucket_encryption(
        &self,
        bucket: &str,
        config: &EncryptionConfiguration,
    ) -> StoreResult<()>;

    /// Apply a rendered bucket policy document. One attempt; retry policy
    /// lives in the store.
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()>;

    /// Remove the account-level public access guard from the bucket.
    async fn delete_public_access_block(&self, bucket: &str) -> StoreResult<()>;

    /// Delete the bucket. The bucket must be empty.
    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// List every object key in the bucket.
    async fn list_object_keys(&self, bucket: &str) -> StoreResult<Vec<String>>;

    /// Batch-delete objects, returning per-key failures. An empty result
    /// means every key is gone.
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> StoreResult<Vec<DeleteFailure>>;
}
