//! The bucket store.
//!
//! [`S3BucketStore`] drives the bucket lifecycle over an [`S3Api`] client:
//! creation with its configuration pipeline (tags, encryption, public
//! access guard, policy), describe, and deletion with optional content
//! purge. Creation is atomic at the bucket-existence level: if any
//! configuration step fails the bucket is deleted again, so callers never
//! observe a half-configured bucket.

use std::collections::HashMap;
use std::time::Duration;

use bucketeer_core::default_endpoint;
use tracing::{debug, info, warn};

use crate::api::S3Api;
use crate::encryption::EncryptionConfiguration;
use crate::error::StoreResult;
use crate::policy::{grants_public_read, render_bucket_policy};
use crate::types::{BucketDetails, BucketInfo};

/// Total attempts when the backend keeps refusing a bucket policy.
/// Freshly created buckets can take a while before policy writes are
/// authorized.
const MAX_POLICY_ATTEMPTS: u32 = 11;

/// Pause between policy attempts outside of tests.
const DEFAULT_POLICY_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Batch size limit for object deletion.
const MAX_DELETE_BATCH: usize = 1000;

/// Bucket lifecycle operations as the broker sees them.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Look up an existing bucket's region, ARN, and endpoint.
    async fn describe(&self, name: &str, partition: &str) -> StoreResult<BucketInfo>;

    /// Create and fully configure a bucket, returning its location.
    ///
    /// Either the bucket exists with every configured setting applied, or
    /// it does not exist at all.
    async fn create(&self, name: &str, details: &BucketDetails) -> StoreResult<String>;

    /// Replace the bucket's tag set.
    async fn apply_tags(&self, name: &str, tags: &HashMap<String, String>) -> StoreResult<()>;

    /// Apply a server-side encryption document.
    async fn apply_encryption(&self, name: &str, document: &serde_json::Value) -> StoreResult<()>;

    /// Apply a rendered bucket policy, retrying while the backend answers
    /// access-denied.
    async fn apply_policy(&self, name: &str, document: &str) -> StoreResult<()>;

    /// Remove the public access guard placed on new buckets by default.
    async fn remove_public_access_guard(&self, name: &str) -> StoreResult<()>;

    /// Delete the bucket, purging its contents first when asked.
    async fn delete(&self, name: &str, purge_contents: bool) -> StoreResult<()>;
}

/// [`ObjectStore`] backed by an S3 client.
#[derive(Debug)]
pub struct S3BucketStore<C> {
    api: C,
    region: String,
    endpoint_override: Option<String>,
    retry_delay: Duration,
}

impl<C: S3Api> S3BucketStore<C> {
    /// Create a store provisioning buckets in `region`.
    pub fn new(api: C, region: impl Into<String>) -> Self {
        Self {
            api,
            region: region.into(),
            endpoint_override: None,
            retry_delay: DEFAULT_POLICY_RETRY_DELAY,
        }
    }

    /// Report `endpoint` for every bucket instead of deriving one from the
    /// bucket's region. Used with S3-compatible backends.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Change the pause between policy attempts. Tests set this to zero.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn configure(&self, name: &str, details: &BucketDetails) -> StoreResult<()> {
        self.apply_tags(name, &details.tags).await?;

        if let Some(document) = &details.encryption {
            self.apply_encryption(name, document).await?;
        }

        if let Some(template) = &details.policy {
            // The template decides up front whether the guard must go;
            // malformed templates fail here before any further remote call.
            if grants_public_read(template)? {
                self.remove_public_access_guard(name).await?;
            }
            let rendered = render_bucket_policy(template, name, &details.partition);
            self.apply_policy(name, &rendered).await?;
        }

        Ok(())
    }

    async fn purge(&self, name: &str) -> StoreResult<()> {
        let keys = self.api.list_object_keys(name).await?;
        if keys.is_empty() {
            return Ok(());
        }
        info!(bucket = name, objects = keys.len(), "purging bucket contents");
        for chunk in keys.chunks(MAX_DELETE_BATCH) {
            let failures = self.api.delete_objects(name, chunk).await?;
            // Objects already gone do not fail the purge.
            let real: Vec<_> = failures
                .into_iter()
                .filter(|f| f.code != "NoSuchKey" && f.code != "NoSuchBucket")
                .collect();
            if let Some(first) = real.first() {
                warn!(
                    bucket = name,
                    failed = real.len(),
                    code = %first.code,
                    "bucket purge left objects behind"
                );
                return Err(crate::error::StoreError::Api {
                    code: first.code.clone(),
                    message: format!(
                        "failed to delete {} objects from {name}: {}",
                        real.len(),
                        first.message
                    ),
                });
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: S3Api> ObjectStore for S3BucketStore<C> {
    async fn describe(&self, name: &str, partition: &str) -> StoreResult<BucketInfo> {
        let region = self.api.bucket_location(name).await?;
        let endpoint = self
            .endpoint_override
            .clone()
            .unwrap_or_else(|| default_endpoint(&region));
        Ok(BucketInfo {
            name: name.to_owned(),
            arn: format!("arn:{partition}:s3:::{name}"),
            region,
            endpoint,
        })
    }

    async fn create(&self, name: &str, details: &BucketDetails) -> StoreResult<String> {
        let location = self
            .api
            .create_bucket(name, &self.region, details.object_ownership)
            .await?;
        info!(bucket = name, location, "created bucket");

        if let Err(err) = self.configure(name, details).await {
            warn!(bucket = name, error = %err, "bucket configuration failed, deleting bucket");
            if let Err(cleanup) = self.api.delete_bucket(name).await {
                warn!(bucket = name, error = %cleanup, "failed to delete half-configured bucket");
            }
            return Err(err);
        }

        Ok(location)
    }

    async fn apply_tags(&self, name: &str, tags: &HashMap<String, String>) -> StoreResult<()> {
        self.api.put_bucket_tags(name, tags).await
    }

    async fn apply_encryption(&self, name: &str, document: &serde_json::Value) -> StoreResult<()> {
        let config = EncryptionConfiguration::parse(document)?;
        self.api.put_bucket_encryption(name, &config).await
    }

    async fn apply_policy(&self, name: &str, document: &str) -> StoreResult<()> {
        let mut attempt = 1;
        loop {
            match self.api.put_bucket_policy(name, document).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_access_denied() && attempt < MAX_POLICY_ATTEMPTS => {
                    debug!(bucket = name, attempt, "bucket policy refused, retrying");
                    attempt += 1;
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn remove_public_access_guard(&self, name: &str) -> StoreResult<()> {
        info!(bucket = name, "removing public access guard");
        self.api.delete_public_access_block(name).await
    }

    async fn delete(&self, name: &str, purge_contents: bool) -> StoreResult<()> {
        if purge_contents {
            self.purge(name).await?;
        }
        self.api.delete_bucket(name).await?;
        info!(bucket = name, purged = purge_contents, "deleted bucket");
        Ok(())
    }
}
