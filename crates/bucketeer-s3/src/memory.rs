//! In-memory [`ObjectStore`] used by tests and local development.

use std::collections::HashMap;
use std::time::Duration;

use bucketeer_core::default_endpoint;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::ObjectStore;
use crate::types::{BucketDetails, BucketInfo};

/// A bucket held by the memory store.
#[derive(Debug, Clone)]
pub struct StoredBucket {
    /// Region the bucket was created in.
    pub region: String,
    /// The creation details as passed to [`ObjectStore::create`].
    pub details: BucketDetails,
}

#[derive(Debug, Default)]
struct Inner {
    region: String,
    buckets: HashMap<String, StoredBucket>,
    calls: Vec<String>,
    describe_delays: HashMap<String, Duration>,
    failing_ops: HashMap<String, String>,
}

/// [`ObjectStore`] holding buckets in memory.
///
/// Records every operation so callers can assert on ordering, supports
/// per-operation failure injection, and can delay individual describes to
/// exercise out-of-order completion.
#[derive(Debug)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// An empty store placing buckets in `us-east-1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                region: "us-east-1".to_owned(),
                ..Inner::default()
            }),
        }
    }

    /// Change the region new buckets are placed in.
    pub fn set_region(&self, region: impl Into<String>) {
        self.inner.lock().region = region.into();
    }

    /// Insert an existing bucket.
    pub fn seed(&self, name: impl Into<String>) {
        let mut inner = self.inner.lock();
        let region = inner.region.clone();
        inner.buckets.insert(
            name.into(),
            StoredBucket {
                region,
                details: BucketDetails::default(),
            },
        );
    }

    /// Insert an existing bucket living in a specific region.
    pub fn seed_in_region(&self, name: impl Into<String>, region: impl Into<String>) {
        self.inner.lock().buckets.insert(
            name.into(),
            StoredBucket {
                region: region.into(),
                details: BucketDetails::default(),
            },
        );
    }

    /// Delay the describe of one bucket.
    pub fn set_describe_delay(&self, name: impl Into<String>, delay: Duration) {
        self.inner.lock().describe_delays.insert(name.into(), delay);
    }

    /// Make every call of `op` fail with an internal error.
    pub fn fail(&self, op: &str, message: impl Into<String>) {
        self.inner
            .lock()
            .failing_ops
            .insert(op.to_owned(), message.into());
    }

    /// Every operation performed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    /// Whether a bucket exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().buckets.contains_key(name)
    }

    /// A snapshot of one bucket, if present.
    #[must_use]
    pub fn bucket(&self, name: &str) -> Option<StoredBucket> {
        self.inner.lock().buckets.get(name).cloned()
    }

    fn check(&self, op: &str, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("{op} {name}"));
        if let Some(message) = inner.failing_ops.get(op) {
            return Err(StoreError::Api {
                code: "InternalError".to_owned(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn describe(&self, name: &str, partition: &str) -> StoreResult<BucketInfo> {
        self.check("describe", name)?;
        let delay = self.inner.lock().describe_delays.get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.inner.lock();
        let bucket = inner.buckets.get(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_owned(),
        })?;
        Ok(BucketInfo {
            name: name.to_owned(),
            arn: format!("arn:{partition}:s3:::{name}"),
            region: bucket.region.clone(),
            endpoint: default_endpoint(&bucket.region),
        })
    }

    async fn create(&self, name: &str, details: &BucketDetails) -> StoreResult<String> {
        self.check("create", name)?;
        let mut inner = self.inner.lock();
        if inner.buckets.contains_key(name) {
            return Err(StoreError::Api {
                code: "BucketAlreadyOwnedByYou".to_owned(),
                message: format!("bucket already exists: {name}"),
            });
        }
        let region = inner.region.clone();
        inner.buckets.insert(
            name.to_owned(),
            StoredBucket {
                region,
                details: details.clone(),
            },
        );
        Ok(format!("/{name}"))
    }

    async fn apply_tags(&self, name: &str, tags: &HashMap<String, String>) -> StoreResult<()> {
        self.check("apply-tags", name)?;
        let mut inner = self.inner.lock();
        match inner.buckets.get_mut(name) {
            Some(bucket) => {
                bucket.details.tags = tags.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    async fn apply_encryption(&self, name: &str, document: &serde_json::Value) -> StoreResult<()> {
        self.check("apply-encryption", name)?;
        let mut inner = self.inner.lock();
        match inner.buckets.get_mut(name) {
            Some(bucket) => {
                bucket.details.encryption = Some(document.clone());
                Ok(())
            }
            None => Err(StoreError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    async fn apply_policy(&self, name: &str, document: &str) -> StoreResult<()> {
        self.check("apply-policy", name)?;
        let mut inner = self.inner.lock();
        match inner.buckets.get_mut(name) {
            Some(bucket) => {
                bucket.details.policy = Some(document.to_owned());
                Ok(())
            }
            None => Err(StoreError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    async fn remove_public_access_guard(&self, name: &str) -> StoreResult<()> {
        self.check("remove-guard", name)
    }

    async fn delete(&self, name: &str, purge_contents: bool) -> StoreResult<()> {
        self.check(&format!("delete purge={purge_contents}"), name)?;
        let mut inner = self.inner.lock();
        if inner.buckets.remove(name).is_none() {
            return Err(StoreError::NotFound {
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_describe_seeded_bucket() {
        let store = MemoryObjectStore::new();
        store.seed_in_region("bucketeer-a", "eu-west-1");
        let info = store.describe("bucketeer-a", "aws").await.unwrap();
        assert_eq!(info.arn, "arn:aws:s3:::bucketeer-a");
        assert_eq!(info.region, "eu-west-1");
        assert_eq!(info.endpoint, "s3-eu-west-1.amazonaws.com");
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_as_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.describe("nope", "aws").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete("nope", false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_record_delete_purge_flag() {
        let store = MemoryObjectStore::new();
        store.seed("b");
        store.delete("b", true).await.unwrap();
        assert_eq!(store.calls(), ["delete purge=true b"]);
        assert!(!store.contains("b"));
    }

    #[tokio::test]
    async fn test_should_inject_failures_per_operation() {
        let store = MemoryObjectStore::new();
        store.fail("create", "backend down");
        let err = store
            .create("b", &BucketDetails::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend down"));
        assert!(!store.contains("b"));
    }
}
