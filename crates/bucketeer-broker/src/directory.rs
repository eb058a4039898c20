//! Instance directory collaborator.
//!
//! Binding against additional instances needs the platform's record of
//! which bucket backs which named instance. The platform client holding
//! that record lives outside this crate; the broker only consumes the
//! lookup.

use std::collections::HashMap;

/// Resolves service instance names to their backing bucket names.
#[async_trait::async_trait]
pub trait InstanceDirectory: Send + Sync {
    /// Resolve every instance name to its bucket name, preserving request
    /// order.
    ///
    /// # Errors
    /// Fails if any name is unknown or the directory backend is
    /// unreachable.
    async fn resolve(&self, instance_names: &[String]) -> Result<Vec<String>, DirectoryError>;
}

/// Errors from instance name resolution.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// An instance name the directory does not know.
    #[error("service instance not found: {name}")]
    Unknown {
        /// The unresolvable name.
        name: String,
    },

    /// The directory backend failed.
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// [`InstanceDirectory`] over a fixed map, for tests and static
/// deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryInstanceDirectory {
    entries: HashMap<String, String>,
}

impl MemoryInstanceDirectory {
    /// An empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance and the bucket backing it.
    pub fn insert(&mut self, instance_name: impl Into<String>, bucket: impl Into<String>) {
        self.entries.insert(instance_name.into(), bucket.into());
    }
}

#[async_trait::async_trait]
impl InstanceDirectory for MemoryInstanceDirectory {
    async fn resolve(&self, instance_names: &[String]) -> Result<Vec<String>, DirectoryError> {
        instance_names
            .iter()
            .map(|name| {
                self.entries
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DirectoryError::Unknown { name: name.clone() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;

    use super::*;

    #[test]
    fn test_should_resolve_names_in_request_order() {
        let mut directory = MemoryInstanceDirectory::new();
        directory.insert("reports", "bucketeer-i2");
        directory.insert("archive", "bucketeer-i3");
        let buckets = block_on(directory.resolve(&["archive".into(), "reports".into()])).unwrap();
        assert_eq!(buckets, ["bucketeer-i3", "bucketeer-i2"]);
    }

    #[test]
    fn test_should_fail_on_unknown_name() {
        let directory = MemoryInstanceDirectory::new();
        let err = block_on(directory.resolve(&["ghost".into()])).unwrap_err();
        assert!(matches!(err, DirectoryError::Unknown { name } if name == "ghost"));
    }
}
