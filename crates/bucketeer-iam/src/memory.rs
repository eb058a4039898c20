//! In-memory [`IdentityStore`] used by tests and local development.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{IdentityError, IdentityResult};
use crate::policy::render_iam_policy;
use crate::store::IdentityStore;
use crate::types::AccessKey;

const ACCOUNT: &str = "123456789012";

/// A principal held by the memory store.
#[derive(Debug, Clone)]
pub struct StoredPrincipal {
    /// The principal's ARN.
    pub arn: String,
    /// Path the principal was created under.
    pub path: String,
    /// Tags stamped at creation.
    pub tags: HashMap<String, String>,
    /// Ids of live access keys.
    pub access_keys: Vec<String>,
    /// ARNs of attached policies.
    pub attached_policies: Vec<String>,
}

/// A managed policy held by the memory store.
#[derive(Debug, Clone)]
pub struct StoredPolicy {
    /// Policy name.
    pub name: String,
    /// Path the policy was created under.
    pub path: String,
    /// The rendered policy document.
    pub document: String,
    /// Tags stamped at creation.
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Inner {
    principals: HashMap<String, StoredPrincipal>,
    policies: HashMap<String, StoredPolicy>,
    calls: Vec<String>,
    failing_ops: HashMap<String, String>,
    counter: u64,
}

/// [`IdentityStore`] holding principals and policies in memory.
///
/// Mirrors the backend's behavior closely enough to catch ordering bugs:
/// principals cannot be deleted while keys or policies are attached, and
/// policies cannot be deleted while attached to a principal. Records every
/// operation and supports per-operation failure injection.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Inner>,
}

impl MemoryIdentityStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    /// Whether a principal exists.
    #[must_use]
    pub fn has_principal(&self, name: &str) -> bool {
        self.inner.lock().principals.contains_key(name)
    }

    /// A snapshot of one principal, if present.
    #[must_use]
    pub fn principal(&self, name: &str) -> Option<StoredPrincipal> {
        self.inner.lock().principals.get(name).cloned()
    }

    /// The ARNs of every managed policy currently held.
    #[must_use]
    pub fn policy_arns(&self) -> Vec<String> {
        let mut arns: Vec<String> = self.inner.lock().policies.keys().cloned().collect();
        arns.sort();
        arns
    }

    /// A snapshot of one policy by ARN, if present.
    #[must_use]
    pub fn policy(&self, arn: &str) -> Option<StoredPolicy> {
        self.inner.lock().policies.get(arn).cloned()
    }

    fn check(&self, op: &str, subject: &str) -> IdentityResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(format!("{op} {subject}"));
        if let Some(message) = inner.failing_ops.get(op) {
            return Err(IdentityError::Api {
                code: "InternalError".to_owned(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create_principal(
        &self,
        name: &str,
        path: &str,
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String> {
        self.check("create-principal", name)?;
        let mut inner = self.inner.lock();
        if inner.principals.contains_key(name) {
            return Err(IdentityError::Api {
                code: "EntityAlreadyExists".to_owned(),
                message: format!("user already exists: {name}"),
            });
        }
        let arn = format!("arn:aws:iam::{ACCOUNT}:user{path}{name}");
        inner.principals.insert(
            name.to_owned(),
            StoredPrincipal {
                arn: arn.clone(),
                path: path.to_owned(),
                tags: tags.clone(),
                access_keys: Vec::new(),
                attached_policies: Vec::new(),
            },
        );
        Ok(arn)
    }

    async fn delete_principal(&self, name: &str) -> IdentityResult<()> {
        self.check("delete-principal", name)?;
        let mut inner = self.inner.lock();
        let Some(principal) = inner.principals.get(name) else {
            return Err(IdentityError::NotFound {
                name: name.to_owned(),
            });
        };
        if !principal.access_keys.is_empty() || !principal.attached_policies.is_empty() {
            return Err(IdentityError::Api {
                code: "DeleteConflict".to_owned(),
                message: format!("user still has attached resources: {name}"),
            });
        }
        inner.principals.remove(name);
        Ok(())
    }

    async fn create_access_key(&self, name: &str) -> IdentityResult<AccessKey> {
        self.check("create-access-key", name)?;
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let key = AccessKey {
            id: format!("AKIA{:016X}", inner.counter),
            secret: format!("secret-{}", inner.counter),
        };
        match inner.principals.get_mut(name) {
            Some(principal) => {
                principal.access_keys.push(key.id.clone());
                Ok(key)
            }
            None => Err(IdentityError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    async fn delete_access_key(&self, name: &str, key_id: &str) -> IdentityResult<()> {
        self.check("delete-access-key", &format!("{name} {key_id}"))?;
        let mut inner = self.inner.lock();
        let Some(principal) = inner.principals.get_mut(name) else {
            return Err(IdentityError::NotFound {
                name: name.to_owned(),
            });
        };
        let before = principal.access_keys.len();
        principal.access_keys.retain(|id| id != key_id);
        if principal.access_keys.len() == before {
            return Err(IdentityError::NotFound {
                name: key_id.to_owned(),
            });
        }
        Ok(())
    }

    async fn list_access_keys(&self, name: &str) -> IdentityResult<Vec<String>> {
        self.check("list-access-keys", name)?;
        let inner = self.inner.lock();
        match inner.principals.get(name) {
            Some(principal) => Ok(principal.access_keys.clone()),
            None => Err(IdentityError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    async fn create_policy(
        &self,
        name: &str,
        path: &str,
        template: &str,
        resource_arns: &[String],
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String> {
        self.check("create-policy", name)?;
        let document = render_iam_policy(template, resource_arns)?;
        let mut inner = self.inner.lock();
        let arn = format!("arn:aws:iam::{ACCOUNT}:policy{path}{name}");
        if inner.policies.contains_key(&arn) {
            return Err(IdentityError::Api {
                code: "EntityAlreadyExists".to_owned(),
                message: format!("policy already exists: {name}"),
            });
        }
        inner.policies.insert(
            arn.clone(),
            StoredPolicy {
                name: name.to_owned(),
                path: path.to_owned(),
                document,
                tags: tags.clone(),
            },
        );
        Ok(arn)
    }

    async fn delete_policy(&self, arn: &str) -> IdentityResult<()> {
        self.check("delete-policy", arn)?;
        let mut inner = self.inner.lock();
        if !inner.policies.contains_key(arn) {
            return Err(IdentityError::NotFound {
                name: arn.to_owned(),
            });
        }
        let attached = inner
            .principals
            .values()
            .any(|principal| principal.attached_policies.iter().any(|a| a == arn));
        if attached {
            return Err(IdentityError::Api {
                code: "DeleteConflict".to_owned(),
                message: format!("policy still attached: {arn}"),
            });
        }
        inner.policies.remove(arn);
        Ok(())
    }

    async fn attach_policy(&self, name: &str, arn: &str) -> IdentityResult<()> {
        self.check("attach-policy", &format!("{name} {arn}"))?;
        let mut inner = self.inner.lock();
        if !inner.policies.contains_key(arn) {
            return Err(IdentityError::NotFound {
                name: arn.to_owned(),
            });
        }
        let Some(principal) = inner.principals.get_mut(name) else {
            return Err(IdentityError::NotFound {
                name: name.to_owned(),
            });
        };
        if !principal.attached_policies.iter().any(|a| a == arn) {
            principal.attached_policies.push(arn.to_owned());
        }
        Ok(())
    }

    async fn detach_policy(&self, name: &str, arn: &str) -> IdentityResult<()> {
        self.check("detach-policy", &format!("{name} {arn}"))?;
        let mut inner = self.inner.lock();
        let Some(principal) = inner.principals.get_mut(name) else {
            return Err(IdentityError::NotFound {
                name: name.to_owned(),
            });
        };
        let before = principal.attached_policies.len();
        principal.attached_policies.retain(|a| a != arn);
        if principal.attached_policies.len() == before {
            return Err(IdentityError::NotFound {
                name: arn.to_owned(),
            });
        }
        Ok(())
    }

    async fn list_attached_policies(&self, name: &str, path: &str) -> IdentityResult<Vec<String>> {
        self.check("list-attached-policies", name)?;
        let inner = self.inner.lock();
        let Some(principal) = inner.principals.get(name) else {
            return Err(IdentityError::NotFound {
                name: name.to_owned(),
            });
        };
        let arns = principal
            .attached_policies
            .iter()
            .filter(|arn| {
                inner
                    .policies
                    .get(*arn)
                    .is_some_and(|policy| policy.path.starts_with(path))
            })
            .cloned()
            .collect();
        Ok(arns)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;

    use super::*;

    const TEMPLATE: &str = r#"{
      "Statement": [
        {"Effect": "Allow", "Action": ["s3:*"], "Resource": ["{{bucket_arns}}", "{{object_arns}}"]}
      ]
    }"#;

    fn tags() -> HashMap<String, String> {
        HashMap::from([("Owner".to_owned(), "Cloud Foundry".to_owned())])
    }

    #[test]
    fn test_should_issue_key_and_attach_policy() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            let user_arn = store
                .create_principal("bucketeer-b1", "/bucketeer/", &tags())
                .await
                .unwrap();
            assert_eq!(user_arn, "arn:aws:iam::123456789012:user/bucketeer/bucketeer-b1");

            let key = store.create_access_key("bucketeer-b1").await.unwrap();
            assert!(key.id.starts_with("AKIA"));

            let arns = vec!["arn:aws:s3:::bucketeer-i1".to_owned()];
            let policy_arn = store
                .create_policy("bucketeer-b1", "/bucketeer/", TEMPLATE, &arns, &tags())
                .await
                .unwrap();
            store.attach_policy("bucketeer-b1", &policy_arn).await.unwrap();

            let principal = store.principal("bucketeer-b1").unwrap();
            assert_eq!(principal.access_keys, [key.id]);
            assert_eq!(principal.attached_policies, [policy_arn.clone()]);

            let document = store.policy(&policy_arn).unwrap().document;
            assert!(document.contains("arn:aws:s3:::bucketeer-i1"));
            assert!(document.contains("arn:aws:s3:::bucketeer-i1/*"));
        });
    }

    #[test]
    fn test_should_refuse_deleting_principal_with_resources() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            store
                .create_principal("bucketeer-b1", "/", &tags())
                .await
                .unwrap();
            store.create_access_key("bucketeer-b1").await.unwrap();

            let err = store.delete_principal("bucketeer-b1").await.unwrap_err();
            assert!(err.to_string().contains("DeleteConflict"));
        });
    }

    #[test]
    fn test_should_refuse_deleting_attached_policy() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            store
                .create_principal("bucketeer-b1", "/", &tags())
                .await
                .unwrap();
            let arn = store
                .create_policy("bucketeer-b1", "/", TEMPLATE, &[], &tags())
                .await
                .unwrap();
            store.attach_policy("bucketeer-b1", &arn).await.unwrap();

            let err = store.delete_policy(&arn).await.unwrap_err();
            assert!(err.to_string().contains("DeleteConflict"));
        });
    }

    #[test]
    fn test_should_report_missing_targets_as_not_found() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            assert!(store.delete_principal("ghost").await.unwrap_err().is_not_found());
            assert!(store.list_access_keys("ghost").await.unwrap_err().is_not_found());
            assert!(
                store
                    .list_attached_policies("ghost", "/")
                    .await
                    .unwrap_err()
                    .is_not_found()
            );
            assert!(
                store
                    .delete_policy("arn:aws:iam::123456789012:policy/ghost")
                    .await
                    .unwrap_err()
                    .is_not_found()
            );
        });
    }

    #[test]
    fn test_should_tear_down_in_dependency_order() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            store
                .create_principal("bucketeer-b1", "/", &tags())
                .await
                .unwrap();
            let key = store.create_access_key("bucketeer-b1").await.unwrap();
            let arn = store
                .create_policy("bucketeer-b1", "/", TEMPLATE, &[], &tags())
                .await
                .unwrap();
            store.attach_policy("bucketeer-b1", &arn).await.unwrap();

            store
                .delete_access_key("bucketeer-b1", &key.id)
                .await
                .unwrap();
            store.detach_policy("bucketeer-b1", &arn).await.unwrap();
            store.delete_policy(&arn).await.unwrap();
            store.delete_principal("bucketeer-b1").await.unwrap();

            assert!(!store.has_principal("bucketeer-b1"));
            assert!(store.policy_arns().is_empty());
        });
    }

    #[test]
    fn test_should_filter_attached_policies_by_path() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            store
                .create_principal("bucketeer-b1", "/bucketeer/", &tags())
                .await
                .unwrap();
            let managed = store
                .create_policy("mine", "/bucketeer/", TEMPLATE, &[], &tags())
                .await
                .unwrap();
            let foreign = store
                .create_policy("other", "/elsewhere/", TEMPLATE, &[], &tags())
                .await
                .unwrap();
            store.attach_policy("bucketeer-b1", &managed).await.unwrap();
            store.attach_policy("bucketeer-b1", &foreign).await.unwrap();

            let arns = store
                .list_attached_policies("bucketeer-b1", "/bucketeer/")
                .await
                .unwrap();
            assert_eq!(arns, [managed]);
        });
    }

    #[test]
    fn test_should_inject_failures_per_operation() {
        block_on(async {
            let store = MemoryIdentityStore::new();
            store.fail("create-access-key", "backend down");
            store
                .create_principal("bucketeer-b1", "/", &tags())
                .await
                .unwrap();
            let err = store.create_access_key("bucketeer-b1").await.unwrap_err();
            assert!(err.to_string().contains("backend down"));
            assert_eq!(
                store.calls(),
                ["create-principal bucketeer-b1", "create-access-key bucketeer-b1"]
            );
        });
    }
}
