//! The identity store seam.

use std::collections::HashMap;

use crate::error::IdentityResult;
use crate::types::AccessKey;

/// Identity operations as the broker sees them.
///
/// One principal exists per binding, holding one access key and one
/// attached policy while the binding is alive. The store is stateless
/// between calls; callers re-derive names deterministically instead of
/// caching resource state.
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create a principal under `path`, returning its ARN.
    async fn create_principal(
        &self,
        name: &str,
        path: &str,
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String>;

    /// Delete a principal. Fails while access keys or policies are still
    /// attached.
    async fn delete_principal(&self, name: &str) -> IdentityResult<()>;

    /// Issue an access key pair for a principal.
    async fn create_access_key(&self, name: &str) -> IdentityResult<AccessKey>;

    /// Delete one access key of a principal.
    async fn delete_access_key(&self, name: &str, key_id: &str) -> IdentityResult<()>;

    /// List the access key ids of a principal.
    async fn list_access_keys(&self, name: &str) -> IdentityResult<Vec<String>>;

    /// Create a managed policy from a template expanded against
    /// `resource_arns`, returning the policy ARN.
    async fn create_policy(
        &self,
        name: &str,
        path: &str,
        template: &str,
        resource_arns: &[String],
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String>;

    /// Delete a managed policy. Fails while the policy is still attached.
    async fn delete_policy(&self, arn: &str) -> IdentityResult<()>;

    /// Attach a managed policy to a principal.
    async fn attach_policy(&self, name: &str, arn: &str) -> IdentityResult<()>;

    /// Detach a managed policy from a principal.
    async fn detach_policy(&self, name: &str, arn: &str) -> IdentityResult<()>;

    /// List the ARNs of policies attached to a principal, restricted to
    /// policies under the given path prefix.
    async fn list_attached_policies(&self, name: &str, path: &str) -> IdentityResult<Vec<String>>;
}
