//! [`IdentityStore`] backed by the AWS SDK client.

use std::collections::HashMap;

use anyhow::anyhow;
use aws_sdk_iam::Client;
use aws_sdk_iam::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_iam::types::Tag;
use tracing::debug;

use crate::error::{IdentityError, IdentityResult};
use crate::policy::render_iam_policy;
use crate::store::IdentityStore;
use crate::types::AccessKey;

/// The real IAM client.
#[derive(Debug, Clone)]
pub struct AwsIdentityStore {
    client: Client,
}

impl AwsIdentityStore {
    /// Wrap an SDK client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IdentityStore for AwsIdentityStore {
    async fn create_principal(
        &self,
        name: &str,
        path: &str,
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String> {
        debug!(user = name, path, "create-user");
        let output = self
            .client
            .create_user()
            .user_name(name)
            .path(path)
            .set_tags(Some(build_tags(tags)?))
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        let arn = output
            .user()
            .map(|user| user.arn().to_owned())
            .ok_or_else(|| IdentityError::Internal(anyhow!("create user response has no user")))?;
        Ok(arn)
    }

    async fn delete_principal(&self, name: &str) -> IdentityResult<()> {
        debug!(user = name, "delete-user");
        self.client
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        Ok(())
    }

    async fn create_access_key(&self, name: &str) -> IdentityResult<AccessKey> {
        debug!(user = name, "create-access-key");
        let output = self
            .client
            .create_access_key()
            .user_name(name)
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        let key = output.access_key().ok_or_else(|| {
            IdentityError::Internal(anyhow!("create access key response has no key"))
        })?;
        Ok(AccessKey {
            id: key.access_key_id().to_owned(),
            secret: key.secret_access_key().to_owned(),
        })
    }

    async fn delete_access_key(&self, name: &str, key_id: &str) -> IdentityResult<()> {
        debug!(user = name, key_id, "delete-access-key");
        self.client
            .delete_access_key()
            .user_name(name)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|err| classify_sdk(key_id, &err))?;
        Ok(())
    }

    async fn list_access_keys(&self, name: &str) -> IdentityResult<Vec<String>> {
        debug!(user = name, "list-access-keys");
        let mut ids = Vec::new();
        let mut pages = self
            .client
            .list_access_keys()
            .user_name(name)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify_sdk(name, &err))?;
            for metadata in page.access_key_metadata() {
                if let Some(id) = metadata.access_key_id() {
                    ids.push(id.to_owned());
                }
            }
        }
        Ok(ids)
    }

    async fn create_policy(
        &self,
        name: &str,
        path: &str,
        template: &str,
        resource_arns: &[String],
        tags: &HashMap<String, String>,
    ) -> IdentityResult<String> {
        let document = render_iam_policy(template, resource_arns)?;
        debug!(policy = name, path, resources = resource_arns.len(), "create-policy");
        let output = self
            .client
            .create_policy()
            .policy_name(name)
            .path(path)
            .policy_document(document)
            .set_tags(Some(build_tags(tags)?))
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        let arn = output
            .policy()
            .and_then(|policy| policy.arn())
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                IdentityError::Internal(anyhow!("create policy response has no ARN"))
            })?;
        Ok(arn)
    }

    async fn delete_policy(&self, arn: &str) -> IdentityResult<()> {
        debug!(policy = arn, "delete-policy");
        self.client
            .delete_policy()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|err| classify_sdk(arn, &err))?;
        Ok(())
    }

    async fn attach_policy(&self, name: &str, arn: &str) -> IdentityResult<()> {
        debug!(user = name, policy = arn, "attach-user-policy");
        self.client
            .attach_user_policy()
            .user_name(name)
            .policy_arn(arn)
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        Ok(())
    }

    async fn detach_policy(&self, name: &str, arn: &str) -> IdentityResult<()> {
        debug!(user = name, policy = arn, "detach-user-policy");
        self.client
            .detach_user_policy()
            .user_name(name)
            .policy_arn(arn)
            .send()
            .await
            .map_err(|err| classify_sdk(name, &err))?;
        Ok(())
    }

    async fn list_attached_policies(&self, name: &str, path: &str) -> IdentityResult<Vec<String>> {
        debug!(user = name, path, "list-attached-user-policies");
        let mut arns = Vec::new();
        let mut pages = self
            .client
            .list_attached_user_policies()
            .user_name(name)
            .path_prefix(path)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify_sdk(name, &err))?;
            for attached in page.attached_policies() {
                if let Some(arn) = attached.policy_arn() {
                    arns.push(arn.to_owned());
                }
            }
        }
        Ok(arns)
    }
}

fn build_tags(tags: &HashMap<String, String>) -> IdentityResult<Vec<Tag>> {
    let mut entries: Vec<(&String, &String)> = tags.iter().collect();
    entries.sort_by_key(|(key, _)| key.as_str());
    entries
        .into_iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build().map_err(Into::into))
        .collect()
}

fn classify_sdk<E: ProvideErrorMetadata>(name: &str, err: &SdkError<E>) -> IdentityError {
    let message = err.message().map_or_else(|| err.to_string(), ToOwned::to_owned);
    classify(name, err.code(), &message)
}

/// Sort a remote error into the store's error classes. `NoSuchEntity`
/// always means the target is gone.
fn classify(name: &str, code: Option<&str>, message: &str) -> IdentityError {
    if code == Some("NoSuchEntity") {
        return IdentityError::NotFound {
            name: name.to_owned(),
        };
    }
    IdentityError::Api {
        code: code.unwrap_or("Unknown").to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_no_such_entity_as_missing() {
        let err = classify("bucketeer-user", Some("NoSuchEntity"), "not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_should_surface_other_codes_verbatim() {
        let err = classify("bucketeer-user", Some("DeleteConflict"), "still attached");
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "DeleteConflict: still attached");
    }

    #[test]
    fn test_should_fall_back_to_unknown_code() {
        let err = classify("bucketeer-user", None, "timed out");
        assert_eq!(err.to_string(), "Unknown: timed out");
    }

    #[test]
    fn test_should_build_sorted_tag_list() {
        let tags = HashMap::from([
            ("Owner".to_owned(), "Cloud Foundry".to_owned()),
            ("Binding GUID".to_owned(), "b-1".to_owned()),
        ]);
        let built = build_tags(&tags).unwrap();
        let keys: Vec<&str> = built.iter().map(Tag::key).collect();
        assert_eq!(keys, ["Binding GUID", "Owner"]);
    }
}
