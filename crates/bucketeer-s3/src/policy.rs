//! Bucket policy templates.
//!
//! Plans carry bucket policies as templates with naming tokens that are
//! substituted at provision time. Before a policy is applied the template
//! is inspected to decide whether the bucket is meant to be public, in
//! which case the account-level public access guard must be removed first.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// One statement of a bucket policy.
///
/// The shape is deliberately narrow: `Principal` must be a plain string and
/// `Action` a list. Templates that do not fit are rejected rather than
/// guessed at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPolicyStatement {
    /// `Allow` or `Deny`.
    #[serde(rename = "Effect", default)]
    pub effect: String,
    /// The principal the statement applies to.
    #[serde(rename = "Principal", default)]
    pub principal: String,
    /// Actions granted or denied.
    #[serde(rename = "Action", default)]
    pub action: Vec<String>,
    /// Resources the statement covers.
    #[serde(rename = "Resource", default)]
    pub resource: Vec<String>,
}

/// A bucket policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPolicy {
    /// Policy language version.
    #[serde(rename = "Version", default)]
    pub version: String,
    /// The policy statements.
    #[serde(rename = "Statement", default)]
    pub statement: Vec<BucketPolicyStatement>,
}

/// Substitute `{{bucket_name}}` and `{{partition}}` tokens in a bucket
/// policy template.
#[must_use]
pub fn render_bucket_policy(template: &str, bucket_name: &str, partition: &str) -> String {
    template
        .replace("{{bucket_name}}", bucket_name)
        .replace("{{partition}}", partition)
}

/// Decide whether a bucket policy template grants anonymous read access.
///
/// The unrendered template is inspected; naming tokens only ever appear
/// inside JSON strings, so they do not affect parsing. Templates with more
/// than one statement are rejected before any remote call is made.
///
/// # Errors
/// Returns [`StoreError::Policy`] when the template is not valid JSON of
/// the expected shape or carries more than one statement.
pub fn grants_public_read(template: &str) -> StoreResult<bool> {
    let policy: BucketPolicy = serde_json::from_str(template).map_err(|err| {
        StoreError::Policy {
            reason: err.to_string(),
        }
    })?;

    if policy.statement.len() > 1 {
        return Err(StoreError::Policy {
            reason: format!("expected 1 policy statement, got {}", policy.statement.len()),
        });
    }

    Ok(policy.statement.first().is_some_and(is_public_statement))
}

fn is_public_statement(statement: &BucketPolicyStatement) -> bool {
    statement.effect == "Allow"
        && statement.principal == "*"
        && statement.action == ["s3:GetObject"]
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_POLICY: &str = r#"{
      "Version": "2012-10-17",
      "Statement": [
        {
          "Effect": "Allow",
          "Principal": "*",
          "Action": ["s3:GetObject"],
          "Resource": ["arn:{{partition}}:s3:::{{bucket_name}}/*"]
        }
      ]
    }"#;

    #[test]
    fn test_should_detect_public_read_policy() {
        assert!(grants_public_read(PUBLIC_POLICY).unwrap());
    }

    #[test]
    fn test_should_not_flag_scoped_principal_as_public() {
        let template = r#"{
          "Version": "2012-10-17",
          "Statement": [
            {
              "Effect": "Allow",
              "Principal": "arn:aws:iam::123456789012:root",
              "Action": ["s3:GetObject"],
              "Resource": ["arn:{{partition}}:s3:::{{bucket_name}}/*"]
            }
          ]
        }"#;
        assert!(!grants_public_read(template).unwrap());
    }

    #[test]
    fn test_should_not_flag_wider_action_list_as_public() {
        let template = r#"{
          "Version": "2012-10-17",
          "Statement": [
            {
              "Effect": "Allow",
              "Principal": "*",
              "Action": ["s3:GetObject", "s3:PutObject"],
              "Resource": ["arn:{{partition}}:s3:::{{bucket_name}}/*"]
            }
          ]
        }"#;
        assert!(!grants_public_read(template).unwrap());
    }

    #[test]
    fn test_should_reject_multiple_statements() {
        let template = r#"{
          "Version": "2012-10-17",
          "Statement": [
            {"Effect": "Allow", "Principal": "*", "Action": ["s3:GetObject"], "Resource": []},
            {"Effect": "Deny", "Principal": "*", "Action": ["s3:PutObject"], "Resource": []}
          ]
        }"#;
        let err = grants_public_read(template).unwrap_err();
        assert!(err.to_string().contains("expected 1 policy statement, got 2"));
    }

    #[test]
    fn test_should_reject_malformed_template() {
        assert!(grants_public_read("{not json").is_err());
    }

    #[test]
    fn test_should_reject_object_principal() {
        let template = r#"{
          "Version": "2012-10-17",
          "Statement": [
            {
              "Effect": "Allow",
              "Principal": {"AWS": "*"},
              "Action": ["s3:GetObject"],
              "Resource": []
            }
          ]
        }"#;
        assert!(grants_public_read(template).is_err());
    }

    #[test]
    fn test_should_treat_empty_statement_list_as_private() {
        let template = r#"{"Version": "2012-10-17", "Statement": []}"#;
        assert!(!grants_public_read(template).unwrap());
    }

    #[test]
    fn test_should_render_naming_tokens() {
        let rendered = render_bucket_policy(PUBLIC_POLICY, "bucketeer-abc", "aws-us-gov");
        assert!(rendered.contains("arn:aws-us-gov:s3:::bucketeer-abc/*"));
        assert!(!rendered.contains("{{bucket_name}}"));
        assert!(!rendered.contains("{{partition}}"));
    }
}
