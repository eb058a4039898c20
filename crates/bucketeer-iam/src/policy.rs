//! IAM policy templates.
//!
//! A plan's IAM policy template is a complete policy document whose
//! `Resource` entries may carry expansion tokens. At bind time the tokens
//! are expanded against the full set of bucket ARNs collected for the
//! binding: `{{bucket_arns}}` becomes the ARNs themselves (for bucket-level
//! actions such as listing) and `{{object_arns}}` becomes the ARNs with
//! `/*` appended (for object-level actions). Everything else in the
//! document rides along untouched.

use serde_json::Value;

use crate::error::{IdentityError, IdentityResult};

/// Expand a policy template against the collected resource ARNs, returning
/// the rendered document text.
///
/// # Errors
/// Returns [`IdentityError::Policy`] when the template is not a JSON
/// object with a `Statement` list.
pub fn render_iam_policy(template: &str, resource_arns: &[String]) -> IdentityResult<String> {
    let mut document: Value = serde_json::from_str(template).map_err(|err| {
        IdentityError::Policy {
            reason: err.to_string(),
        }
    })?;

    let statements = document
        .get_mut("Statement")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| IdentityError::Policy {
            reason: "policy template has no Statement list".to_owned(),
        })?;

    for statement in statements {
        if let Some(resource) = statement.get_mut("Resource") {
            *resource = expand_resources(resource, resource_arns);
        }
    }

    serde_json::to_string(&document).map_err(|err| IdentityError::Policy {
        reason: err.to_string(),
    })
}

fn expand_resources(resource: &Value, arns: &[String]) -> Value {
    let entries: Vec<&Value> = match resource {
        Value::Array(entries) => entries.iter().collect(),
        single => vec![single],
    };

    let mut expanded = Vec::new();
    for entry in entries {
        match entry.as_str() {
            Some("{{bucket_arns}}") => {
                expanded.extend(arns.iter().map(|arn| Value::String(arn.clone())));
            }
            Some("{{object_arns}}") => {
                expanded.extend(arns.iter().map(|arn| Value::String(format!("{arn}/*"))));
            }
            _ => expanded.push(entry.clone()),
        }
    }
    Value::Array(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"{
      "Version": "2012-10-17",
      "Statement": [
        {
          "Sid": "BucketAccess",
          "Effect": "Allow",
          "Action": ["s3:ListBucket", "s3:GetObject", "s3:PutObject"],
          "Resource": ["{{bucket_arns}}", "{{object_arns}}"]
        }
      ]
    }"#;

    fn arns(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| format!("arn:aws:s3:::{name}"))
            .collect()
    }

    #[test]
    fn test_should_expand_tokens_against_all_arns() {
        let rendered = render_iam_policy(TEMPLATE, &arns(&["a", "b"])).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();
        let resources = document["Statement"][0]["Resource"].as_array().unwrap();
        let resources: Vec<&str> = resources.iter().filter_map(Value::as_str).collect();
        assert_eq!(
            resources,
            [
                "arn:aws:s3:::a",
                "arn:aws:s3:::b",
                "arn:aws:s3:::a/*",
                "arn:aws:s3:::b/*",
            ]
        );
    }

    #[test]
    fn test_should_expand_single_string_resource_into_list() {
        let template = r#"{
          "Statement": [{"Effect": "Allow", "Action": ["s3:ListBucket"], "Resource": "{{bucket_arns}}"}]
        }"#;
        let rendered = render_iam_policy(template, &arns(&["only"])).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(
            document["Statement"][0]["Resource"],
            serde_json::json!(["arn:aws:s3:::only"])
        );
    }

    #[test]
    fn test_should_keep_literal_resources_and_extra_fields() {
        let template = r#"{
          "Statement": [
            {
              "Effect": "Allow",
              "Action": ["s3:GetObject"],
              "Resource": ["arn:aws:s3:::static", "{{object_arns}}"],
              "Condition": {"Bool": {"aws:SecureTransport": "true"}}
            }
          ]
        }"#;
        let rendered = render_iam_policy(template, &arns(&["x"])).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();
        let statement = &document["Statement"][0];
        assert_eq!(
            statement["Resource"],
            serde_json::json!(["arn:aws:s3:::static", "arn:aws:s3:::x/*"])
        );
        assert_eq!(
            statement["Condition"]["Bool"]["aws:SecureTransport"],
            "true"
        );
    }

    #[test]
    fn test_should_reject_template_without_statements() {
        let err = render_iam_policy(r#"{"Version": "2012-10-17"}"#, &arns(&["a"])).unwrap_err();
        assert!(err.to_string().contains("Statement"));
    }

    #[test]
    fn test_should_reject_malformed_template() {
        assert!(render_iam_policy("{oops", &[]).is_err());
    }

    #[test]
    fn test_should_leave_statement_without_resources_alone() {
        let template = r#"{"Statement": [{"Effect": "Deny", "Action": ["s3:*"]}]}"#;
        let rendered = render_iam_policy(template, &arns(&["a"])).unwrap();
        let document: Value = serde_json::from_str(&rendered).unwrap();
        assert!(document["Statement"][0].get("Resource").is_none());
    }
}
