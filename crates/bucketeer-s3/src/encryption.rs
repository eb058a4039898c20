//! Server-side encryption configuration.
//!
//! Plans carry encryption settings as JSON documents in the service's own
//! wire shape. The document is parsed into a typed model here and mapped
//! onto SDK types at the client boundary.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A server-side encryption configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfiguration {
    /// Encryption rules, applied in order.
    #[serde(rename = "Rules", default)]
    pub rules: Vec<EncryptionRule>,
}

/// One encryption rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionRule {
    /// Default encryption applied to objects written without explicit
    /// encryption headers.
    #[serde(
        rename = "ApplyServerSideEncryptionByDefault",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apply_server_side_encryption_by_default: Option<EncryptionDefault>,
    /// Whether S3 bucket keys are used for KMS encryption.
    #[serde(rename = "BucketKeyEnabled", default, skip_serializing_if = "Option::is_none")]
    pub bucket_key_enabled: Option<bool>,
}

/// The default encryption algorithm and key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionDefault {
    /// `AES256` or `aws:kms`.
    #[serde(rename = "SSEAlgorithm", default)]
    pub sse_algorithm: String,
    /// KMS key identifier, only meaningful with `aws:kms`.
    #[serde(rename = "KMSMasterKeyID", default, skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<String>,
}

impl EncryptionConfiguration {
    /// Parse a configuration from a plan's encryption document.
    ///
    /// # Errors
    /// Returns [`StoreError::Encryption`] when the document does not fit
    /// the expected shape.
    pub fn parse(document: &serde_json::Value) -> StoreResult<Self> {
        serde_json::from_value(document.clone()).map_err(|err| StoreError::Encryption {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_kms_configuration() {
        let document = serde_json::json!({
            "Rules": [
                {
                    "ApplyServerSideEncryptionByDefault": {
                        "SSEAlgorithm": "aws:kms",
                        "KMSMasterKeyID": "alias/bucketeer"
                    },
                    "BucketKeyEnabled": true
                }
            ]
        });
        let config = EncryptionConfiguration::parse(&document).unwrap();
        assert_eq!(config.rules.len(), 1);
        let default = config.rules[0]
            .apply_server_side_encryption_by_default
            .as_ref()
            .unwrap();
        assert_eq!(default.sse_algorithm, "aws:kms");
        assert_eq!(default.kms_master_key_id.as_deref(), Some("alias/bucketeer"));
        assert_eq!(config.rules[0].bucket_key_enabled, Some(true));
    }

    #[test]
    fn test_should_parse_plain_aes_configuration() {
        let document = serde_json::json!({
            "Rules": [
                {"ApplyServerSideEncryptionByDefault": {"SSEAlgorithm": "AES256"}}
            ]
        });
        let config = EncryptionConfiguration::parse(&document).unwrap();
        let default = config.rules[0]
            .apply_server_side_encryption_by_default
            .as_ref()
            .unwrap();
        assert_eq!(default.sse_algorithm, "AES256");
        assert!(default.kms_master_key_id.is_none());
    }

    #[test]
    fn test_should_reject_malformed_document() {
        let document = serde_json::json!({"Rules": "not-a-list"});
        assert!(EncryptionConfiguration::parse(&document).is_err());
    }
}
