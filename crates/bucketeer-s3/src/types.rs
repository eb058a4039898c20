//! Bucket domain types.

use std::collections::HashMap;
use std::fmt;

/// Object ownership setting applied at bucket creation.
///
/// Always sent explicitly; the service-side default has changed over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ObjectOwnership {
    /// ACLs enabled; the writing account owns new objects.
    #[default]
    ObjectWriter,
    /// ACLs enabled; the bucket owner owns objects written with the
    /// `bucket-owner-full-control` ACL.
    BucketOwnerPreferred,
    /// ACLs disabled; the bucket owner owns every object.
    BucketOwnerEnforced,
}

impl ObjectOwnership {
    /// The wire name of this setting.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectWriter => "ObjectWriter",
            Self::BucketOwnerPreferred => "BucketOwnerPreferred",
            Self::BucketOwnerEnforced => "BucketOwnerEnforced",
        }
    }
}

impl fmt::Display for ObjectOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for creating and configuring a bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketDetails {
    /// Partition used when composing ARNs in policy templates.
    pub partition: String,
    /// Bucket policy template. May contain `{{bucket_name}}` and
    /// `{{partition}}` placeholders.
    pub policy: Option<String>,
    /// Server-side encryption configuration document.
    pub encryption: Option<serde_json::Value>,
    /// Object ownership setting.
    pub object_ownership: ObjectOwnership,
    /// Tags stamped on the bucket.
    pub tags: HashMap<String, String>,
}

/// Addressing facts about an existing bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Full ARN, `arn:<partition>:s3:::<name>`.
    pub arn: String,
    /// Region the bucket lives in.
    pub region: String,
    /// Endpoint host serving the bucket's region.
    pub endpoint: String,
}

/// One object a batch delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// The object key.
    pub key: String,
    /// The remote error code, e.g. `NoSuchKey`.
    pub code: String,
    /// The remote error message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_to_object_writer() {
        assert_eq!(ObjectOwnership::default(), ObjectOwnership::ObjectWriter);
    }

    #[test]
    fn test_should_round_trip_ownership_names() {
        for ownership in [
            ObjectOwnership::ObjectWriter,
            ObjectOwnership::BucketOwnerPreferred,
            ObjectOwnership::BucketOwnerEnforced,
        ] {
            let json = serde_json::to_string(&ownership).unwrap();
            assert_eq!(json, format!("\"{ownership}\""));
            let back: ObjectOwnership = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ownership);
        }
    }
}
