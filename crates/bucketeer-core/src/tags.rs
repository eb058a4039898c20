//! Resource tag generation.
//!
//! Every resource the broker creates (buckets, principals, policies) is
//! stamped with a common tag set recording who created it, when, and which
//! platform entities it belongs to.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;

use crate::error::{CoreError, CoreResult};

/// Timestamp layout used in `"<action> at"` tags, e.g. `02 Jan 06 15:04 -0700`.
const TAG_TIME_FORMAT: &str = "%d %b %y %H:%M %z";

/// Lifecycle action being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resource is being created.
    Created,
    /// Resource is being updated in place.
    Updated,
    /// Resource is being deleted.
    Deleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// Platform identifiers correlating a resource back to its instance and
/// binding. Empty or absent values are skipped when tagging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationIds {
    /// Service instance GUID. Required unless the caller tolerates a
    /// missing lookup.
    pub instance_id: String,
    /// Binding GUID, present only when tagging bind-time resources.
    pub binding_id: Option<String>,
    /// Organization GUID, when known.
    pub organization_guid: Option<String>,
    /// Space GUID, when known.
    pub space_guid: Option<String>,
}

/// Produces the tag set stamped on broker-managed resources.
pub trait TagGenerator: Send + Sync {
    /// Generate tags for `action` on a resource belonging to the given
    /// service and plan.
    ///
    /// With `allow_missing` unset, generation fails when the instance GUID
    /// is unknown. Teardown paths pass `true` since the platform may have
    /// already forgotten the instance.
    ///
    /// # Errors
    /// Returns [`CoreError::Tags`] when required correlation data is absent.
    fn generate(
        &self,
        action: Action,
        service_name: &str,
        plan_name: &str,
        ids: &CorrelationIds,
        allow_missing: bool,
    ) -> CoreResult<HashMap<String, String>>;
}

/// Standard tag generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokerTagGenerator;

impl BrokerTagGenerator {
    /// Create a tag generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TagGenerator for BrokerTagGenerator {
    fn generate(
        &self,
        action: Action,
        service_name: &str,
        plan_name: &str,
        ids: &CorrelationIds,
        allow_missing: bool,
    ) -> CoreResult<HashMap<String, String>> {
        if ids.instance_id.is_empty() && !allow_missing {
            return Err(CoreError::Tags(
                "instance GUID is required for tag generation".into(),
            ));
        }

        let mut tags = HashMap::new();
        tags.insert("Owner".to_string(), "Cloud Foundry".to_string());
        tags.insert(format!("{action} by"), "Bucketeer Service Broker".to_string());
        tags.insert(
            format!("{action} at"),
            Utc::now().format(TAG_TIME_FORMAT).to_string(),
        );

        let mut put = |key: &str, value: &str| {
            if !value.is_empty() {
                tags.insert(key.to_string(), value.to_string());
            }
        };
        put("Service name", service_name);
        put("Plan name", plan_name);
        put("Instance GUID", &ids.instance_id);
        put("Binding GUID", ids.binding_id.as_deref().unwrap_or(""));
        put(
            "Organization GUID",
            ids.organization_guid.as_deref().unwrap_or(""),
        );
        put("Space GUID", ids.space_guid.as_deref().unwrap_or(""));

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn full_ids() -> CorrelationIds {
        CorrelationIds {
            instance_id: "instance-1".to_string(),
            binding_id: Some("binding-1".to_string()),
            organization_guid: Some("org-1".to_string()),
            space_guid: Some("space-1".to_string()),
        }
    }

    #[test]
    fn test_should_generate_full_tag_set() {
        let generator = BrokerTagGenerator::new();
        let mut tags = generator
            .generate(Action::Created, "bucketeer", "basic", &full_ids(), false)
            .unwrap();

        // The timestamp varies; check it separately and compare the rest.
        let at = tags.remove("Created at").unwrap();
        assert!(DateTime::parse_from_str(&at, TAG_TIME_FORMAT).is_ok(), "{at}");

        let expected: HashMap<String, String> = [
            ("Owner", "Cloud Foundry"),
            ("Created by", "Bucketeer Service Broker"),
            ("Service name", "bucketeer"),
            ("Plan name", "basic"),
            ("Instance GUID", "instance-1"),
            ("Binding GUID", "binding-1"),
            ("Organization GUID", "org-1"),
            ("Space GUID", "space-1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn test_should_skip_empty_correlation_values() {
        let generator = BrokerTagGenerator::new();
        let ids = CorrelationIds {
            instance_id: "instance-1".to_string(),
            ..CorrelationIds::default()
        };
        let tags = generator
            .generate(Action::Deleted, "bucketeer", "", &ids, false)
            .unwrap();
        assert!(!tags.contains_key("Plan name"));
        assert!(!tags.contains_key("Binding GUID"));
        assert!(!tags.contains_key("Organization GUID"));
        assert!(!tags.contains_key("Space GUID"));
        assert_eq!(tags["Deleted by"], "Bucketeer Service Broker");
    }

    #[test]
    fn test_should_require_instance_guid_by_default() {
        let generator = BrokerTagGenerator::new();
        let err = generator
            .generate(
                Action::Created,
                "bucketeer",
                "basic",
                &CorrelationIds::default(),
                false,
            )
            .unwrap_err();
        assert!(err.to_string().contains("instance GUID"));
    }

    #[test]
    fn test_should_tolerate_missing_instance_guid_when_allowed() {
        let generator = BrokerTagGenerator::new();
        let tags = generator
            .generate(
                Action::Updated,
                "bucketeer",
                "basic",
                &CorrelationIds::default(),
                true,
            )
            .unwrap();
        assert!(!tags.contains_key("Instance GUID"));
        assert_eq!(tags["Owner"], "Cloud Foundry");
        assert!(tags.contains_key("Updated at"));
    }

    #[test]
    fn test_should_render_action_names() {
        assert_eq!(Action::Created.to_string(), "Created");
        assert_eq!(Action::Updated.to_string(), "Updated");
        assert_eq!(Action::Deleted.to_string(), "Deleted");
    }
}
