//! Service catalog.
//!
//! The catalog is a JSON document loaded once at startup. It drives both the
//! protocol catalog listing and the per-plan templates (bucket policy, IAM
//! policy, encryption) used when provisioning and binding. Plan-internal
//! fields never appear in the serialized listing.

use anyhow::Context;

use crate::error::{CoreError, CoreResult};

/// The full service catalog.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Catalog {
    /// Services offered by this broker.
    #[serde(default)]
    pub services: Vec<Service>,
}

/// One service offering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Service {
    /// Stable service identifier.
    pub id: String,
    /// Human-facing service name.
    pub name: String,
    /// Human-facing description.
    pub description: String,
    /// Whether instances of this service can be bound.
    pub bindable: bool,
    /// Whether instances can switch plans after provisioning.
    #[serde(default, rename = "plan_updateable")]
    pub plan_updateable: bool,
    /// Free-form classification tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Opaque display metadata passed through to the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Plans available under this service.
    pub plans: Vec<ServicePlan>,
}

/// One plan of a service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServicePlan {
    /// Stable plan identifier.
    pub id: String,
    /// Human-facing plan name.
    pub name: String,
    /// Human-facing description.
    pub description: String,
    /// Whether the plan is free of charge.
    #[serde(default)]
    pub free: bool,
    /// Opaque display metadata passed through to the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Whether bucket contents survive deprovisioning. A durable plan's
    /// bucket is never purged, so deleting a non-empty bucket fails.
    #[serde(default, skip_serializing)]
    pub durable: bool,
    /// Bucket and access templates. Broker-internal, stripped from the
    /// serialized listing.
    #[serde(default, rename = "s3_properties", skip_serializing)]
    pub properties: PlanProperties,
}

/// Per-plan resource templates.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PlanProperties {
    /// IAM policy document granting bind credentials access to the bucket.
    /// Required. May contain `{{bucket_arns}}` / `{{object_arns}}`
    /// placeholders in resource entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_policy: Option<serde_json::Value>,
    /// Optional bucket policy applied at provision time. May contain
    /// `{{bucket_name}}` and `{{partition}}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_policy: Option<serde_json::Value>,
    /// Optional server-side encryption configuration applied at provision
    /// time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<serde_json::Value>,
}

impl Catalog {
    /// Load and validate a catalog from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`Catalog::validate`].
    pub fn load(path: &str) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog file {path}"))?;
        let catalog: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog file {path}"))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check that every service and plan carries the required fields.
    ///
    /// # Errors
    /// Returns [`CoreError::Catalog`] naming the first offending entry.
    pub fn validate(&self) -> CoreResult<()> {
        for service in &self.services {
            service.validate()?;
        }
        Ok(())
    }

    /// Find a service by its identifier.
    #[must_use]
    pub fn find_service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }

    /// Find a plan by its identifier, searching all services.
    #[must_use]
    pub fn find_plan(&self, plan_id: &str) -> Option<&ServicePlan> {
        self.services
            .iter()
            .flat_map(|s| &s.plans)
            .find(|p| p.id == plan_id)
    }

    /// The service that owns a plan.
    #[must_use]
    pub fn service_for_plan(&self, plan_id: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.plans.iter().any(|p| p.id == plan_id))
    }
}

impl Service {
    fn validate(&self) -> CoreResult<()> {
        if self.id.is_empty() {
            return Err(CoreError::Catalog(format!(
                "service {:?} must provide a non-empty id",
                self.name
            )));
        }
        if self.name.is_empty() {
            return Err(CoreError::Catalog(format!(
                "service {} must provide a non-empty name",
                self.id
            )));
        }
        if self.description.is_empty() {
            return Err(CoreError::Catalog(format!(
                "service {} must provide a non-empty description",
                self.id
            )));
        }
        for plan in &self.plans {
            plan.validate()?;
        }
        Ok(())
    }
}

impl ServicePlan {
    fn validate(&self) -> CoreResult<()> {
        if self.id.is_empty() {
            return Err(CoreError::Catalog(format!(
                "plan {:?} must provide a non-empty id",
                self.name
            )));
        }
        if self.name.is_empty() {
            return Err(CoreError::Catalog(format!(
                "plan {} must provide a non-empty name",
                self.id
            )));
        }
        if self.description.is_empty() {
            return Err(CoreError::Catalog(format!(
                "plan {} must provide a non-empty description",
                self.id
            )));
        }
        match &self.properties.iam_policy {
            Some(doc) if !doc.is_null() => Ok(()),
            _ => Err(CoreError::Catalog(format!(
                "plan {} must provide a non-empty iam_policy",
                self.id
            ))),
        }
    }

    /// The IAM policy template as document text.
    #[must_use]
    pub fn iam_policy_text(&self) -> Option<String> {
        self.properties
            .iam_policy
            .as_ref()
            .filter(|doc| !doc.is_null())
            .map(std::string::ToString::to_string)
    }

    /// The bucket policy template as document text, if the plan has one.
    #[must_use]
    pub fn bucket_policy_text(&self) -> Option<String> {
        self.properties
            .bucket_policy
            .as_ref()
            .filter(|doc| !doc.is_null())
            .map(std::string::ToString::to_string)
    }

    /// The encryption configuration document, if the plan has one.
    #[must_use]
    pub fn encryption_document(&self) -> Option<&serde_json::Value> {
        self.properties
            .encryption
            .as_ref()
            .filter(|doc| !doc.is_null())
    }
}
