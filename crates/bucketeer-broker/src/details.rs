//! Request and response shapes of the lifecycle protocol.
//!
//! These mirror the Open Service Broker envelopes the HTTP layer decodes.
//! User-supplied `parameters` stay opaque here and are decoded into the
//! typed parameter structs by the orchestrator, which knows whether the
//! deployment allows them.

use bucketeer_s3::ObjectOwnership;

use crate::credentials::Credentials;

/// Body of a provision request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProvisionDetails {
    /// Service being provisioned.
    pub service_id: String,
    /// Plan being provisioned.
    pub plan_id: String,
    /// Organization the instance belongs to.
    #[serde(default)]
    pub organization_guid: String,
    /// Space the instance belongs to.
    #[serde(default)]
    pub space_guid: String,
    /// Raw user-supplied parameters, decoded only when allowed.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Body of an update request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateDetails {
    /// Service of the instance.
    pub service_id: String,
    /// Plan requested for the instance.
    pub plan_id: String,
    /// Raw user-supplied parameters, decoded only when allowed.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Query values of a deprovision request.
#[derive(Debug, Clone, Default)]
pub struct DeprovisionDetails {
    /// Service of the instance.
    pub service_id: String,
    /// Plan of the instance.
    pub plan_id: String,
}

/// Body of a bind request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BindDetails {
    /// Service of the instance.
    pub service_id: String,
    /// Plan of the instance.
    pub plan_id: String,
    /// Application the binding is for, when the platform knows it.
    #[serde(default)]
    pub app_guid: Option<String>,
    /// Raw user-supplied parameters.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// Query values of an unbind request.
#[derive(Debug, Clone, Default)]
pub struct UnbindDetails {
    /// Service of the instance.
    pub service_id: String,
    /// Plan of the instance.
    pub plan_id: String,
}

/// Successful bind response envelope.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Binding {
    /// The issued credentials.
    pub credentials: Credentials,
}

/// User-supplied provision parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ProvisionParameters {
    /// Object ownership applied to the new bucket.
    #[serde(default)]
    pub object_ownership: Option<ObjectOwnership>,
}

/// User-supplied update parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct UpdateParameters {
    /// Whether the platform asked for the change to take effect without
    /// waiting for a maintenance window. Accepted, currently without
    /// effect, since no updatable settings exist.
    #[serde(default)]
    pub apply_immediately: bool,
}

/// User-supplied bind parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct BindParameters {
    /// Names of further service instances whose buckets this binding's
    /// credentials may also access. Useful when copying objects between
    /// buckets.
    #[serde(default)]
    pub additional_instances: Vec<String>,
}
