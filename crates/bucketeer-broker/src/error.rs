//! Broker error type.

use bucketeer_core::CoreError;
use bucketeer_iam::IdentityError;
use bucketeer_s3::StoreError;

/// Errors surfaced by broker operations.
///
/// Input problems (unknown plan, malformed parameters, unresolvable
/// instance names) get their own variants so the protocol layer can map
/// them to client-error statuses; everything else passes through from the
/// stores with its classification intact.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The request named a plan the catalog does not contain.
    #[error("service plan not found: {plan_id}")]
    PlanNotFound {
        /// The offending plan identifier.
        plan_id: String,
    },

    /// The request carried parameters that could not be decoded.
    #[error("invalid request parameters: {reason}")]
    InvalidParameters {
        /// What the decoder rejected.
        reason: String,
    },

    /// The instance's backing bucket no longer exists.
    #[error("service instance does not exist: {instance_id}")]
    InstanceGone {
        /// The instance whose bucket is missing.
        instance_id: String,
    },

    /// An additional instance name the directory does not know.
    #[error("unknown service instance: {name}")]
    UnknownInstance {
        /// The unresolvable instance name.
        name: String,
    },

    /// Additional instances were requested but no directory is configured.
    #[error(
        "binding to additional instances is not supported: no instance directory is configured"
    )]
    DirectoryUnavailable,

    /// Object storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Identity management failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Tag generation or catalog handling failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Any other failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BrokerError {
    /// Whether this error reports bad caller input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound { .. } | Self::InvalidParameters { .. } | Self::UnknownInstance { .. }
        )
    }
}

/// Convenience alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;
