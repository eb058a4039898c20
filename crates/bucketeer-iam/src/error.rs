//! Error types for identity operations.

/// Error produced by identity stores.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The principal, access key, or policy does not exist.
    #[error("identity resource does not exist: {name}")]
    NotFound {
        /// The name or ARN that was not found.
        name: String,
    },

    /// A policy template could not be interpreted.
    #[error("invalid policy template: {reason}")]
    Policy {
        /// Why the template was rejected.
        reason: String,
    },

    /// Any other service failure, carrying the remote error code verbatim.
    #[error("{code}: {message}")]
    Api {
        /// The remote error code.
        code: String,
        /// The remote error message.
        message: String,
    },

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IdentityError {
    /// Whether this error means the target is already gone. Teardown paths
    /// treat it as success.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<aws_sdk_iam::error::BuildError> for IdentityError {
    fn from(err: aws_sdk_iam::error::BuildError) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}

/// Convenience result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_not_found() {
        let err = IdentityError::NotFound {
            name: "bucketeer-user".to_owned(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("bucketeer-user"));
    }

    #[test]
    fn test_should_surface_remote_code_verbatim() {
        let err = IdentityError::Api {
            code: "DeleteConflict".to_owned(),
            message: "policy still attached".to_owned(),
        };
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "DeleteConflict: policy still attached");
    }
}
