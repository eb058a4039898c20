//! Error types for bucket operations.

/// Error produced by bucket stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("bucket does not exist: {name}")]
    NotFound {
        /// The bucket name that was not found.
        name: String,
    },

    /// The service refused the request.
    #[error("access denied: {message}")]
    AccessDenied {
        /// The service's error message.
        message: String,
    },

    /// A bucket policy template could not be interpreted.
    #[error("invalid bucket policy: {reason}")]
    Policy {
        /// Why the template was rejected.
        reason: String,
    },

    /// An encryption configuration document could not be interpreted.
    #[error("invalid encryption configuration: {reason}")]
    Encryption {
        /// Why the document was rejected.
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

impl StoreError {
    /// Whether this error means the bucket is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the service denied access. Policy application retries on
    /// this and nothing else.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

impl From<aws_sdk_s3::error::BuildError> for StoreError {
    fn from(err: aws_sdk_s3::error::BuildError) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}

/// Convenience result type for bucket operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_not_found() {
        let err = StoreError::NotFound {
            name: "bucketeer-abc".to_owned(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_access_denied());
        assert!(err.to_string().contains("bucketeer-abc"));
    }

    #[test]
    fn test_should_report_access_denied() {
        let err = StoreError::AccessDenied {
            message: "not yet authorized".to_owned(),
        };
        assert!(err.is_access_denied());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_should_surface_remote_code_verbatim() {
        let err = StoreError::Api {
            code: "MalformedPolicy".to_owned(),
            message: "unknown principal".to_owned(),
        };
        assert_eq!(err.to_string(), "MalformedPolicy: unknown principal");
    }
}
