//! Broker configuration.
//!
//! All configuration is driven by environment variables so the broker can run
//! unchanged as a Cloud Foundry app, a container, or a plain process.

use crate::error::{CoreError, CoreResult};

/// Runtime configuration for the broker.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BrokerConfig {
    /// Bind address for the broker HTTP listener.
    pub listen: String,
    /// Basic-auth username required on all `/v2` routes.
    pub username: String,
    /// Basic-auth password required on all `/v2` routes.
    pub password: String,
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Path to the catalog JSON document.
    pub catalog_path: String,
    /// AWS region buckets are created in.
    pub region: String,
    /// Optional S3-compatible endpoint override (MinIO and friends).
    pub s3_endpoint: Option<String>,
    /// Whether bind credentials should advertise insecure (non-verified TLS)
    /// access to the endpoint.
    pub insecure_skip_verify: bool,
    /// ARN partition used when composing bucket ARNs.
    pub partition: String,
    /// Prefix for bucket names (`{bucket_prefix}-{instance_id}`).
    pub bucket_prefix: String,
    /// Prefix for IAM user names (`{user_prefix}-{binding_id}`).
    pub user_prefix: String,
    /// Prefix for IAM policy names (`{policy_prefix}-{binding_id}`).
    pub policy_prefix: String,
    /// IAM path under which users and policies are created.
    pub iam_path: String,
    /// Whether user-supplied parameters are decoded on provision.
    pub allow_user_provision_parameters: bool,
    /// Whether user-supplied parameters are decoded on update.
    pub allow_user_update_parameters: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_owned(),
            username: String::new(),
            password: String::new(),
            log_level: "info".to_owned(),
            catalog_path: "catalog.json".to_owned(),
            region: "us-east-1".to_owned(),
            s3_endpoint: None,
            insecure_skip_verify: false,
            partition: "aws".to_owned(),
            bucket_prefix: "bucketeer".to_owned(),
            user_prefix: "bucketeer".to_owned(),
            policy_prefix: "bucketeer".to_owned(),
            iam_path: "/".to_owned(),
            allow_user_provision_parameters: false,
            allow_user_update_parameters: false,
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("BROKER_LISTEN") {
            config.listen = v;
        }
        if let Ok(v) = std::env::var("BROKER_USERNAME") {
            config.username = v;
        }
        if let Ok(v) = std::env::var("BROKER_PASSWORD") {
            config.password = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("CATALOG_PATH") {
            config.catalog_path = v;
        }
        if let Ok(v) = std::env::var("AWS_REGION") {
            config.region = v;
        }
        if let Ok(v) = std::env::var("S3_ENDPOINT") {
            if !v.is_empty() {
                config.s3_endpoint = Some(v);
            }
        }
        if let Ok(v) = std::env::var("INSECURE_SKIP_VERIFY") {
            config.insecure_skip_verify = is_truthy(&v);
        }
        if let Ok(v) = std::env::var("AWS_PARTITION") {
            config.partition = v;
        }
        if let Ok(v) = std::env::var("BUCKET_PREFIX") {
            config.bucket_prefix = v;
        }
        if let Ok(v) = std::env::var("USER_PREFIX") {
            config.user_prefix = v;
        }
        if let Ok(v) = std::env::var("POLICY_PREFIX") {
            config.policy_prefix = v;
        }
        if let Ok(v) = std::env::var("IAM_PATH") {
            config.iam_path = v;
        }
        if let Ok(v) = std::env::var("ALLOW_USER_PROVISION_PARAMETERS") {
            config.allow_user_provision_parameters = is_truthy(&v);
        }
        if let Ok(v) = std::env::var("ALLOW_USER_UPDATE_PARAMETERS") {
            config.allow_user_update_parameters = is_truthy(&v);
        }

        config
    }

    /// Check that every required value is present and well formed.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] naming the first offending field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.username.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty BROKER_USERNAME".to_owned(),
            ));
        }
        if self.password.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty BROKER_PASSWORD".to_owned(),
            ));
        }
        if self.region.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty AWS_REGION".to_owned(),
            ));
        }
        if self.bucket_prefix.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty BUCKET_PREFIX".to_owned(),
            ));
        }
        if self.user_prefix.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty USER_PREFIX".to_owned(),
            ));
        }
        if self.policy_prefix.is_empty() {
            return Err(CoreError::Config(
                "must provide a non-empty POLICY_PREFIX".to_owned(),
            ));
        }
        if !self.iam_path.starts_with('/') || !self.iam_path.ends_with('/') {
            return Err(CoreError::Config(format!(
                "IAM_PATH must begin and end with '/', got {:?}",
                self.iam_path
            )));
        }
        Ok(())
    }

    /// The endpoint bind credentials should point at: the configured override
    /// when one is set, otherwise the regional default.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.s3_endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint(&self.region))
    }
}

/// The well-known endpoint for a region. `us-east-1` has no regional label.
#[must_use]
pub fn default_endpoint(region: &str) -> String {
    if region == "us-east-1" {
        "s3.amazonaws.com".to_owned()
    } else {
        format!("s3-{region}.amazonaws.com")
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BrokerConfig {
        BrokerConfig {
            username: "broker".to_owned(),
            password: "secret".to_owned(),
            ..BrokerConfig::default()
        }
    }

    #[test]
    fn test_should_create_default_config() {
        let config = BrokerConfig::default();
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.partition, "aws");
        assert_eq!(config.iam_path, "/");
        assert!(config.s3_endpoint.is_none());
        assert!(!config.allow_user_provision_parameters);
    }

    #[test]
    fn test_should_accept_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_should_reject_missing_credentials() {
        let mut config = valid_config();
        config.username = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.password = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_reject_empty_region() {
        let mut config = valid_config();
        config.region = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_reject_malformed_iam_path() {
        let mut config = valid_config();
        config.iam_path = "cf/".to_owned();
        assert!(config.validate().is_err());

        config.iam_path = "/cf".to_owned();
        assert!(config.validate().is_err());

        config.iam_path = "/cf/".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_derive_regional_endpoint() {
        assert_eq!(default_endpoint("us-east-1"), "s3.amazonaws.com");
        assert_eq!(default_endpoint("eu-west-1"), "s3-eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_should_prefer_endpoint_override() {
        let mut config = valid_config();
        config.s3_endpoint = Some("minio.local:9000".to_owned());
        assert_eq!(config.endpoint(), "minio.local:9000");

        config.s3_endpoint = None;
        config.region = "us-west-2".to_owned();
        assert_eq!(config.endpoint(), "s3-us-west-2.amazonaws.com");
    }
}
