//! [`S3Api`] backed by the AWS SDK client.

use std::collections::HashMap;

use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
    ServerSideEncryption, ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration,
    ServerSideEncryptionRule, Tag, Tagging,
};
use tracing::debug;

use crate::api::S3Api;
use crate::encryption::EncryptionConfiguration;
use crate::error::{StoreError, StoreResult};
use crate::types::{DeleteFailure, ObjectOwnership};

const US_EAST_1: &str = "us-east-1";

/// The real S3 client.
#[derive(Debug, Clone)]
pub struct AwsS3Api {
    client: Client,
}

impl AwsS3Api {
    /// Wrap an SDK client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl S3Api for AwsS3Api {
    async fn bucket_location(&self, bucket: &str) -> StoreResult<String> {
        debug!(bucket, "get-bucket-location");
        let output = self
            .client
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[404]))?;
        let region = output
            .location_constraint()
            .map(|constraint| constraint.as_str().to_owned())
            .filter(|region| !region.is_empty())
            .unwrap_or_else(|| US_EAST_1.to_owned());
        Ok(region)
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        region: &str,
        ownership: ObjectOwnership,
    ) -> StoreResult<String> {
        debug!(bucket, region, %ownership, "create-bucket");
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .object_ownership(aws_sdk_s3::types::ObjectOwnership::from(ownership.as_str()));
        // us-east-1 is the one region that must not be named explicitly.
        if region != US_EAST_1 {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        let output = request
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[]))?;
        Ok(output.location().unwrap_or_default().to_owned())
    }

    async fn put_bucket_tags(
        &self,
        bucket: &str,
        tags: &HashMap<String, String>,
    ) -> StoreResult<()> {
        debug!(bucket, count = tags.len(), "put-bucket-tagging");
        let mut entries: Vec<(&String, &String)> = tags.iter().collect();
        entries.sort_by_key(|(key, _)| key.as_str());
        let tag_set = entries
            .into_iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect::<Result<Vec<_>, _>>()?;
        let tagging = Tagging::builder().set_tag_set(Some(tag_set)).build()?;
        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[]))?;
        Ok(())
    }

    async fn put_bucket_encryption(
        &self,
        bucket: &str,
        config: &EncryptionConfiguration,
    ) -> StoreResult<()> {
        debug!(bucket, "put-bucket-encryption");
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let mut builder = ServerSideEncryptionRule::builder();
            if let Some(default) = &rule.apply_server_side_encryption_by_default {
                builder = builder.apply_server_side_encryption_by_default(
                    ServerSideEncryptionByDefault::builder()
                        .sse_algorithm(ServerSideEncryption::from(default.sse_algorithm.as_str()))
                        .set_kms_master_key_id(default.kms_master_key_id.clone())
                        .build()?,
                );
            }
            rules.push(builder.set_bucket_key_enabled(rule.bucket_key_enabled).build());
        }
        let configuration = ServerSideEncryptionConfiguration::builder()
            .set_rules(Some(rules))
            .build()?;
        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(configuration)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[]))?;
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> StoreResult<()> {
        debug!(bucket, "put-bucket-policy");
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[]))?;
        Ok(())
    }

    async fn delete_public_access_block(&self, bucket: &str) -> StoreResult<()> {
        debug!(bucket, "delete-public-access-block");
        self.client
            .delete_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[]))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        debug!(bucket, "delete-bucket");
        // The service answers 400 as well as 404 for a missing bucket here.
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[400, 404]))?;
        Ok(())
    }

    async fn list_object_keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        debug!(bucket, "list-objects");
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify_sdk(bucket, &err, &[404]))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_owned());
                }
            }
        }
        Ok(keys)
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> StoreResult<Vec<DeleteFailure>> {
        debug!(bucket, count = keys.len(), "delete-objects");
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;
        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| classify_sdk(bucket, &err, &[404]))?;
        let failures = output
            .errors()
            .iter()
            .map(|error| DeleteFailure {
                key: error.key().unwrap_or_default().to_owned(),
                code: error.code().unwrap_or_default().to_owned(),
                message: error.message().unwrap_or_default().to_owned(),
            })
            .collect();
        Ok(failures)
    }
}

fn classify_sdk<E: ProvideErrorMetadata>(
    bucket: &str,
    err: &SdkError<E>,
    missing_statuses: &[u16],
) -> StoreError {
    let status = match err {
        SdkError::ServiceError(context) => Some(context.raw().status().as_u16()),
        _ => None,
    };
    let message = err.message().map_or_else(|| err.to_string(), ToOwned::to_owned);
    classify(bucket, err.code(), status, &message, missing_statuses)
}

/// Sort a remote error into the store's error classes.
///
/// A `NoSuchBucket` code always means the bucket is gone; so does any HTTP
/// status listed in `missing_statuses` for the operation at hand.
fn classify(
    bucket: &str,
    code: Option<&str>,
    status: Option<u16>,
    message: &str,
    missing_statuses: &[u16],
) -> StoreError {
    if code == Some("NoSuchBucket") || status.is_some_and(|s| missing_statuses.contains(&s)) {
        return StoreError::NotFound {
            name: bucket.to_owned(),
        };
    }
    if code == Some("AccessDenied") {
        return StoreError::AccessDenied {
            message: message.to_owned(),
        };
    }
    StoreError::Api {
        code: code.unwrap_or("Unknown").to_owned(),
        message: message.to_owned(),
    }
}
