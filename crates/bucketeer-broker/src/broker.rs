//! The lifecycle orchestrator.
//!
//! [`S3Broker`] implements the five lifecycle operations over the bucket
//! and identity stores. Every operation is synchronous and stateless
//! between calls: resource names are derived deterministically from the
//! instance and binding identifiers, and the backend is re-queried rather
//! than cached, so repeated invocations converge instead of drifting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use bucketeer_core::{
    Action, BrokerConfig, Catalog, CorrelationIds, Service, ServicePlan, TagGenerator,
};
use bucketeer_iam::{IdentityResult, IdentityStore};
use bucketeer_s3::{BucketDetails, BucketInfo, ObjectStore, StoreError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::credentials::{Credentials, bucket_uri};
use crate::details::{
    BindDetails, BindParameters, DeprovisionDetails, ProvisionDetails, ProvisionParameters,
    UnbindDetails, UpdateDetails, UpdateParameters,
};
use crate::directory::{DirectoryError, InstanceDirectory};
use crate::error::{BrokerError, BrokerResult};

/// The lifecycle operations the protocol layer dispatches to.
#[async_trait::async_trait]
pub trait ServiceBroker: Send + Sync {
    /// The service listing for the catalog endpoint.
    fn services(&self) -> Vec<Service>;

    /// Create the instance's bucket, returning its location.
    async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
    ) -> BrokerResult<String>;

    /// Validate an update request. No setting is currently updatable.
    async fn update(&self, instance_id: &str, details: UpdateDetails) -> BrokerResult<()>;

    /// Delete the instance's bucket, purging contents unless the plan is
    /// durable.
    async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
    ) -> BrokerResult<()>;

    /// Issue credentials for the instance's bucket.
    async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> BrokerResult<Credentials>;

    /// Destroy the binding's principal and everything attached to it.
    async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: UnbindDetails,
    ) -> BrokerResult<()>;
}

/// [`ServiceBroker`] provisioning S3 buckets paired with IAM credentials.
pub struct S3Broker {
    catalog: Catalog,
    buckets: Arc<dyn ObjectStore>,
    identities: Arc<dyn IdentityStore>,
    tags: Arc<dyn TagGenerator>,
    directory: Option<Arc<dyn InstanceDirectory>>,
    partition: String,
    bucket_prefix: String,
    user_prefix: String,
    policy_prefix: String,
    iam_path: String,
    insecure_skip_verify: bool,
    allow_user_provision_parameters: bool,
    allow_user_update_parameters: bool,
}

impl S3Broker {
    /// Build a broker over the given stores and immutable catalog.
    #[must_use]
    pub fn new(
        config: &BrokerConfig,
        catalog: Catalog,
        buckets: Arc<dyn ObjectStore>,
        identities: Arc<dyn IdentityStore>,
        tags: Arc<dyn TagGenerator>,
    ) -> Self {
        Self {
            catalog,
            buckets,
            identities,
            tags,
            directory: None,
            partition: config.partition.clone(),
            bucket_prefix: config.bucket_prefix.clone(),
            user_prefix: config.user_prefix.clone(),
            policy_prefix: config.policy_prefix.clone(),
            iam_path: config.iam_path.clone(),
            insecure_skip_verify: config.insecure_skip_verify,
            allow_user_provision_parameters: config.allow_user_provision_parameters,
            allow_user_update_parameters: config.allow_user_update_parameters,
        }
    }

    /// Attach the platform directory used to resolve additional instance
    /// names at bind time.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn InstanceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    fn bucket_name(&self, instance_id: &str) -> String {
        format!("{}-{instance_id}", self.bucket_prefix)
    }

    fn user_name(&self, binding_id: &str) -> String {
        format!("{}-{binding_id}", self.user_prefix)
    }

    fn policy_name(&self, binding_id: &str) -> String {
        format!("{}-{binding_id}", self.policy_prefix)
    }

    fn plan_with_service(&self, plan_id: &str) -> BrokerResult<(&Service, &ServicePlan)> {
        let service = self
            .catalog
            .service_for_plan(plan_id)
            .ok_or_else(|| BrokerError::PlanNotFound {
                plan_id: plan_id.to_owned(),
            })?;
        let plan = service
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| BrokerError::PlanNotFound {
                plan_id: plan_id.to_owned(),
            })?;
        Ok((service, plan))
    }

    /// One concurrent describe per bucket name, collected by originating
    /// name. The first error wins; tasks still in flight are left to finish
    /// into channels nobody reads.
    async fn describe_all(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, BucketInfo>, StoreError> {
        let (detail_tx, mut detail_rx) = mpsc::channel(names.len());
        let (error_tx, mut error_rx) = mpsc::channel(names.len());

        for name in names {
            let buckets = Arc::clone(&self.buckets);
            let partition = self.partition.clone();
            let name = name.clone();
            let detail_tx = detail_tx.clone();
            let error_tx = error_tx.clone();
            tokio::spawn(async move {
                // Each channel has one slot per task, so sends never block;
                // the receiver may already be gone after an earlier error.
                match buckets.describe(&name, &partition).await {
                    Ok(info) => {
                        let _ = detail_tx.send((name, info)).await;
                    }
                    Err(err) => {
                        let _ = error_tx.send((name, err)).await;
                    }
                }
            });
        }
        drop(detail_tx);
        drop(error_tx);

        let mut described = HashMap::with_capacity(names.len());
        for _ in 0..names.len() {
            tokio::select! {
                Some((name, info)) = detail_rx.recv() => {
                    described.insert(name, info);
                }
                Some((name, err)) = error_rx.recv() => {
                    warn!(bucket = %name, error = %err, "describe failed, aborting bind");
                    return Err(err);
                }
            }
        }
        Ok(described)
    }

    /// Best-effort removal of everything a failed bind created, in reverse
    /// creation order. Cleanup failures are logged and swallowed; the
    /// caller surfaces its original error.
    async fn rollback_binding(
        &self,
        user_name: &str,
        access_key_id: Option<&str>,
        policy_arn: Option<&str>,
    ) {
        warn!(user = user_name, "rolling back partially created binding");
        if let Some(arn) = policy_arn {
            if let Err(err) = self.identities.delete_policy(arn).await {
                warn!(policy = arn, error = %err, "rollback could not delete policy");
            }
        }
        if let Some(key_id) = access_key_id {
            if let Err(err) = self.identities.delete_access_key(user_name, key_id).await {
                warn!(user = user_name, error = %err, "rollback could not delete access key");
            }
        }
        if let Err(err) = self.identities.delete_principal(user_name).await {
            warn!(user = user_name, error = %err, "rollback could not delete principal");
        }
    }
}

impl fmt::Debug for S3Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Broker")
            .field("partition", &self.partition)
            .field("bucket_prefix", &self.bucket_prefix)
            .field("user_prefix", &self.user_prefix)
            .field("policy_prefix", &self.policy_prefix)
            .field("iam_path", &self.iam_path)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ServiceBroker for S3Broker {
    fn services(&self) -> Vec<Service> {
        self.catalog.services.clone()
    }

    async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
    ) -> BrokerResult<String> {
        debug!(
            instance_id,
            service_id = %details.service_id,
            plan_id = %details.plan_id,
            "provision"
        );
        let (service, plan) = self.plan_with_service(&details.plan_id)?;
        let params: ProvisionParameters = decode_parameters(
            details.parameters.as_ref(),
            self.allow_user_provision_parameters,
        )?;

        let ids = CorrelationIds {
            instance_id: instance_id.to_owned(),
            binding_id: None,
            organization_guid: optional_guid(&details.organization_guid),
            space_guid: optional_guid(&details.space_guid),
        };
        let tags = self
            .tags
            .generate(Action::Created, &service.name, &plan.name, &ids, false)?;

        let bucket_details = BucketDetails {
            partition: self.partition.clone(),
            policy: plan.bucket_policy_text(),
            encryption: plan.encryption_document().cloned(),
            object_ownership: params.object_ownership.unwrap_or_default(),
            tags,
        };
        let location = self
            .buckets
            .create(&self.bucket_name(instance_id), &bucket_details)
            .await?;
        info!(instance_id, location, "provisioned instance");
        Ok(location)
    }

    async fn update(&self, instance_id: &str, details: UpdateDetails) -> BrokerResult<()> {
        debug!(instance_id, plan_id = %details.plan_id, "update");
        self.plan_with_service(&details.plan_id)?;
        let params: UpdateParameters = decode_parameters(
            details.parameters.as_ref(),
            self.allow_user_update_parameters,
        )?;
        // No bucket setting is updatable yet; the plan and parameters are
        // validated and the request otherwise succeeds without touching
        // the backend.
        debug!(
            instance_id,
            apply_immediately = params.apply_immediately,
            "update validated, nothing to change"
        );
        Ok(())
    }

    async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
    ) -> BrokerResult<()> {
        debug!(
            instance_id,
            service_id = %details.service_id,
            plan_id = %details.plan_id,
            "deprovision"
        );
        let (_, plan) = self.plan_with_service(&details.plan_id)?;
        // Durable plans keep their contents: deleting a non-empty durable
        // bucket fails, guarding the data against accidental deprovision.
        let purge_contents = !plan.durable;
        match self
            .buckets
            .delete(&self.bucket_name(instance_id), purge_contents)
            .await
        {
            Ok(()) => {
                info!(instance_id, "deprovisioned instance");
                Ok(())
            }
            Err(err) if err.is_not_found() => Err(BrokerError::InstanceGone {
                instance_id: instance_id.to_owned(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> BrokerResult<Credentials> {
        debug!(
            instance_id,
            binding_id,
            plan_id = %details.plan_id,
            app_guid = ?details.app_guid,
            "bind"
        );
        let (service, plan) = self.plan_with_service(&details.plan_id)?;
        let policy_template = plan.iam_policy_text().ok_or_else(|| {
            BrokerError::Internal(anyhow!("plan {} carries no IAM policy template", plan.id))
        })?;
        let params: BindParameters = decode_parameters(details.parameters.as_ref(), true)?;

        let primary = self.bucket_name(instance_id);
        let mut names = vec![primary.clone()];
        if !params.additional_instances.is_empty() {
            let Some(directory) = &self.directory else {
                return Err(BrokerError::DirectoryUnavailable);
            };
            match directory.resolve(&params.additional_instances).await {
                Ok(buckets) => names.extend(buckets),
                Err(DirectoryError::Unknown { name }) => {
                    return Err(BrokerError::UnknownInstance { name });
                }
                Err(DirectoryError::Unavailable(err)) => {
                    return Err(BrokerError::Internal(err));
                }
            }
        }

        let described = match self.describe_all(&names).await {
            Ok(described) => described,
            Err(err) if err.is_not_found() => {
                return Err(BrokerError::InstanceGone {
                    instance_id: instance_id.to_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let primary_info = described
            .get(&primary)
            .ok_or_else(|| BrokerError::Internal(anyhow!("no describe result for {primary}")))?;
        let mut bucket_arns = Vec::with_capacity(names.len());
        for name in &names {
            let info = described
                .get(name)
                .ok_or_else(|| BrokerError::Internal(anyhow!("no describe result for {name}")))?;
            bucket_arns.push(info.arn.clone());
        }
        let additional_buckets: Vec<String> = names.iter().skip(1).cloned().collect();

        let user_name = self.user_name(binding_id);
        let ids = CorrelationIds {
            instance_id: instance_id.to_owned(),
            binding_id: Some(binding_id.to_owned()),
            organization_guid: None,
            space_guid: None,
        };

        // Failures before the principal exists return directly; everything
        // after it must roll back what was created so far.
        let principal_tags = self
            .tags
            .generate(Action::Created, &service.name, &plan.name, &ids, false)?;
        self.identities
            .create_principal(&user_name, &self.iam_path, &principal_tags)
            .await?;

        let access_key = match self.identities.create_access_key(&user_name).await {
            Ok(key) => key,
            Err(err) => {
                self.rollback_binding(&user_name, None, None).await;
                return Err(err.into());
            }
        };

        let policy_tags = match self
            .tags
            .generate(Action::Created, &service.name, &plan.name, &ids, false)
        {
            Ok(tags) => tags,
            Err(err) => {
                self.rollback_binding(&user_name, Some(&access_key.id), None).await;
                return Err(err.into());
            }
        };
        let policy_arn = match self
            .identities
            .create_policy(
                &self.policy_name(binding_id),
                &self.iam_path,
                &policy_template,
                &bucket_arns,
                &policy_tags,
            )
            .await
        {
            Ok(arn) => arn,
            Err(err) => {
                self.rollback_binding(&user_name, Some(&access_key.id), None).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.identities.attach_policy(&user_name, &policy_arn).await {
            self.rollback_binding(&user_name, Some(&access_key.id), Some(&policy_arn))
                .await;
            return Err(err.into());
        }

        let uri = bucket_uri(
            &access_key.id,
            &access_key.secret,
            &primary_info.endpoint,
            &primary,
        );
        info!(instance_id, binding_id, user = %user_name, "bound instance");
        Ok(Credentials {
            uri,
            access_key_id: access_key.id,
            secret_access_key: access_key.secret,
            region: primary_info.region.clone(),
            endpoint: primary_info.endpoint.clone(),
            bucket: primary,
            additional_buckets,
            insecure_skip_verify: self.insecure_skip_verify,
        })
    }

    async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: UnbindDetails,
    ) -> BrokerResult<()> {
        debug!(
            instance_id,
            binding_id,
            plan_id = %details.plan_id,
            "unbind"
        );
        let user_name = self.user_name(binding_id);

        // The principal may be partially or fully gone from an earlier
        // failed bind or unbind. Missing resources read as empty lists or
        // completed deletes so repeated unbinds converge.
        let key_ids = empty_if_missing(self.identities.list_access_keys(&user_name).await)?;
        for key_id in key_ids {
            ignore_missing(self.identities.delete_access_key(&user_name, &key_id).await)?;
        }

        let policy_arns = empty_if_missing(
            self.identities
                .list_attached_policies(&user_name, &self.iam_path)
                .await,
        )?;
        for arn in policy_arns {
            ignore_missing(self.identities.detach_policy(&user_name, &arn).await)?;
            ignore_missing(self.identities.delete_policy(&arn).await)?;
        }

        ignore_missing(self.identities.delete_principal(&user_name).await)?;
        info!(instance_id, binding_id, "unbound instance");
        Ok(())
    }
}

fn decode_parameters<T>(raw: Option<&serde_json::Value>, allowed: bool) -> BrokerResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match raw {
        Some(value) if allowed => {
            serde_json::from_value(value.clone()).map_err(|err| BrokerError::InvalidParameters {
                reason: err.to_string(),
            })
        }
        _ => Ok(T::default()),
    }
}

fn optional_guid(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn empty_if_missing(result: IdentityResult<Vec<String>>) -> BrokerResult<Vec<String>> {
    match result {
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        other => Ok(other?),
    }
}

fn ignore_missing(result: IdentityResult<()>) -> BrokerResult<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => Ok(other?),
    }
}
