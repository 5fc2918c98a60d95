//! CloudFormation API client.
//!
//! This module wraps the AWS SDK client behind the small operation
//! traits the rest of the crate consumes, and maps service errors into
//! the crate's error types. The only error treated specially is the
//! "stack does not exist" validation error, which is recognized by its
//! structured code plus message and reported as an absent stack rather
//! than a failure.

use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, ChangeSetType, Parameter, Tag};
use tracing::{debug, info};

use crate::error::{CloudError, CumulusError, Result};

use super::changeset::{ChangeSetDetail, ChangeSetOps};
use super::drift::{DriftOps, DriftProbe};
use super::types::{
    ControlPlane, OperationMode, OperationPlan, ResourceChangeSummary, StackEventInfo,
    StackListing, StackResourceInfo, StackSnapshot,
};

/// Loads the shared AWS configuration for the given region and profile.
///
/// Absent values fall back to the ambient default chain.
pub async fn load_aws_config(
    region: Option<&str>,
    profile: Option<&str>,
) -> aws_config::SdkConfig {
    let mut loader = aws_config::from_env();
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

/// CloudFormation control-plane client.
#[derive(Debug, Clone)]
pub struct CfnClient {
    /// Underlying SDK client.
    client: aws_sdk_cloudformation::Client,
}

impl CfnClient {
    /// Creates a client from a shared AWS configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
        }
    }

    /// Lists all stacks in the region, skipping fully deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    pub async fn list_stacks(&self) -> Result<Vec<StackListing>> {
        let mut listings = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_stacks()
                .set_next_token(next_token.clone())
                .send()
                .await
                .map_err(|e| api_error("ListStacks", &e))?;

            for summary in output.stack_summaries() {
                let status = summary
                    .stack_status()
                    .map_or("UNKNOWN", |s| s.as_str())
                    .to_string();
                if status == "DELETE_COMPLETE" {
                    continue;
                }
                listings.push(StackListing {
                    name: summary.stack_name().unwrap_or_default().to_string(),
                    status,
                });
            }

            next_token = output.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(listings)
    }

    /// Lists every resource of a stack, following continuation tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    pub async fn list_stack_resources(&self, stack_name: &str) -> Result<Vec<StackResourceInfo>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_stack_resources()
                .stack_name(stack_name)
                .set_next_token(next_token.clone())
                .send()
                .await
                .map_err(|e| api_error("ListStackResources", &e))?;

            for summary in output.stack_resource_summaries() {
                resources.push(StackResourceInfo {
                    logical_id: summary.logical_resource_id().unwrap_or_default().to_string(),
                    physical_id: summary
                        .physical_resource_id()
                        .unwrap_or("unknown")
                        .to_string(),
                    resource_type: summary.resource_type().unwrap_or_default().to_string(),
                    resource_status: summary
                        .resource_status()
                        .map_or("unknown", |s| s.as_str())
                        .to_string(),
                    drift_status: summary
                        .drift_information()
                        .and_then(|d| d.stack_resource_drift_status())
                        .map_or("unknown", |s| s.as_str())
                        .to_string(),
                });
            }

            next_token = output.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(resources)
    }

    /// Fetches the most recent stack events, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the events call fails.
    pub async fn recent_stack_events(
        &self,
        stack_name: &str,
        limit: usize,
    ) -> Result<Vec<StackEventInfo>> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_stack_events()
                .stack_name(stack_name)
                .set_next_token(next_token.clone())
                .send()
                .await
                .map_err(|e| api_error("DescribeStackEvents", &e))?;

            for event in output.stack_events() {
                if events.len() >= limit {
                    return Ok(events);
                }
                events.push(StackEventInfo {
                    timestamp: event.timestamp().map(ToString::to_string).unwrap_or_default(),
                    status: event
                        .resource_status()
                        .map_or("unknown", |s| s.as_str())
                        .to_string(),
                    logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
                    reason: event.resource_status_reason().map(ToString::to_string),
                });
            }

            next_token = output.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(events)
    }

    /// Builds the SDK parameter list for a plan.
    fn plan_parameters(plan: &OperationPlan) -> Vec<Parameter> {
        plan.parameters
            .iter()
            .map(|(key, value)| {
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value)
                    .build()
            })
            .collect()
    }

    /// Builds the SDK tag list for a plan.
    fn plan_tags(plan: &OperationPlan) -> Result<Vec<Tag>> {
        plan.tags
            .iter()
            .map(|(key, value)| Ok(Tag::builder().key(key).value(value).build()))
            .collect()
    }
}

#[async_trait]
impl ControlPlane for CfnClient {
    async fn fetch_snapshot(&self, stack_name: &str) -> Result<Option<StackSnapshot>> {
        let result = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.stacks().first().map(|stack| StackSnapshot {
                name: stack_name.to_string(),
                status: stack
                    .stack_status()
                    .map_or("UNKNOWN", |s| s.as_str())
                    .to_string(),
                stack_id: stack.stack_id().map(ToString::to_string),
            })),
            Err(sdk_err) => {
                if is_stack_missing(&sdk_err) {
                    debug!("stack {stack_name} does not exist");
                    Ok(None)
                } else {
                    Err(api_error("DescribeStacks", &sdk_err))
                }
            }
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| api_error("DeleteStack", &e))?;

        info!("delete started for stack: {stack_name}");
        Ok(())
    }

    async fn create_stack(&self, stack_name: &str, plan: &OperationPlan) -> Result<String> {
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_url(&plan.template_url)
            .set_parameters(Some(Self::plan_parameters(plan)))
            .set_tags(Some(Self::plan_tags(plan)?))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .client_request_token(&plan.client_token)
            .send()
            .await
            .map_err(|e| api_error("CreateStack", &e))?;

        let stack_id = output.stack_id().unwrap_or_default().to_string();
        info!("create started for stack: {stack_name} ({stack_id})");
        Ok(stack_id)
    }

    async fn update_stack(&self, stack_name: &str, plan: &OperationPlan) -> Result<String> {
        let output = self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_url(&plan.template_url)
            .set_parameters(Some(Self::plan_parameters(plan)))
            .set_tags(Some(Self::plan_tags(plan)?))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .client_request_token(&plan.client_token)
            .send()
            .await
            .map_err(|e| api_error("UpdateStack", &e))?;

        let stack_id = output.stack_id().unwrap_or_default().to_string();
        info!("update started for stack: {stack_name} ({stack_id})");
        Ok(stack_id)
    }
}

#[async_trait]
impl ChangeSetOps for CfnClient {
    async fn create_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        plan: &OperationPlan,
    ) -> Result<String> {
        let change_set_type = match plan.mode {
            OperationMode::Create => ChangeSetType::Create,
            OperationMode::Update => ChangeSetType::Update,
        };

        let output = self
            .client
            .create_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .change_set_type(change_set_type)
            .template_url(&plan.template_url)
            .set_parameters(Some(Self::plan_parameters(plan)))
            .set_tags(Some(Self::plan_tags(plan)?))
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|e| api_error("CreateChangeSet", &e))?;

        Ok(output.id().unwrap_or_default().to_string())
    }

    async fn describe_change_set(&self, change_set_id: &str) -> Result<ChangeSetDetail> {
        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| api_error("DescribeChangeSet", &e))?;

        let changes = output
            .changes()
            .iter()
            .filter_map(|change| change.resource_change())
            .map(|rc| ResourceChangeSummary {
                action: rc.action().map_or("?", |a| a.as_str()).to_string(),
                logical_id: rc.logical_resource_id().unwrap_or_default().to_string(),
                physical_id: rc.physical_resource_id().map(ToString::to_string),
                resource_type: rc.resource_type().unwrap_or_default().to_string(),
                replacement: rc.replacement().map(|r| r.as_str().to_string()),
            })
            .collect();

        Ok(ChangeSetDetail {
            status: output.status().map_or("UNKNOWN", |s| s.as_str()).to_string(),
            status_reason: output.status_reason().map(ToString::to_string),
            changes,
        })
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<()> {
        self.client
            .delete_change_set()
            .change_set_name(change_set_id)
            .send()
            .await
            .map_err(|e| api_error("DeleteChangeSet", &e))?;

        info!("deleted change set: {change_set_id}");
        Ok(())
    }
}

#[async_trait]
impl DriftOps for CfnClient {
    async fn start_drift_detection(&self, stack_name: &str) -> Result<Option<String>> {
        let output = self
            .client
            .detect_stack_drift()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| api_error("DetectStackDrift", &e))?;

        Ok(output.stack_drift_detection_id().map(ToString::to_string))
    }

    async fn drift_detection_status(&self, detection_id: &str) -> Result<DriftProbe> {
        let output = self
            .client
            .describe_stack_drift_detection_status()
            .stack_drift_detection_id(detection_id)
            .send()
            .await
            .map_err(|e| api_error("DescribeStackDriftDetectionStatus", &e))?;

        Ok(DriftProbe {
            status: output
                .detection_status()
                .map_or("UNKNOWN", |s| s.as_str())
                .to_string(),
            verdict: output.stack_drift_status().map(|s| s.as_str().to_string()),
        })
    }

    async fn resource_drift_report(&self, stack_name: &str) -> Result<Vec<StackResourceInfo>> {
        let output = self
            .client
            .describe_stack_resources()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| api_error("DescribeStackResources", &e))?;

        Ok(output
            .stack_resources()
            .iter()
            .map(|resource| StackResourceInfo {
                logical_id: resource.logical_resource_id().unwrap_or_default().to_string(),
                physical_id: resource
                    .physical_resource_id()
                    .unwrap_or("unknown")
                    .to_string(),
                resource_type: resource.resource_type().unwrap_or_default().to_string(),
                resource_status: resource
                    .resource_status()
                    .map_or("unknown", |s| s.as_str())
                    .to_string(),
                drift_status: resource
                    .drift_information()
                    .and_then(|d| d.stack_resource_drift_status())
                    .map_or("unknown", |s| s.as_str())
                    .to_string(),
            })
            .collect())
    }
}

/// Maps an SDK error into a crate API error for the named operation.
fn api_error<E, R>(
    operation: &str,
    err: &aws_sdk_cloudformation::error::SdkError<E, R>,
) -> CumulusError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    CloudError::api(operation, format!("{}", DisplayErrorContext(err))).into()
}

/// Recognizes the "stack does not exist" validation error.
///
/// Only this exact condition is treated as an absent stack; every other
/// failure propagates.
fn is_stack_missing<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some("ValidationError")
        && err.message().is_some_and(|m| m.contains("does not exist"))
}
