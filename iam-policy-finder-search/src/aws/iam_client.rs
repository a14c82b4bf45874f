//! AWS IAM client wrapper for the search pipeline
//!
//! Maps SDK outputs onto the pipeline's domain types. Listing calls hand back
//! a single page; the pipeline drives pagination itself.

use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::{PolicyEvaluationDecisionType, PolicyScopeType};
use aws_sdk_iam::Client as IamClient;
use log::warn;

use crate::aws::{AwsError, AwsResult, IamApi, Page};
use crate::types::{AttachmentTarget, Decision, Policy, PolicyScope, PolicyVersion, User};

pub struct AwsIamClient {
    client: IamClient,
}

impl AwsIamClient {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

impl From<PolicyScope> for PolicyScopeType {
    fn from(scope: PolicyScope) -> Self {
        match scope {
            PolicyScope::Local => PolicyScopeType::Local,
            PolicyScope::Aws => PolicyScopeType::Aws,
            PolicyScope::All => PolicyScopeType::All,
        }
    }
}

/// Decisions this SDK version does not know are never treated as allowing.
fn decision_from_sdk(decision: &PolicyEvaluationDecisionType) -> Decision {
    match decision {
        PolicyEvaluationDecisionType::Allowed => Decision::Allowed,
        PolicyEvaluationDecisionType::ImplicitDeny => Decision::ImplicitDeny,
        PolicyEvaluationDecisionType::ExplicitDeny => Decision::ExplicitDeny,
        other => {
            warn!(
                "Unrecognized evaluation decision {}, treating it as implicitDeny",
                other.as_str()
            );
            Decision::ImplicitDeny
        }
    }
}

fn page<T>(items: Vec<T>, is_truncated: bool, marker: Option<&str>) -> Page<T> {
    Page {
        items,
        is_truncated,
        marker: marker.map(str::to_string),
    }
}

#[async_trait]
impl IamApi for AwsIamClient {
    async fn list_policies(
        &self,
        scope: PolicyScope,
        marker: Option<String>,
    ) -> AwsResult<Page<Policy>> {
        let response = self
            .client
            .list_policies()
            .scope(scope.into())
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to list policies: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let policies = response
            .policies()
            .iter()
            .filter_map(|p| {
                let arn = p.arn()?;
                let policy = Policy::new(
                    arn,
                    p.policy_name().unwrap_or_default(),
                    p.path().unwrap_or("/"),
                );
                Some(match p.default_version_id() {
                    Some(version_id) => policy.with_default_version(version_id),
                    None => policy,
                })
            })
            .collect();
        Ok(page(policies, response.is_truncated(), response.marker()))
    }

    async fn list_policy_versions(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<PolicyVersion>> {
        let response = self
            .client
            .list_policy_versions()
            .policy_arn(policy_arn)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to list versions of policy '{policy_arn}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let versions = response
            .versions()
            .iter()
            .filter_map(|v| {
                v.version_id()
                    .map(|id| PolicyVersion::new(id, v.is_default_version()))
            })
            .collect();
        Ok(page(versions, response.is_truncated(), response.marker()))
    }

    async fn get_policy_version_document(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> AwsResult<String> {
        let response = self
            .client
            .get_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to get version '{version_id}' of policy '{policy_arn}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        response
            .policy_version()
            .and_then(|v| v.document())
            .map(str::to_string)
            .ok_or_else(|| {
                AwsError::SdkError(format!(
                    "Version '{version_id}' of policy '{policy_arn}' has no document"
                ))
            })
    }

    async fn list_users(&self, marker: Option<String>) -> AwsResult<Page<User>> {
        let response = self
            .client
            .list_users()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!("Failed to list users: {}", DisplayErrorContext(&e)))
            })?;

        let users = response
            .users()
            .iter()
            .map(|u| User::new(u.user_name(), u.user_id(), u.arn()))
            .collect();
        Ok(page(users, response.is_truncated(), response.marker()))
    }

    async fn list_user_policies(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>> {
        let response = self
            .client
            .list_user_policies()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to list inline policies of user '{user_name}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(page(
            response.policy_names().to_vec(),
            response.is_truncated(),
            response.marker(),
        ))
    }

    async fn get_user_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> AwsResult<String> {
        let response = self
            .client
            .get_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to get user policy '{policy_name}' of user '{user_name}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(response.policy_document)
    }

    async fn simulate_custom_policy(
        &self,
        action: &str,
        resource: &str,
        policy_document: &str,
    ) -> AwsResult<Vec<Decision>> {
        let response = self
            .client
            .simulate_custom_policy()
            .action_names(action)
            .resource_arns(resource)
            .policy_input_list(policy_document)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to simulate '{action}' on '{resource}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(response
            .evaluation_results()
            .iter()
            .map(|result| decision_from_sdk(result.eval_decision()))
            .collect())
    }

    async fn list_entities_for_policy(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<AttachmentTarget>> {
        let response = self
            .client
            .list_entities_for_policy()
            .policy_arn(policy_arn)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to list entities for policy '{policy_arn}': {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let groups = response.policy_groups().iter().map(|g| {
            AttachmentTarget::group(
                g.group_name().unwrap_or_default(),
                g.group_id().unwrap_or_default(),
            )
        });
        let roles = response.policy_roles().iter().map(|r| {
            AttachmentTarget::role(
                r.role_name().unwrap_or_default(),
                r.role_id().unwrap_or_default(),
            )
        });
        let users = response.policy_users().iter().map(|u| {
            AttachmentTarget::user(
                u.user_name().unwrap_or_default(),
                u.user_id().unwrap_or_default(),
            )
        });

        Ok(page(
            groups.chain(roles).chain(users).collect(),
            response.is_truncated(),
            response.marker(),
        ))
    }
}
