//! AWS SDK integration: the IAM operations the search pipeline depends on.

pub(crate) mod iam_client;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AttachmentTarget, Decision, Policy, PolicyScope, PolicyVersion, User};

pub use iam_client::AwsIamClient;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("IAM client error: {0}")]
    IamError(String),
    #[error("AWS SDK error: {0}")]
    SdkError(String),
}

pub type AwsResult<T> = Result<T, AwsError>;

/// One page of a paginated IAM listing.
///
/// `marker` is the continuation token to echo back on the next call; it is only
/// meaningful when `is_truncated` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub is_truncated: bool,
    pub marker: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            is_truncated: false,
            marker: None,
        }
    }

    /// A page followed by more results at `marker`
    pub fn truncated(items: Vec<T>, marker: impl Into<String>) -> Self {
        Self {
            items,
            is_truncated: true,
            marker: Some(marker.into()),
        }
    }
}

/// The IAM operations used by the search pipeline.
///
/// Implementations must be safe to share across the pipeline's tasks; every
/// stage holds the same client behind an `Arc`.
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn list_policies(
        &self,
        scope: PolicyScope,
        marker: Option<String>,
    ) -> AwsResult<Page<Policy>>;

    async fn list_policy_versions(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<PolicyVersion>>;

    /// Returns the still percent-encoded document of one policy version
    async fn get_policy_version_document(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> AwsResult<String>;

    async fn list_users(&self, marker: Option<String>) -> AwsResult<Page<User>>;

    /// Lists the names of the inline policies embedded in a user
    async fn list_user_policies(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>>;

    /// Returns the still percent-encoded document of a user's inline policy
    async fn get_user_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> AwsResult<String>;

    /// Simulates exactly one action on one resource against one policy document.
    ///
    /// Decisions come back in the order the service returned them.
    async fn simulate_custom_policy(
        &self,
        action: &str,
        resource: &str,
        policy_document: &str,
    ) -> AwsResult<Vec<Decision>>;

    /// Lists the principals a managed policy is attached to. Within a page,
    /// groups come first, then roles, then users.
    async fn list_entities_for_policy(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<AttachmentTarget>>;
}
