//! In-memory IAM fixtures for exercising the pipeline without AWS.
//!
//! Listings are served from pre-split pages. The marker for page `i` of a
//! listing keyed by `key` is `"{key}#{i}"`, where `key` is `policies`, `users`,
//! the policy ARN or the user name. Every call is recorded so tests can check
//! marker threading, and any call can be made to fail by its subject or marker.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::aws::{AwsError, AwsResult, IamApi, Page};
use crate::error::Stage;
use crate::types::{AttachmentTarget, Decision, Policy, PolicyScope, PolicyVersion, User};

/// Sample policy documents, in decoded form.
pub mod fixtures {
    /// Allows `s3:GetObject` on every object
    pub const ALLOW_S3_GET: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"arn:aws:s3:::*/*"}]}"#;

    /// Denies all of S3
    pub const DENY_S3: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Action":"s3:*","Resource":"*"}]}"#;

    /// Allows reading DynamoDB only
    pub const ALLOW_DYNAMODB_READ: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["dynamodb:GetItem","dynamodb:Query"],"Resource":"*"}]}"#;

    /// Allows everything for S3 on one bucket
    pub const ALLOW_S3_BUCKET: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:*","Resource":["arn:aws:s3:::bucket","arn:aws:s3:::bucket/*"]}]}"#;
}

/// Percent-encode a document the way IAM returns it
pub fn encode(document: &str) -> String {
    utf8_percent_encode(document, NON_ALPHANUMERIC).to_string()
}

/// One recorded call against the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub stage: Stage,
    pub subject: String,
    pub marker: Option<String>,
}

/// A scripted, in-memory [`IamApi`].
///
/// Documents are simulated by exact match on their decoded text. Unknown
/// documents come back as [`Decision::ImplicitDeny`].
#[derive(Default)]
pub struct FakeIamClient {
    policies: Vec<Vec<Policy>>,
    versions: HashMap<String, Vec<Vec<PolicyVersion>>>,
    version_documents: HashMap<(String, String), String>,
    users: Vec<Vec<User>>,
    user_policies: HashMap<String, Vec<Vec<String>>>,
    user_documents: HashMap<(String, String), String>,
    decisions: HashMap<String, Vec<Decision>>,
    entities: HashMap<String, Vec<Vec<AttachmentTarget>>>,
    failures: HashSet<(Stage, String)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeIamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy_pages(mut self, pages: Vec<Vec<Policy>>) -> Self {
        self.policies = pages;
        self
    }

    pub fn with_version_pages(mut self, policy_arn: &str, pages: Vec<Vec<PolicyVersion>>) -> Self {
        self.versions.insert(policy_arn.to_string(), pages);
        self
    }

    /// Register the encoded document of one policy version
    pub fn with_version_document(
        mut self,
        policy_arn: &str,
        version_id: &str,
        encoded: &str,
    ) -> Self {
        self.version_documents.insert(
            (policy_arn.to_string(), version_id.to_string()),
            encoded.to_string(),
        );
        self
    }

    pub fn with_user_pages(mut self, pages: Vec<Vec<User>>) -> Self {
        self.users = pages;
        self
    }

    pub fn with_user_policy_pages(mut self, user_name: &str, pages: Vec<Vec<String>>) -> Self {
        self.user_policies.insert(user_name.to_string(), pages);
        self
    }

    /// Register the encoded document of one user inline policy
    pub fn with_user_document(mut self, user_name: &str, policy_name: &str, encoded: &str) -> Self {
        self.user_documents.insert(
            (user_name.to_string(), policy_name.to_string()),
            encoded.to_string(),
        );
        self
    }

    /// Script the simulation decisions for a decoded document
    pub fn with_decisions(mut self, document: &str, decisions: Vec<Decision>) -> Self {
        self.decisions.insert(document.to_string(), decisions);
        self
    }

    pub fn with_entity_pages(
        mut self,
        policy_arn: &str,
        pages: Vec<Vec<AttachmentTarget>>,
    ) -> Self {
        self.entities.insert(policy_arn.to_string(), pages);
        self
    }

    /// Fail every `stage` call whose subject or request marker equals `key`.
    ///
    /// Subjects are the policy ARN, the user name, or the decoded document for
    /// simulation. Account-wide listings have the empty subject.
    pub fn failing(mut self, stage: Stage, key: impl Into<String>) -> Self {
        self.failures.insert((stage, key.into()));
        self
    }

    /// Every call made so far, in call order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The markers sent with each `stage` call for `subject`, in call order
    pub fn markers(&self, stage: Stage, subject: &str) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == stage && c.subject == subject)
            .map(|c| c.marker)
            .collect()
    }

    fn record(&self, stage: Stage, subject: &str, marker: Option<&String>) -> AwsResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                stage,
                subject: subject.to_string(),
                marker: marker.cloned(),
            });

        let by_subject = self.failures.contains(&(stage, subject.to_string()));
        let by_marker = marker.is_some_and(|m| self.failures.contains(&(stage, m.clone())));
        if by_subject || by_marker {
            return Err(AwsError::IamError(format!(
                "injected failure {stage} for '{subject}'"
            )));
        }
        Ok(())
    }
}

fn serve<T: Clone>(
    key: &str,
    pages: Option<&Vec<Vec<T>>>,
    marker: Option<String>,
) -> AwsResult<Page<T>> {
    let Some(pages) = pages.filter(|p| !p.is_empty()) else {
        return Ok(Page::last(Vec::new()));
    };

    let index = match marker {
        None => 0,
        Some(marker) => marker
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('#'))
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|i| *i < pages.len())
            .ok_or_else(|| AwsError::IamError(format!("Invalid marker '{marker}'")))?,
    };

    let items = pages[index].clone();
    if index + 1 < pages.len() {
        Ok(Page::truncated(items, format!("{key}#{}", index + 1)))
    } else {
        Ok(Page::last(items))
    }
}

#[async_trait]
impl IamApi for FakeIamClient {
    async fn list_policies(
        &self,
        _scope: PolicyScope,
        marker: Option<String>,
    ) -> AwsResult<Page<Policy>> {
        self.record(Stage::ListPolicies, "", marker.as_ref())?;
        serve("policies", Some(&self.policies), marker)
    }

    async fn list_policy_versions(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<PolicyVersion>> {
        self.record(Stage::ListPolicyVersions, policy_arn, marker.as_ref())?;
        serve(policy_arn, self.versions.get(policy_arn), marker)
    }

    async fn get_policy_version_document(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> AwsResult<String> {
        self.record(Stage::GetPolicyVersion, policy_arn, None)?;
        self.version_documents
            .get(&(policy_arn.to_string(), version_id.to_string()))
            .cloned()
            .ok_or_else(|| AwsError::IamError(format!("NoSuchEntity: {policy_arn} {version_id}")))
    }

    async fn list_users(&self, marker: Option<String>) -> AwsResult<Page<User>> {
        self.record(Stage::ListUsers, "", marker.as_ref())?;
        serve("users", Some(&self.users), marker)
    }

    async fn list_user_policies(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>> {
        self.record(Stage::ListUserPolicies, user_name, marker.as_ref())?;
        serve(user_name, self.user_policies.get(user_name), marker)
    }

    async fn get_user_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> AwsResult<String> {
        self.record(Stage::GetUserPolicy, user_name, None)?;
        self.user_documents
            .get(&(user_name.to_string(), policy_name.to_string()))
            .cloned()
            .ok_or_else(|| AwsError::IamError(format!("NoSuchEntity: {user_name} {policy_name}")))
    }

    async fn simulate_custom_policy(
        &self,
        _action: &str,
        _resource: &str,
        policy_document: &str,
    ) -> AwsResult<Vec<Decision>> {
        self.record(Stage::SimulateCustomPolicy, policy_document, None)?;
        Ok(self
            .decisions
            .get(policy_document)
            .cloned()
            .unwrap_or_else(|| vec![Decision::ImplicitDeny]))
    }

    async fn list_entities_for_policy(
        &self,
        policy_arn: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<AttachmentTarget>> {
        self.record(Stage::ListEntitiesForPolicy, policy_arn, marker.as_ref())?;
        serve(policy_arn, self.entities.get(policy_arn), marker)
    }
}
