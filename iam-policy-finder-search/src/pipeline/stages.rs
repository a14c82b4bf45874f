//! Producer stages of the search pipeline.
//!
//! Each stage drains its input channel and feeds its output channel, and
//! returns once the input is exhausted, the consumer has gone away, or (under
//! [`ErrorPolicy::Halt`]) after its first failure. Errors travel downstream as
//! `Err` items so the reporter sees every one of them. Errors arriving from
//! upstream are forwarded untouched.

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, warn};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::aws::IamApi;
use crate::decode::decode_document;
use crate::error::{FinderError, FinderResult, Stage};
use crate::pagination::paginate;
use crate::types::{
    ErrorPolicy, InlineTask, Policy, PolicyInfo, PolicyScope, PolicyVersion, User,
    VersionSelection, VersionTask,
};

/// Send one item downstream. Returns false once the consumer has gone away.
async fn emit<T>(output: &Sender<FinderResult<T>>, item: FinderResult<T>) -> bool {
    output.send(item).await.is_ok()
}

/// Whether a stage keeps consuming after one of its own failures
fn carry_on(stage: Stage, on_error: ErrorPolicy) -> bool {
    match on_error {
        ErrorPolicy::Skip => true,
        ErrorPolicy::Halt => {
            warn!("Stopping stage after error {stage}");
            false
        }
    }
}

/// Policy enumerator: every managed policy in `scope`
pub async fn enumerate_policies<C>(
    client: Arc<C>,
    scope: PolicyScope,
    output: Sender<FinderResult<Policy>>,
) where
    C: IamApi + ?Sized,
{
    debug!("Enumerating {scope:?} policies");
    let policies = paginate(|marker| client.list_policies(scope, marker));
    tokio::pin!(policies);

    let mut count = 0usize;
    while let Some(policy) = policies.next().await {
        let item = policy.map_err(|e| FinderError::stage(Stage::ListPolicies, "account", e));
        count += usize::from(item.is_ok());
        if !emit(&output, item).await {
            return;
        }
    }
    debug!("Enumerated {count} policies");
}

/// User enumerator: every user in the account
pub async fn enumerate_users<C>(client: Arc<C>, output: Sender<FinderResult<User>>)
where
    C: IamApi + ?Sized,
{
    debug!("Enumerating users");
    let users = paginate(|marker| client.list_users(marker));
    tokio::pin!(users);

    let mut count = 0usize;
    while let Some(user) = users.next().await {
        let item = user.map_err(|e| FinderError::stage(Stage::ListUsers, "account", e));
        count += usize::from(item.is_ok());
        if !emit(&output, item).await {
            return;
        }
    }
    debug!("Enumerated {count} users");
}

/// Policy version resolver: one task per selected version of each policy
pub async fn resolve_policy_versions<C>(
    client: Arc<C>,
    versions: VersionSelection,
    on_error: ErrorPolicy,
    mut input: Receiver<FinderResult<Policy>>,
    output: Sender<FinderResult<VersionTask>>,
) where
    C: IamApi + ?Sized,
{
    debug!("Resolving {versions:?} policy versions");
    let mut count = 0usize;
    while let Some(item) = input.recv().await {
        let policy = match item {
            Ok(policy) => policy,
            Err(e) => {
                if !emit(&output, Err(e)).await {
                    return;
                }
                continue;
            }
        };

        if versions == VersionSelection::DefaultOnly {
            if let Some(version_id) = policy.default_version_id.clone() {
                count += 1;
                let task = VersionTask {
                    policy,
                    version: PolicyVersion::new(version_id, true),
                };
                if !emit(&output, Ok(task)).await {
                    return;
                }
                continue;
            }
        }

        let listed = paginate(|marker| client.list_policy_versions(&policy.arn, marker));
        tokio::pin!(listed);

        let mut failed = false;
        while let Some(version) = listed.next().await {
            let item = match version {
                Ok(version) => {
                    if versions == VersionSelection::DefaultOnly && !version.is_default {
                        continue;
                    }
                    count += 1;
                    Ok(VersionTask {
                        policy: policy.clone(),
                        version,
                    })
                }
                Err(e) => {
                    failed = true;
                    Err(FinderError::stage(
                        Stage::ListPolicyVersions,
                        policy.arn.as_str(),
                        e,
                    ))
                }
            };
            if !emit(&output, item).await {
                return;
            }
        }

        if failed && !carry_on(Stage::ListPolicyVersions, on_error) {
            return;
        }
    }
    debug!("Resolved {count} policy versions");
}

/// User inline policy resolver: one task per inline policy name of each user
pub async fn resolve_user_policies<C>(
    client: Arc<C>,
    on_error: ErrorPolicy,
    mut input: Receiver<FinderResult<User>>,
    output: Sender<FinderResult<InlineTask>>,
) where
    C: IamApi + ?Sized,
{
    debug!("Resolving user inline policies");
    let mut count = 0usize;
    while let Some(item) = input.recv().await {
        let user = match item {
            Ok(user) => user,
            Err(e) => {
                if !emit(&output, Err(e)).await {
                    return;
                }
                continue;
            }
        };

        let names = paginate(|marker| client.list_user_policies(&user.name, marker));
        tokio::pin!(names);

        let mut failed = false;
        while let Some(name) = names.next().await {
            let item = match name {
                Ok(policy_name) => {
                    count += 1;
                    Ok(InlineTask {
                        user: user.clone(),
                        policy_name,
                    })
                }
                Err(e) => {
                    failed = true;
                    Err(FinderError::stage(
                        Stage::ListUserPolicies,
                        user.name.as_str(),
                        e,
                    ))
                }
            };
            if !emit(&output, item).await {
                return;
            }
        }

        if failed && !carry_on(Stage::ListUserPolicies, on_error) {
            return;
        }
    }
    debug!("Resolved {count} user inline policies");
}

async fn fetch_managed<C>(client: &C, task: VersionTask) -> FinderResult<PolicyInfo>
where
    C: IamApi + ?Sized,
{
    let VersionTask { policy, version } = task;
    let subject = format!("{} {}", policy.arn, version.version_id);

    let encoded = client
        .get_policy_version_document(&policy.arn, &version.version_id)
        .await
        .map_err(|e| FinderError::stage(Stage::GetPolicyVersion, subject.as_str(), e))?;
    let document = decode_document(&encoded).map_err(|e| FinderError::decode(subject, e))?;

    Ok(PolicyInfo::Managed {
        arn: policy.arn,
        name: policy.name,
        path: policy.path,
        version_id: version.version_id,
        document,
    })
}

async fn fetch_inline<C>(client: &C, task: InlineTask) -> FinderResult<PolicyInfo>
where
    C: IamApi + ?Sized,
{
    let InlineTask { user, policy_name } = task;
    let subject = format!("{} {}", user.name, policy_name);

    let encoded = client
        .get_user_policy_document(&user.name, &policy_name)
        .await
        .map_err(|e| FinderError::stage(Stage::GetUserPolicy, subject.as_str(), e))?;
    let document = decode_document(&encoded).map_err(|e| FinderError::decode(subject, e))?;

    Ok(PolicyInfo::Inline {
        user_name: user.name,
        policy_name,
        document,
    })
}

/// Policy document fetcher: fetches and decodes each managed policy version
pub async fn fetch_policy_documents<C>(
    client: Arc<C>,
    on_error: ErrorPolicy,
    mut input: Receiver<FinderResult<VersionTask>>,
    output: Sender<FinderResult<PolicyInfo>>,
) where
    C: IamApi + ?Sized,
{
    debug!("Fetching policy documents");
    let mut count = 0usize;
    while let Some(item) = input.recv().await {
        let result = match item {
            Ok(task) => fetch_managed(client.as_ref(), task).await,
            Err(e) => {
                if !emit(&output, Err(e)).await {
                    return;
                }
                continue;
            }
        };

        let failed = result.is_err();
        count += usize::from(!failed);
        if !emit(&output, result).await {
            return;
        }
        if failed && !carry_on(Stage::GetPolicyVersion, on_error) {
            return;
        }
    }
    debug!("Fetched {count} policy documents");
}

/// User policy document fetcher: fetches and decodes each user inline policy
pub async fn fetch_user_policy_documents<C>(
    client: Arc<C>,
    on_error: ErrorPolicy,
    mut input: Receiver<FinderResult<InlineTask>>,
    output: Sender<FinderResult<PolicyInfo>>,
) where
    C: IamApi + ?Sized,
{
    debug!("Fetching user policy documents");
    let mut count = 0usize;
    while let Some(item) = input.recv().await {
        let result = match item {
            Ok(task) => fetch_inline(client.as_ref(), task).await,
            Err(e) => {
                if !emit(&output, Err(e)).await {
                    return;
                }
                continue;
            }
        };

        let failed = result.is_err();
        count += usize::from(!failed);
        if !emit(&output, result).await {
            return;
        }
        if failed && !carry_on(Stage::GetUserPolicy, on_error) {
            return;
        }
    }
    debug!("Fetched {count} user policy documents");
}
