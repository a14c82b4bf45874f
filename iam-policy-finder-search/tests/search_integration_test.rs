//! Integration tests for the full search pipeline
//!
//! These tests run every stage against an in-memory IAM account.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use iam_policy_finder_search::testing::{encode, fixtures, FakeIamClient};
use iam_policy_finder_search::{
    AttachmentTarget, Decision, ErrorPolicy, FinderError, Pipeline, Policy, PolicyInfo,
    PolicyVersion, SearchOptions, SearchRequest, SearchSummary, Stage, User, VersionSelection,
};

const ALLOWING_ARN: &str = "arn:aws:iam::123456789012:policy/S3Reader";
const DENYING_ARN: &str = "arn:aws:iam::123456789012:policy/S3Lockdown";
const DYNAMO_ARN: &str = "arn:aws:iam::123456789012:policy/DynamoReader";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn request() -> SearchRequest {
    SearchRequest::new("s3:GetObject", "arn:aws:s3:::bucket/key")
}

fn managed_policy(client: FakeIamClient, arn: &str, document: &str) -> FakeIamClient {
    client
        .with_version_pages(arn, vec![vec![PolicyVersion::new("v1", true)]])
        .with_version_document(arn, "v1", &encode(document))
}

/// Two managed policies (one allowing, one denying) and one user with an
/// allowing inline policy
fn sample_account() -> FakeIamClient {
    let client = FakeIamClient::new()
        .with_policy_pages(vec![
            vec![Policy::new(ALLOWING_ARN, "S3Reader", "/")],
            vec![Policy::new(DENYING_ARN, "S3Lockdown", "/")],
        ])
        .with_user_pages(vec![vec![User::new(
            "alice",
            "AIDAALICE",
            "arn:aws:iam::123456789012:user/alice",
        )]])
        .with_user_policy_pages("alice", vec![vec!["bucket-access".to_string()]])
        .with_user_document("alice", "bucket-access", &encode(fixtures::ALLOW_S3_BUCKET))
        .with_decisions(fixtures::ALLOW_S3_GET, vec![Decision::Allowed])
        .with_decisions(fixtures::ALLOW_S3_BUCKET, vec![Decision::Allowed])
        .with_decisions(fixtures::DENY_S3, vec![Decision::ExplicitDeny])
        .with_entity_pages(
            ALLOWING_ARN,
            vec![
                vec![
                    AttachmentTarget::group("readers", "AGPAREADERS"),
                    AttachmentTarget::role("reporting", "AROAREPORTING"),
                ],
                vec![AttachmentTarget::user("bob", "AIDABOB")],
            ],
        );
    let client = managed_policy(client, ALLOWING_ARN, fixtures::ALLOW_S3_GET);
    managed_policy(client, DENYING_ARN, fixtures::DENY_S3)
}

async fn run(client: FakeIamClient, options: SearchOptions) -> (SearchSummary, Vec<String>) {
    init_logging();
    let request = request();
    let mut out = Vec::new();
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        Pipeline::new(Arc::new(client))
            .with_options(options)
            .run(&request, &mut out),
    )
    .await
    .expect("pipeline should terminate")
    .expect("report should be written");

    let text = String::from_utf8(out).expect("report should be UTF-8");
    (summary, text.lines().map(str::to_string).collect())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_reports_managed_and_inline_policies() {
    let (summary, lines) = run(sample_account(), SearchOptions::default()).await;

    assert_eq!(
        lines[0],
        "The action s3:GetObject on the resource arn:aws:s3:::bucket/key is allowed by the following policies:"
    );

    let managed_at = lines
        .iter()
        .position(|l| l.starts_with("Arn="))
        .expect("managed policy should be reported");
    assert_eq!(
        lines[managed_at],
        format!("Arn={ALLOWING_ARN} VersionId=v1")
    );
    assert_eq!(
        lines[managed_at + 1..managed_at + 4],
        [
            "\tis attached to group: Name=readers Id=AGPAREADERS",
            "\tis attached to role: Name=reporting Id=AROAREPORTING",
            "\tis attached to user: Name=bob Id=AIDABOB",
        ]
    );

    let report_lines: Vec<&String> = lines[1..].iter().filter(|l| !l.starts_with('\t')).collect();
    assert_eq!(report_lines.len(), 2);
    assert!(report_lines
        .iter()
        .any(|l| *l == "(user inline policy) UserName=alice PolicyName=bucket-access"));

    assert_eq!(
        summary,
        SearchSummary {
            evaluated: 3,
            allowed: 2,
            errors: 0
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sources_only_emit_well_formed_policy_info() {
    init_logging();
    let pipeline = Pipeline::new(Arc::new(sample_account()));
    let (mut documents, handles) = pipeline.spawn_sources();

    let mut infos = Vec::new();
    while let Some(item) = documents.recv().await {
        infos.push(item.expect("fixture account should not fail"));
    }
    for handle in handles {
        handle.await.expect("stage should complete");
    }

    assert_eq!(infos.len(), 3);
    for info in &infos {
        assert!(!info.document().is_empty());
        match info {
            PolicyInfo::Managed { arn, .. } => assert_eq!(info.arn(), Some(arn.as_str())),
            PolicyInfo::Inline { user_name, .. } => {
                assert_eq!(info.arn(), None);
                assert_eq!(user_name, "alice");
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_version_listing_failure_drains_cleanly() {
    let client = FakeIamClient::new()
        .with_policy_pages(vec![vec![
            Policy::new(ALLOWING_ARN, "S3Reader", "/"),
            Policy::new(DENYING_ARN, "S3Lockdown", "/"),
            Policy::new(DYNAMO_ARN, "DynamoReader", "/"),
        ]])
        .with_decisions(fixtures::ALLOW_S3_GET, vec![Decision::Allowed])
        .failing(Stage::ListPolicyVersions, DENYING_ARN);
    let client = managed_policy(client, ALLOWING_ARN, fixtures::ALLOW_S3_GET);
    let client = managed_policy(client, DYNAMO_ARN, fixtures::ALLOW_DYNAMODB_READ);

    let options = SearchOptions {
        on_error: ErrorPolicy::Halt,
        ..SearchOptions::default()
    };
    let (summary, lines) = run(client, options).await;

    assert!(lines.contains(&format!("Arn={ALLOWING_ARN} VersionId=v1")));
    assert_eq!(
        summary,
        SearchSummary {
            evaluated: 1,
            allowed: 1,
            errors: 1
        }
    );
    assert!(!summary.is_complete());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_version_listing_failure_skips_to_next_policy() {
    let client = FakeIamClient::new()
        .with_policy_pages(vec![vec![
            Policy::new(DENYING_ARN, "S3Lockdown", "/"),
            Policy::new(ALLOWING_ARN, "S3Reader", "/"),
        ]])
        .with_decisions(fixtures::ALLOW_S3_GET, vec![Decision::Allowed])
        .failing(Stage::ListPolicyVersions, DENYING_ARN);
    let client = managed_policy(client, ALLOWING_ARN, fixtures::ALLOW_S3_GET);

    let (summary, lines) = run(client, SearchOptions::default()).await;

    assert!(lines.contains(&format!("Arn={ALLOWING_ARN} VersionId=v1")));
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.allowed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_user_listing_failure_keeps_managed_results() {
    let client = sample_account().failing(Stage::ListUsers, "");

    let (summary, lines) = run(client, SearchOptions::default()).await;

    assert!(lines.iter().any(|l| l.starts_with("Arn=")));
    assert!(!lines.iter().any(|l| l.starts_with("(user inline policy)")));
    assert_eq!(summary.errors, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_all_versions_is_opt_in() {
    let client = FakeIamClient::new()
        .with_policy_pages(vec![vec![Policy::new(ALLOWING_ARN, "S3Reader", "/")]])
        .with_version_pages(
            ALLOWING_ARN,
            vec![vec![
                PolicyVersion::new("v2", true),
                PolicyVersion::new("v1", false),
            ]],
        )
        .with_version_document(ALLOWING_ARN, "v2", &encode(fixtures::ALLOW_S3_GET))
        .with_version_document(ALLOWING_ARN, "v1", &encode(fixtures::ALLOW_S3_BUCKET))
        .with_decisions(fixtures::ALLOW_S3_GET, vec![Decision::Allowed])
        .with_decisions(fixtures::ALLOW_S3_BUCKET, vec![Decision::Allowed]);
    let client = Arc::new(client);

    let request = request();
    let mut out = Vec::new();
    let summary = Pipeline::new(Arc::clone(&client))
        .run(&request, &mut out)
        .await
        .expect("report should be written");
    assert_eq!(summary.evaluated, 1);

    let mut out = Vec::new();
    let options = SearchOptions {
        versions: VersionSelection::All,
        ..SearchOptions::default()
    };
    let summary = Pipeline::new(client)
        .with_options(options)
        .run(&request, &mut out)
        .await
        .expect("report should be written");
    assert_eq!(summary.evaluated, 2);
    let report = String::from_utf8(out).expect("report should be UTF-8");
    assert!(report.contains("VersionId=v1"));
    assert!(report.contains("VersionId=v2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wide_channels_keep_results() {
    let options = SearchOptions {
        channel_capacity: 64,
        ..SearchOptions::default()
    };
    let (summary, _) = run(sample_account(), options).await;
    assert_eq!(summary.allowed, 2);
}

/// A report sink whose reader has gone away
struct ClosedWriter;

impl Write for ClosedWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_failure_stops_every_stage() {
    init_logging();
    let policies: Vec<Policy> = (0..50)
        .map(|i| {
            Policy::new(
                format!("arn:aws:iam::123456789012:policy/P{i}"),
                format!("P{i}"),
                "/",
            )
            .with_default_version("v1")
        })
        .collect();
    let mut client = FakeIamClient::new().with_policy_pages(vec![policies.clone()]);
    for p in &policies {
        client = client.with_version_document(&p.arn, "v1", &encode(fixtures::ALLOW_S3_GET));
    }

    let request = request();
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Pipeline::new(Arc::new(client)).run(&request, ClosedWriter),
    )
    .await
    .expect("pipeline should terminate after the report sink closes");

    match result {
        Err(FinderError::Output(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected an output error, got {other:?}"),
    }
}
