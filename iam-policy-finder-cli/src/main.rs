use std::io;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use iam_policy_finder_search::{
    AwsOptions, ErrorPolicy, PolicyFinderService, PolicyScope, SearchOptions, SearchRequest,
    VersionSelection, DEFAULT_CHANNEL_CAPACITY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Find the policies that allow an action on a resource
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scope {
    /// Customer-managed policies
    Local,
    /// AWS-managed policies
    Aws,
    /// Customer- and AWS-managed policies
    All,
}

impl From<Scope> for PolicyScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Local => PolicyScope::Local,
            Scope::Aws => PolicyScope::Aws,
            Scope::All => PolicyScope::All,
        }
    }
}

/// Find the IAM identity policies in an account that allow an action on a
/// resource, and what each of them is attached to.
#[derive(Debug, Parser)]
#[command(name = "iam-policy-finder", version, about)]
struct Cli {
    /// Action to check, e.g. s3:GetObject
    action: String,

    /// Resource ARN to check, e.g. arn:aws:s3:::bucket/key
    resource: String,

    /// Search mode
    #[arg(long, value_enum, default_value_t = Mode::Resource)]
    mode: Mode,

    /// Which managed policies to evaluate
    #[arg(long, value_enum, default_value_t = Scope::Local)]
    scope: Scope,

    /// Evaluate every stored version of each managed policy, not only the default one
    #[arg(long)]
    all_versions: bool,

    /// Stop a pipeline stage at its first error instead of skipping the failed item
    #[arg(long)]
    fail_fast: bool,

    /// Capacity of the channels between pipeline stages
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY, value_parser = parse_capacity)]
    channel_capacity: usize,

    /// AWS profile to use
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// AWS region to use
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            scope: self.scope.into(),
            versions: if self.all_versions {
                VersionSelection::All
            } else {
                VersionSelection::DefaultOnly
            },
            on_error: if self.fail_fast {
                ErrorPolicy::Halt
            } else {
                ErrorPolicy::Skip
            },
            channel_capacity: self.channel_capacity,
        }
    }
}

fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(e.to_string()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.mode {
        Mode::Resource => search_resource(&cli).await,
    }
}

async fn search_resource(cli: &Cli) -> Result<()> {
    let aws = AwsOptions {
        profile: cli.profile.clone(),
        region: cli.region.clone(),
    };
    let service = PolicyFinderService::new(&aws)
        .await
        .context("Failed to initialize service")?;

    let request = SearchRequest::new(cli.action.clone(), cli.resource.clone());
    let summary = service
        .search(&request, cli.search_options(), io::stdout().lock())
        .await
        .context("Failed to search policies")?;

    if summary.is_complete() {
        info!(
            "Evaluated {} policies, {} allow the action",
            summary.evaluated, summary.allowed
        );
    } else {
        warn!(
            "Results may be partial: {} errors while evaluating {} policies",
            summary.errors, summary.evaluated
        );
    }
    Ok(())
}
