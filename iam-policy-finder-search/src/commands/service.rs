//! IAM Policy Finder Service Layer
//!
//! This module provides the main service interface. The service holds the AWS
//! IAM client and exposes the high-level search operation used by the CLI.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::Client as IamClient;
use log::debug;

use crate::aws::AwsIamClient;
use crate::error::FinderResult;

/// Overrides for the AWS configuration the service loads
#[derive(Debug, Clone, Default)]
pub struct AwsOptions {
    /// Named profile from the shared config files
    pub profile: Option<String>,
    /// Region to send IAM requests to
    pub region: Option<String>,
}

/// Main service struct that holds the IAM client and runs searches
pub struct PolicyFinderService {
    pub(crate) iam_client: Arc<AwsIamClient>,
}

impl PolicyFinderService {
    /// Create a new service instance with an AWS IAM client
    ///
    /// The configuration is loaded using the default credential provider chain,
    /// with `options` applied on top.
    pub async fn new(options: &AwsOptions) -> FinderResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &options.profile {
            debug!("Using AWS profile '{profile}'");
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &options.region {
            debug!("Using AWS region '{region}'");
            loader = loader.region(Region::new(region.clone()));
        }
        let config = loader.load().await;

        Ok(Self::from_client(IamClient::new(&config)))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: IamClient) -> Self {
        Self {
            iam_client: Arc::new(AwsIamClient::new(client)),
        }
    }

    // search() implementation is in search.rs
}
