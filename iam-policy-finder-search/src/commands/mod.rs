//! Commands module - service layer for IAM Policy Finder operations

mod search;
pub(crate) mod service;

pub use service::{AwsOptions, PolicyFinderService};
