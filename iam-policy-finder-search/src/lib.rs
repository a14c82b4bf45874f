//! This crate provides the core business logic for IAM Policy Finder:
//! - Concurrent discovery of customer-managed and user inline policies
//! - Transport decoding of policy documents
//! - Policy simulation against one action and resource
//! - Reporting of allowing policies and what they are attached to
//!

mod aws;
pub mod commands;
mod decode;
mod error;
mod pagination;
pub mod pipeline;
#[cfg(any(test, feature = "integ-test"))]
pub mod testing;
mod types;

// Re-exports for a small, focused public API
pub use aws::{AwsError, AwsIamClient, AwsResult, IamApi, Page};
pub use commands::{AwsOptions, PolicyFinderService};
pub use decode::{decode_document, DecodeError};
pub use error::{FinderError, FinderResult, Stage};
pub use pagination::paginate;
pub use pipeline::Pipeline;
pub use types::{
    AttachmentKind, AttachmentTarget, Decision, ErrorPolicy, InlineTask, Policy, PolicyInfo,
    PolicyScope, PolicyVersion, SearchOptions, SearchRequest, SearchSummary, User,
    VersionSelection, VersionTask, DEFAULT_CHANNEL_CAPACITY,
};
