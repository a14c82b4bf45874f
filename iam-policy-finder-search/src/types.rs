//! Domain types flowing through the search pipeline

use std::fmt;

/// Which managed policies the policy enumerator lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyScope {
    /// Customer-managed policies only
    #[default]
    Local,
    /// AWS-managed policies only
    Aws,
    /// Both customer- and AWS-managed policies
    All,
}

/// Which versions of a managed policy get evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelection {
    /// Only the default version, which is the one in effect
    #[default]
    DefaultOnly,
    /// Every stored version, including inactive ones
    All,
}

/// What a stage does after one of its own remote calls or decodes fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report the failure and move on to the next input item
    #[default]
    Skip,
    /// Report the failure and close the stage
    Halt,
}

/// Default capacity of every channel between stages. One slot keeps producers
/// at most one item ahead of their consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Options that shape one search run
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub scope: PolicyScope,
    pub versions: VersionSelection,
    pub on_error: ErrorPolicy,
    pub channel_capacity: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            scope: PolicyScope::default(),
            versions: VersionSelection::default(),
            on_error: ErrorPolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// The action and resource being searched for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub action: String,
    pub resource: String,
}

impl SearchRequest {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
        }
    }
}

/// Counters collected by the reporter over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchSummary {
    /// Policy documents that reached simulation
    pub evaluated: usize,
    /// Documents reported as allowing the action, including simulation failures
    pub allowed: usize,
    /// Errors reported by any stage
    pub errors: usize,
}

impl SearchSummary {
    /// True when no stage reported an error, i.e. the results are not partial
    pub fn is_complete(&self) -> bool {
        self.errors == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub arn: String,
    pub name: String,
    pub path: String,
    /// Known from the listing; lets the default-only resolver skip listing versions
    pub default_version_id: Option<String>,
}

impl Policy {
    pub fn new(arn: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            name: name.into(),
            path: path.into(),
            default_version_id: None,
        }
    }

    pub fn with_default_version(mut self, version_id: impl Into<String>) -> Self {
        self.default_version_id = Some(version_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVersion {
    pub version_id: String,
    pub is_default: bool,
}

impl PolicyVersion {
    pub fn new(version_id: impl Into<String>, is_default: bool) -> Self {
        Self {
            version_id: version_id.into(),
            is_default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub id: String,
    pub arn: String,
}

impl User {
    pub fn new(name: impl Into<String>, id: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            arn: arn.into(),
        }
    }
}

/// A managed policy version waiting for its document to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTask {
    pub policy: Policy,
    pub version: PolicyVersion,
}

/// A user inline policy waiting for its document to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTask {
    pub user: User,
    pub policy_name: String,
}

/// A decoded policy document ready for evaluation.
///
/// Managed policies are addressed by ARN and version; inline policies only by
/// the owning user and their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyInfo {
    Managed {
        arn: String,
        name: String,
        path: String,
        version_id: String,
        document: String,
    },
    Inline {
        user_name: String,
        policy_name: String,
        document: String,
    },
}

impl PolicyInfo {
    pub fn document(&self) -> &str {
        match self {
            PolicyInfo::Managed { document, .. } | PolicyInfo::Inline { document, .. } => document,
        }
    }

    pub fn arn(&self) -> Option<&str> {
        match self {
            PolicyInfo::Managed { arn, .. } => Some(arn),
            PolicyInfo::Inline { .. } => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, PolicyInfo::Managed { .. })
    }
}

/// Outcome of simulating one action on one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    ImplicitDeny,
    ExplicitDeny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Group,
    Role,
    User,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            AttachmentKind::Group => "group",
            AttachmentKind::Role => "role",
            AttachmentKind::User => "user",
        };
        f.write_str(kind)
    }
}

/// A principal a managed policy is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTarget {
    pub kind: AttachmentKind,
    pub name: String,
    pub id: String,
}

impl AttachmentTarget {
    pub fn group(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(AttachmentKind::Group, name, id)
    }

    pub fn role(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(AttachmentKind::Role, name, id)
    }

    pub fn user(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(AttachmentKind::User, name, id)
    }

    fn new(kind: AttachmentKind, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            id: id.into(),
        }
    }
}
