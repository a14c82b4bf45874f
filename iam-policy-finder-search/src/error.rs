//! Error types for IAM Policy Finder

use std::fmt;

use thiserror::Error;

use crate::aws::AwsError;
use crate::decode::DecodeError;

/// The remote operation a pipeline stage was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ListPolicies,
    ListPolicyVersions,
    GetPolicyVersion,
    ListUsers,
    ListUserPolicies,
    GetUserPolicy,
    SimulateCustomPolicy,
    ListEntitiesForPolicy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Stage::ListPolicies => "listing policies",
            Stage::ListPolicyVersions => "listing policy versions",
            Stage::GetPolicyVersion => "getting policy version",
            Stage::ListUsers => "listing users",
            Stage::ListUserPolicies => "listing user policies",
            Stage::GetUserPolicy => "getting user policy",
            Stage::SimulateCustomPolicy => "simulating custom policy",
            Stage::ListEntitiesForPolicy => "listing entities for policy",
        };
        f.write_str(what)
    }
}

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("error {stage} for {subject}: {source}")]
    Stage {
        stage: Stage,
        subject: String,
        #[source]
        source: AwsError,
    },

    #[error("{subject} error=unable to decode policy document: {source}")]
    Decode {
        subject: String,
        #[source]
        source: DecodeError,
    },

    #[error("policy simulation returned no evaluation results")]
    EmptySimulationResult,

    #[error("failed to write report: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Aws(#[from] AwsError),
}

impl FinderError {
    pub(crate) fn stage(stage: Stage, subject: impl Into<String>, source: AwsError) -> Self {
        Self::Stage {
            stage,
            subject: subject.into(),
            source,
        }
    }

    pub(crate) fn decode(subject: impl Into<String>, source: DecodeError) -> Self {
        Self::Decode {
            subject: subject.into(),
            source,
        }
    }
}

pub type FinderResult<T> = Result<T, FinderError>;
