//! Evaluator/reporter: the sink of the search pipeline.
//!
//! Simulates every incoming policy document against the requested action and
//! resource, and streams a report line for each one that allows it. For managed
//! policies the report continues with every principal the policy is attached to.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use log::{debug, error, trace, warn};
use tokio::sync::mpsc::Receiver;

use crate::aws::IamApi;
use crate::error::{FinderError, FinderResult, Stage};
use crate::pagination::paginate;
use crate::types::{Decision, PolicyInfo, SearchRequest, SearchSummary};

pub struct Reporter<'a, C: ?Sized, W> {
    client: Arc<C>,
    request: &'a SearchRequest,
    out: W,
    summary: SearchSummary,
}

impl<'a, C, W> Reporter<'a, C, W>
where
    C: IamApi + ?Sized,
    W: Write,
{
    pub fn new(client: Arc<C>, request: &'a SearchRequest, out: W) -> Self {
        Self {
            client,
            request,
            out,
            summary: SearchSummary::default(),
        }
    }

    /// Consume the merged document stream until every producer has closed it.
    ///
    /// Upstream errors are logged and counted; only failing to write the report
    /// ends the run early.
    pub async fn run(
        mut self,
        mut input: Receiver<FinderResult<PolicyInfo>>,
    ) -> FinderResult<SearchSummary> {
        writeln!(
            self.out,
            "The action {} on the resource {} is allowed by the following policies:",
            self.request.action, self.request.resource
        )?;

        while let Some(item) = input.recv().await {
            match item {
                Ok(info) => self.evaluate(&info).await?,
                Err(e) => {
                    error!("{e}");
                    self.summary.errors += 1;
                }
            }
        }

        self.out.flush()?;
        debug!("Search finished: {:?}", self.summary);
        Ok(self.summary)
    }

    async fn simulate(&self, document: &str) -> FinderResult<Decision> {
        let decisions = self
            .client
            .simulate_custom_policy(&self.request.action, &self.request.resource, document)
            .await?;
        // one action and one resource per call, so exactly one result is expected
        decisions
            .first()
            .copied()
            .ok_or(FinderError::EmptySimulationResult)
    }

    async fn evaluate(&mut self, info: &PolicyInfo) -> FinderResult<()> {
        self.summary.evaluated += 1;

        // A failed simulation is still reported, with its error attached.
        let failure = match self.simulate(info.document()).await {
            Ok(Decision::Allowed) => None,
            Ok(decision) => {
                trace!("{info:?} -> {decision:?}");
                return Ok(());
            }
            Err(e) => {
                warn!("Simulation failed for {info:?}: {e}");
                self.summary.errors += 1;
                Some(e)
            }
        };
        self.summary.allowed += 1;

        match info {
            PolicyInfo::Inline {
                user_name,
                policy_name,
                ..
            } => {
                write!(
                    self.out,
                    "(user inline policy) UserName={user_name} PolicyName={policy_name}"
                )?;
                self.finish_line(failure.as_ref())?;
            }
            PolicyInfo::Managed {
                arn, version_id, ..
            } => {
                write!(self.out, "Arn={arn} VersionId={version_id}")?;
                self.finish_line(failure.as_ref())?;
                self.report_attachments(arn).await?;
            }
        }
        Ok(())
    }

    fn finish_line(&mut self, failure: Option<&FinderError>) -> FinderResult<()> {
        if let Some(e) = failure {
            write!(self.out, " error={e}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    async fn report_attachments(&mut self, policy_arn: &str) -> FinderResult<()> {
        let client = Arc::clone(&self.client);
        let targets = paginate(|marker| client.list_entities_for_policy(policy_arn, marker));
        tokio::pin!(targets);

        while let Some(target) = targets.next().await {
            match target {
                Ok(target) => writeln!(
                    self.out,
                    "\tis attached to {}: Name={} Id={}",
                    target.kind, target.name, target.id
                )?,
                Err(e) => {
                    error!(
                        "{}",
                        FinderError::stage(Stage::ListEntitiesForPolicy, policy_arn, e)
                    );
                    self.summary.errors += 1;
                }
            }
        }
        Ok(())
    }
}
