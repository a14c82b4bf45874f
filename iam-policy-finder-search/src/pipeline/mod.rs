//! The search pipeline: six producer stages feeding one reporter.
//!
//! ```text
//! policies -> versions -> version documents --\
//!                                              >-- reporter
//! users ----> inline names -> user documents -/
//! ```
//!
//! Every stage runs as its own tokio task. Stages are connected by bounded
//! channels, so a producer waits whenever its consumer falls behind. The two
//! document fetchers share one sender into the reporter's input, which closes
//! once both of them have finished.

mod reporter;
mod stages;

use std::io::Write;
use std::sync::Arc;

use log::{debug, error};
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;

use crate::aws::IamApi;
use crate::error::FinderResult;
use crate::types::{PolicyInfo, SearchOptions, SearchRequest, SearchSummary};

pub use reporter::Reporter;
pub use stages::{
    enumerate_policies, enumerate_users, fetch_policy_documents, fetch_user_policy_documents,
    resolve_policy_versions, resolve_user_policies,
};

/// Wiring for one search run over a shared IAM client
pub struct Pipeline<C: ?Sized> {
    client: Arc<C>,
    options: SearchOptions,
}

impl<C> Pipeline<C>
where
    C: IamApi + ?Sized + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    fn channel<T>(&self) -> (mpsc::Sender<T>, Receiver<T>) {
        mpsc::channel(self.options.channel_capacity.max(1))
    }

    /// Spawn every producer stage and return the merged document stream.
    ///
    /// The returned handles complete once their stage has closed its output.
    pub fn spawn_sources(&self) -> (Receiver<FinderResult<PolicyInfo>>, Vec<JoinHandle<()>>) {
        let SearchOptions {
            scope,
            versions,
            on_error,
            ..
        } = self.options;

        let (policies_tx, policies_rx) = self.channel();
        let (versions_tx, versions_rx) = self.channel();
        let (users_tx, users_rx) = self.channel();
        let (inline_tx, inline_rx) = self.channel();
        let (documents_tx, documents_rx) = self.channel();

        let client = &self.client;
        let handles = vec![
            tokio::spawn(enumerate_policies(Arc::clone(client), scope, policies_tx)),
            tokio::spawn(resolve_policy_versions(
                Arc::clone(client),
                versions,
                on_error,
                policies_rx,
                versions_tx,
            )),
            tokio::spawn(fetch_policy_documents(
                Arc::clone(client),
                on_error,
                versions_rx,
                documents_tx.clone(),
            )),
            tokio::spawn(enumerate_users(Arc::clone(client), users_tx)),
            tokio::spawn(resolve_user_policies(
                Arc::clone(client),
                on_error,
                users_rx,
                inline_tx,
            )),
            tokio::spawn(fetch_user_policy_documents(
                Arc::clone(client),
                on_error,
                inline_rx,
                documents_tx,
            )),
        ];
        debug!("Spawned {} pipeline stages", handles.len());

        (documents_rx, handles)
    }

    /// Run the whole search, writing the report to `out`.
    ///
    /// Returns once every stage has finished.
    pub async fn run<W: Write>(
        &self,
        request: &SearchRequest,
        out: W,
    ) -> FinderResult<SearchSummary> {
        let (documents, handles) = self.spawn_sources();
        let result = Reporter::new(Arc::clone(&self.client), request, out)
            .run(documents)
            .await;

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Pipeline stage did not complete: {e}");
            }
        }
        result
    }
}
