//! Search logic for the IAM Policy Finder service

use std::io::Write;

use log::info;

use crate::error::FinderResult;
use crate::pipeline::Pipeline;
use crate::types::{SearchOptions, SearchRequest, SearchSummary};

impl super::service::PolicyFinderService {
    /// Find every identity policy in the account that allows `request`.
    ///
    /// Customer-managed policies (per `options.scope`) and user inline policies
    /// are evaluated; the report is streamed to `out` as results arrive.
    pub async fn search<W: Write>(
        &self,
        request: &SearchRequest,
        options: SearchOptions,
        out: W,
    ) -> FinderResult<SearchSummary> {
        info!(
            "Searching for policies allowing {} on {}",
            request.action, request.resource
        );
        Pipeline::new(self.iam_client.clone())
            .with_options(options)
            .run(request, out)
            .await
    }
}
