//! Marker-driven pagination shared by every IAM listing in the pipeline

use std::future::Future;

use async_stream::stream;
use futures::Stream;
use log::{trace, warn};

use crate::aws::{AwsResult, Page};

/// Turn a paginated listing call into a stream of its items.
///
/// `fetch` is called with `None` first, then with each marker the previous
/// page returned, for as long as pages report truncation. Items are yielded in
/// server order. A failed call yields its error and ends the stream; results
/// already yielded stay valid.
pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = AwsResult<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AwsResult<Page<T>>>,
{
    stream! {
        let mut marker: Option<String> = None;
        let mut page_number = 0usize;
        loop {
            page_number += 1;
            trace!("Fetching page {page_number} (marker: {marker:?})");
            let page = match fetch(marker.take()).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            let Page { items, is_truncated, marker: next } = page;
            for item in items {
                yield Ok(item);
            }

            match (is_truncated, next) {
                (true, Some(next)) => marker = Some(next),
                (true, None) => {
                    warn!("Page {page_number} is truncated but carries no marker, stopping");
                    break;
                }
                (false, _) => break,
            }
        }
    }
}
