//! Pagination support shared by the YouTube list endpoints.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = eyre::Result<(F, (VecDeque<T>, Option<String>))>> + 'a + Send>>;

/// A stream over the items of a paginated YouTube list endpoint.
///
/// Pages are fetched lazily: the next page is only requested once every item of the current page
/// has been yielded, so a consumer that stops early (e.g., with `take`) never pays for pages it
/// doesn't look at.
pub struct PagedStream<'a, T, F> {
    current_items: VecDeque<T>,
    pending_request: Option<OneFuturePage<'a, F, T>>,
    is_done: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Create a stream that starts by fetching the first page (`fetcher(None)`).
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
    {
        let first_page = async move {
            let results = fetcher(None).await?;
            Ok((fetcher, results))
        };
        Self {
            pending_request: Some(Box::pin(first_page)),
            current_items: VecDeque::new(),
            is_done: false,
        }
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                    self.current_items.extend(items);

                    if let Some(next_token) = next_token {
                        // set up, but don't poll, the request for the next page
                        self.pending_request = Some(Box::pin(async move {
                            let results = fetcher(Some(next_token)).await?;
                            Ok((fetcher, results))
                        }));
                    } else {
                        self.is_done = true;
                        self.pending_request = None;
                    }
                }
                Poll::Ready(Err(e)) => {
                    self.pending_request = None;
                    self.is_done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_paged_stream_walks_all_pages() {
        let requested = Mutex::new(Vec::new());
        let stream = PagedStream::new(|token: Option<String>| {
            requested.lock().unwrap().push(token.clone());
            async move {
                Ok(match token.as_deref() {
                    None => (VecDeque::from([1, 2]), Some("second".to_string())),
                    Some("second") => (VecDeque::from([3]), None),
                    Some(other) => panic!("unexpected page token {other}"),
                })
            }
        });
        let items: Vec<u32> = stream.map(|item| item.unwrap()).collect().await;

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(
            *requested.lock().unwrap(),
            vec![None, Some("second".to_string())]
        );
    }

    #[tokio::test]
    async fn test_paged_stream_does_not_fetch_unneeded_pages() {
        let requested = Mutex::new(0);
        let stream = PagedStream::new(|_token: Option<String>| {
            *requested.lock().unwrap() += 1;
            async move { Ok((VecDeque::from([1, 2, 3]), Some("more".to_string()))) }
        });
        let items: Vec<u32> = stream.take(2).map(|item| item.unwrap()).collect().await;

        assert_eq!(items, vec![1, 2]);
        assert_eq!(*requested.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_paged_stream_surfaces_errors_once() {
        let stream = PagedStream::new(|_token: Option<String>| async move {
            Err::<(VecDeque<u32>, Option<String>), _>(eyre::eyre!("quota exceeded"))
        });
        let items: Vec<eyre::Result<u32>> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap_err().to_string(), "quota exceeded");
    }
}
