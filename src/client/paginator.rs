//! Client-side "load more" loop over cursor-paginated endpoints.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, Stream};
use std::future::Future;

use crate::pagination::Page;

type FetchFn<T, E> = Box<dyn FnMut(Option<String>) -> BoxFuture<'static, Result<Page<T>, E>> + Send>;

/// Fetches successive pages until the server runs out.
///
/// The end is reached when a page comes back empty, without a
/// `next_cursor`, or with `has_more: false`. A page shorter than
/// `page_size` only ends the walk when the server does not report
/// `has_more`; servers clamp the page size, so short pages are normal.
pub struct Paginator<T, E> {
    fetch: FetchFn<T, E>,
    page_size: usize,
    pages: Vec<Vec<T>>,
    cursor: Option<String>,
    done: bool,
}

impl<T, E> Paginator<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// `fetch` receives the cursor of the page to load (`None` for the first)
    pub fn new<F, Fut>(page_size: usize, mut fetch: F) -> Self
    where
        F: FnMut(Option<String>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Page<T>, E>> + Send + 'static,
    {
        Self {
            fetch: Box::new(move |cursor| fetch(cursor).boxed()),
            page_size: page_size.max(1),
            pages: Vec::new(),
            cursor: None,
            done: false,
        }
    }

    /// Load the next page. `None` once the end was reached.
    pub async fn next_page(&mut self) -> Option<Result<&[T], E>> {
        if self.done {
            return None;
        }

        let page = match (self.fetch)(self.cursor.take()).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let exhausted = match page.has_more {
            Some(has_more) => !has_more,
            None => page.items.len() < self.page_size,
        };
        self.done = exhausted || page.items.is_empty() || page.next_cursor.is_none();
        self.cursor = page.next_cursor;
        self.pages.push(page.items);
        self.pages.last().map(|items| Ok(items.as_slice()))
    }

    /// Every item loaded so far, in page order
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    /// The first page was loaded and had nothing in it
    pub fn is_empty(&self) -> bool {
        self.pages.first().map_or(false, |first| first.is_empty())
    }

    pub fn is_reaching_end(&self) -> bool {
        self.is_empty() || self.done
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages.len()
    }

    /// Load everything that is left and return all items
    pub async fn collect_all(mut self) -> Result<Vec<T>, E> {
        while let Some(page) = self.next_page().await {
            page?;
        }
        Ok(self.pages.into_iter().flatten().collect())
    }

    /// Pages as a stream; ends after the last page or the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>, E>> {
        stream::unfold(self, |mut paginator| async move {
            let loaded: Result<(), E> = paginator.next_page().await?.map(|_| ());
            let page = loaded.map(|()| paginator.pages.pop().unwrap_or_default());
            Some((page, paginator))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Serves `total` numbers, at most `server_max` per page whatever the
    /// requested size, the way the API clamps `limit`
    fn capped_numbers(total: usize, page_size: usize, server_max: usize) -> Paginator<usize, String> {
        Paginator::new(page_size, move |cursor: Option<String>| async move {
            let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (start + page_size.min(server_max)).min(total);
            let items: Vec<usize> = (start..end).collect();
            let next_cursor = (end < total).then(|| end.to_string());
            Ok(Page {
                has_more: Some(next_cursor.is_some()),
                items,
                next_cursor,
            })
        })
    }

    fn numbers(total: usize, page_size: usize) -> Paginator<usize, String> {
        capped_numbers(total, page_size, usize::MAX)
    }

    #[tokio::test]
    async fn walks_every_page_once() {
        let all = numbers(7, 3).collect_all().await.unwrap();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn tracks_end_and_emptiness() {
        let mut p = numbers(4, 2);
        assert!(!p.is_reaching_end());
        p.next_page().await.unwrap().unwrap();
        assert!(!p.is_reaching_end());
        p.next_page().await.unwrap().unwrap();
        assert!(p.is_reaching_end());
        assert!(p.next_page().await.is_none());
        assert_eq!(p.items().count(), 4);
        assert!(!p.is_empty());

        let mut empty = numbers(0, 5);
        assert_eq!(empty.next_page().await.unwrap().unwrap().len(), 0);
        assert!(empty.is_empty());
        assert!(empty.is_reaching_end());
    }

    #[tokio::test]
    async fn clamped_pages_keep_going_while_server_has_more() {
        let all = capped_numbers(7, 5, 3).collect_all().await.unwrap();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn short_page_ends_only_without_has_more() {
        let mut legacy: Paginator<u8, String> = Paginator::new(10, |_| async {
            Ok(Page {
                items: vec![1, 2],
                next_cursor: Some("more".into()),
                has_more: None,
            })
        });
        legacy.next_page().await.unwrap().unwrap();
        assert!(legacy.is_reaching_end());
        assert_eq!(legacy.pages_loaded(), 1);

        let mut finished: Paginator<u8, String> = Paginator::new(1, |_| async {
            Ok(Page {
                items: vec![1],
                next_cursor: Some("stale".into()),
                has_more: Some(false),
            })
        });
        finished.next_page().await.unwrap().unwrap();
        assert!(finished.is_reaching_end());
    }

    #[tokio::test]
    async fn stream_yields_pages_then_stops_on_error() {
        let pages: Vec<_> = numbers(5, 2).into_stream().collect().await;
        let sizes: Vec<usize> = pages.into_iter().map(|p| p.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let failing: Paginator<u8, String> = Paginator::new(2, |_| async { Err("boom".to_string()) });
        let results: Vec<_> = failing.into_stream().collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
