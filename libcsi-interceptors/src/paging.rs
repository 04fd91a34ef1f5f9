//! Cursor-driven pagination as a stream.
//!
//! [`paginate`] repeatedly fetches pages from a [`PageSource`], feeding each
//! page's `next_token` into the following request, and yields the items one
//! by one.  The producer runs on its own task and hands items over through a
//! bounded channel, so consumption overlaps with fetching the next page.
//!
//! The stream:
//! - preserves the order of items within and across pages;
//! - ends after the page whose `next_token` is empty;
//! - yields at most one error, after which it ends;
//! - stops fetching when the call context is cancelled or the stream is
//!   dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::context::CallContext;
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::types::{ListVolumesRequest, Volume};

/// Items buffered between the producer task and the consumer.
pub const PAGE_BUFFER: usize = 64;

/// Position in a server-side enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Opaque token from the previous page; empty for the first page.
    pub starting_token: String,
    /// Page size hint; zero lets the server choose.
    pub max_entries: u32,
}

impl Cursor {
    #[must_use]
    pub fn new(max_entries: u32) -> Self {
        Self {
            starting_token: String::new(),
            max_entries,
        }
    }

    #[must_use]
    pub fn starting_at(mut self, token: impl Into<String>) -> Self {
        self.starting_token = token.into();
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; empty when the enumeration is complete.
    pub next_token: String,
}

/// A list-style call that can be driven page by page.
///
/// Driven to exhaustion, a source must enumerate every item exactly once.
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: Send + 'static;

    async fn fetch(
        &self,
        ctx: &CallContext,
        cursor: &Cursor,
    ) -> Result<Page<Self::Item>, CsiError>;
}

/// Pages through `ListVolumes` on any [`CsiController`], local plugin or
/// remote [`Channel`](crate::chain::Channel) alike.
pub struct ControllerVolumes<C: ?Sized> {
    controller: Arc<C>,
    template: ListVolumesRequest,
}

impl<C: CsiController + ?Sized> ControllerVolumes<C> {
    pub fn new(controller: Arc<C>) -> Self {
        Self::with_request(controller, ListVolumesRequest::default())
    }

    /// Use `template` for every page; its cursor fields are overwritten.
    pub fn with_request(controller: Arc<C>, template: ListVolumesRequest) -> Self {
        Self {
            controller,
            template,
        }
    }
}

#[async_trait]
impl<C: CsiController + ?Sized + 'static> PageSource for ControllerVolumes<C> {
    type Item = Volume;

    async fn fetch(&self, ctx: &CallContext, cursor: &Cursor) -> Result<Page<Volume>, CsiError> {
        let req = ListVolumesRequest {
            starting_token: cursor.starting_token.clone(),
            max_entries: cursor.max_entries,
            ..self.template.clone()
        };
        let rep = self.controller.list_volumes(ctx, req).await?;
        Ok(Page {
            items: rep.entries,
            next_token: rep.next_token,
        })
    }
}

/// Stream every volume of `controller`, starting at the cursor carried by
/// `req`.
pub fn page_all_volumes<C>(
    ctx: CallContext,
    controller: Arc<C>,
    req: ListVolumesRequest,
) -> PageStream<Volume>
where
    C: CsiController + ?Sized + 'static,
{
    let cursor = Cursor {
        starting_token: req.starting_token.clone(),
        max_entries: req.max_entries,
    };
    let source = ControllerVolumes::with_request(controller, req);
    paginate(ctx, Arc::new(source), cursor)
}

/// Drive `source` from `cursor` to exhaustion on a background task.
pub fn paginate<S: PageSource>(
    ctx: CallContext,
    source: Arc<S>,
    cursor: Cursor,
) -> PageStream<S::Item> {
    let (tx, rx) = mpsc::channel(PAGE_BUFFER);
    let cancel = ctx.cancellation().clone();
    let complete = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(drive(ctx, source, cursor, tx, Arc::clone(&complete)));
    PageStream {
        inner: ReceiverStream::new(rx),
        task,
        cancel,
        complete,
        done: false,
    }
}

#[instrument(skip_all, fields(request_id = ctx.request_id()))]
async fn drive<S: PageSource>(
    ctx: CallContext,
    source: Arc<S>,
    mut cursor: Cursor,
    tx: mpsc::Sender<Result<S::Item, CsiError>>,
    complete: Arc<AtomicBool>,
) {
    let cancel = ctx.cancellation().clone();
    let mut pages = 0usize;

    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            page = source.fetch(&ctx, &cursor) => page,
        };
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                debug!(pages, error = %e, "pagination stopped");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        pages += 1;

        for item in page.items {
            tokio::select! {
                biased;
                // The stream reports the cancellation itself once the
                // buffered items are drained.
                _ = cancel.cancelled() => return,
                sent = tx.send(Ok(item)) => {
                    if sent.is_err() {
                        // Receiver dropped.
                        return;
                    }
                }
            }
        }

        if page.next_token.is_empty() {
            complete.store(true, Ordering::Release);
            debug!(pages, "pagination complete");
            return;
        }
        cursor.starting_token = page.next_token;
    }
}

/// Items of a paginated enumeration, in server order.
///
/// A stream that ends without an error has yielded the whole enumeration.
/// If the context is cancelled first, the buffered items are followed by a
/// single [`CsiError::Cancelled`]; a producer that dies early (a panicking
/// source) ends it with [`CsiError::Internal`].  Dropping the stream aborts
/// the producer task.
pub struct PageStream<T> {
    inner: ReceiverStream<Result<T, CsiError>>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
    /// Set by the producer after the last page.
    complete: Arc<AtomicBool>,
    done: bool,
}

impl<T> PageStream<T> {
    /// Drain the stream, failing on the first error.
    pub async fn collect_all(mut self) -> Result<Vec<T>, CsiError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for PageStream<T> {
    type Item = Result<T, CsiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                if this.complete.load(Ordering::Acquire) {
                    Poll::Ready(None)
                } else if this.cancel.is_cancelled() {
                    Poll::Ready(Some(Err(CsiError::Cancelled)))
                } else {
                    Poll::Ready(Some(Err(CsiError::Internal(
                        "pagination ended before the last page".into(),
                    ))))
                }
            }
            other => other,
        }
    }
}

impl<T> Drop for PageStream<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Serves `items` in pages of `page_size`, using the item index as token.
    struct Fixed {
        items: Vec<u32>,
        page_size: usize,
        fetches: AtomicUsize,
        fail_at: Option<usize>,
    }

    impl Fixed {
        fn new(count: u32, page_size: usize) -> Self {
            Self {
                items: (0..count).collect(),
                page_size,
                fetches: AtomicUsize::new(0),
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl PageSource for Fixed {
        type Item = u32;

        async fn fetch(&self, _ctx: &CallContext, cursor: &Cursor) -> Result<Page<u32>, CsiError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(n) {
                return Err(CsiError::backend("listing failed"));
            }
            let start: usize = if cursor.starting_token.is_empty() {
                0
            } else {
                cursor
                    .starting_token
                    .parse()
                    .map_err(|_| CsiError::InvalidArgument(cursor.starting_token.clone()))?
            };
            let end = (start + self.page_size).min(self.items.len());
            let next_token = if end < self.items.len() {
                end.to_string()
            } else {
                String::new()
            };
            Ok(Page {
                items: self.items[start..end].to_vec(),
                next_token,
            })
        }
    }

    /// Serves three one-item pages with tokens a -> b -> c -> "".
    struct Lettered;

    #[async_trait]
    impl PageSource for Lettered {
        type Item = String;

        async fn fetch(
            &self,
            _ctx: &CallContext,
            cursor: &Cursor,
        ) -> Result<Page<String>, CsiError> {
            let (item, next) = match cursor.starting_token.as_str() {
                "" => ("item0", "a"),
                "a" => ("item1", "b"),
                "b" => ("item2", "c"),
                "c" => {
                    return Ok(Page {
                        items: vec![],
                        next_token: String::new(),
                    });
                }
                other => return Err(CsiError::InvalidArgument(other.to_owned())),
            };
            Ok(Page {
                items: vec![item.to_owned()],
                next_token: next.to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn follows_tokens_in_order() {
        let items = paginate(CallContext::new(), Arc::new(Lettered), Cursor::default())
            .collect_all()
            .await
            .unwrap();
        assert_eq!(items, vec!["item0", "item1", "item2"]);
    }

    #[tokio::test]
    async fn page_size_does_not_change_result() {
        for page_size in [1, 2, 3, 7, 50, 200] {
            let items = paginate(
                CallContext::new(),
                Arc::new(Fixed::new(50, page_size)),
                Cursor::default(),
            )
            .collect_all()
            .await
            .unwrap();
            assert_eq!(items, (0..50).collect::<Vec<_>>(), "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn starts_from_given_cursor() {
        let items = paginate(
            CallContext::new(),
            Arc::new(Fixed::new(10, 3)),
            Cursor::new(3).starting_at("6"),
        )
        .collect_all()
        .await
        .unwrap();
        assert_eq!(items, vec![6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn error_ends_stream() {
        let mut source = Fixed::new(10, 2);
        source.fail_at = Some(2);
        let source = Arc::new(source);
        let mut stream = paginate(CallContext::new(), Arc::clone(&source), Cursor::default());

        let mut items = Vec::new();
        let mut errors = Vec::new();
        while let Some(next) = stream.next().await {
            match next {
                Ok(v) => items.push(v),
                Err(e) => errors.push(e),
            }
        }
        assert_eq!(items, vec![0, 1, 2, 3]);
        assert_eq!(errors, vec![CsiError::BackendError("listing failed".into())]);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_fetching() {
        struct Slow;

        #[async_trait]
        impl PageSource for Slow {
            type Item = u32;

            async fn fetch(
                &self,
                _ctx: &CallContext,
                _cursor: &Cursor,
            ) -> Result<Page<u32>, CsiError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Page {
                    items: vec![1],
                    next_token: String::new(),
                })
            }
        }

        let ctx = CallContext::new();
        let mut stream = paginate(ctx.clone(), Arc::new(Slow), Cursor::default());
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.cancel();

        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert_eq!(next, Some(Err(CsiError::Cancelled)));
        assert_eq!(stream.next().await, None);
    }

    /// Never runs out: every page holds `PAGE_SIZE` items and points at the
    /// next one.
    struct Endless;

    impl Endless {
        const PAGE_SIZE: u32 = 200;
    }

    #[async_trait]
    impl PageSource for Endless {
        type Item = u32;

        async fn fetch(&self, _ctx: &CallContext, cursor: &Cursor) -> Result<Page<u32>, CsiError> {
            let start: u32 = cursor.starting_token.parse().unwrap_or(0);
            Ok(Page {
                items: (start..start + Self::PAGE_SIZE).collect(),
                next_token: (start + Self::PAGE_SIZE).to_string(),
            })
        }
    }

    #[tokio::test]
    async fn cancellation_with_full_buffer_is_reported() {
        let ctx = CallContext::new();
        let mut stream = paginate(ctx.clone(), Arc::new(Endless), Cursor::default());
        // Let the producer fill the buffer and block on the next send.
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        let mut items = Vec::new();
        let mut errors = Vec::new();
        while let Some(next) = stream.next().await {
            match next {
                Ok(v) => items.push(v),
                Err(e) => errors.push(e),
            }
        }
        assert_eq!(errors, vec![CsiError::Cancelled]);
        assert!(items.len() <= PAGE_BUFFER + 1, "got {} items", items.len());
        assert_eq!(items, (0..items.len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn cancelled_enumeration_is_not_collected() {
        let ctx = CallContext::new();
        let stream = paginate(ctx.clone(), Arc::new(Endless), Cursor::default());
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        assert_eq!(stream.collect_all().await, Err(CsiError::Cancelled));
    }

    #[tokio::test]
    async fn cancelling_after_the_last_page_is_not_an_error() {
        let ctx = CallContext::new();
        let mut stream = paginate(
            ctx.clone(),
            Arc::new(Fixed::new(5, 2)),
            Cursor::default(),
        );
        // Give the producer time to finish; its items stay buffered.
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        let mut items = Vec::new();
        while let Some(next) = stream.next().await {
            items.push(next.unwrap());
        }
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn panicking_source_ends_with_error() {
        struct Broken;

        #[async_trait]
        impl PageSource for Broken {
            type Item = u32;

            async fn fetch(
                &self,
                _ctx: &CallContext,
                _cursor: &Cursor,
            ) -> Result<Page<u32>, CsiError> {
                panic!("source blew up");
            }
        }

        let result = paginate(CallContext::new(), Arc::new(Broken), Cursor::default())
            .collect_all()
            .await;
        assert!(matches!(result, Err(CsiError::Internal(_))));
    }
}
