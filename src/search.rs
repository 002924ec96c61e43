//! Document-wide text search and the background coordinator that keeps only
//! the newest query's results.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::pdf::{PdfBackend, PdfSession, Rect};

/// Matches on one page: the first bounding rectangle of every match, in
/// rendered page-pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMatches {
    pub page: u32,
    pub rects: Vec<Rect>,
}

/// Search every page for `query`.
///
/// Every page gets an entry, possibly empty. Returns `None` when
/// `is_cancelled` reports true at a page boundary.
pub fn search_document(
    session: &dyn PdfSession,
    query: &str,
    scale: f32,
    case_sensitive: bool,
    is_cancelled: &dyn Fn() -> bool,
) -> Option<Vec<PageMatches>> {
    if query.is_empty() {
        return Some(Vec::new());
    }

    let page_count = session.page_count();
    let mut results = Vec::with_capacity(page_count as usize);

    for page in 0..page_count {
        if is_cancelled() {
            return None;
        }

        let rects = match session.search_page(page, query, case_sensitive) {
            Ok(matches) => matches
                .iter()
                .filter_map(|m| m.bounds.first())
                .map(|rect| rect.scale(scale, scale))
                .collect(),
            Err(e) => {
                warn!(page, error = %e, "search failed on page");
                Vec::new()
            }
        };

        results.push(PageMatches { page, rects });
    }

    Some(results)
}

/// The result set the UI shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchSnapshot {
    pub generation: u64,
    pub query: String,
    pub pages: Vec<PageMatches>,
}

impl SearchSnapshot {
    pub fn for_page(&self, page: u32) -> Option<&PageMatches> {
        self.pages.iter().find(|p| p.page == page)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.rects.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Published,
    /// A newer query, clear or document change arrived first
    Superseded,
    /// The document could not be opened; an empty result was published
    Failed,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub scale: f32,
    pub case_sensitive: bool,
}

struct Inner {
    generation: AtomicU64,
    results: watch::Sender<SearchSnapshot>,
}

/// Runs searches in the background. Each request supersedes the previous
/// one: a stale search stops at the next page and never publishes.
#[derive(Clone)]
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl Default for SearchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchCoordinator {
    pub fn new() -> Self {
        let (results, _) = watch::channel(SearchSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                results,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.inner.results.subscribe()
    }

    pub fn latest(&self) -> SearchSnapshot {
        self.inner.results.borrow().clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidate running searches and claim a new generation. The bump
    /// happens under the channel lock so it orders against `publish`.
    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.inner.results.send_if_modified(|_| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        generation
    }

    fn publish(&self, generation: u64, query: String, pages: Vec<PageMatches>) -> bool {
        self.inner.results.send_if_modified(|snapshot| {
            if !self.is_current(generation) {
                return false;
            }
            *snapshot = SearchSnapshot {
                generation,
                query,
                pages,
            };
            true
        })
    }

    /// Cancel running searches and publish an empty result set.
    pub fn clear(&self) {
        self.inner.results.send_modify(|snapshot| {
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *snapshot = SearchSnapshot {
                generation,
                ..SearchSnapshot::default()
            };
        });
    }

    /// Search `bytes` on a background thread.
    pub fn spawn<B>(
        &self,
        backend: Arc<B>,
        bytes: Arc<[u8]>,
        request: SearchRequest,
    ) -> JoinHandle<SearchOutcome>
    where
        B: PdfBackend + 'static,
    {
        let generation = self.begin();
        let coordinator = self.clone();
        std::thread::spawn(move || coordinator.run(generation, backend.as_ref(), &bytes, request))
    }

    fn run<B: PdfBackend>(
        &self,
        generation: u64,
        backend: &B,
        bytes: &[u8],
        request: SearchRequest,
    ) -> SearchOutcome {
        let cancelled = || !self.is_current(generation);
        let searched = backend.with_session(bytes, |session| {
            search_document(
                session,
                &request.query,
                request.scale,
                request.case_sensitive,
                &cancelled,
            )
        });

        match searched {
            Ok(Some(pages)) => {
                debug!(generation, query = %request.query, "search finished");
                if self.publish(generation, request.query, pages) {
                    SearchOutcome::Published
                } else {
                    SearchOutcome::Superseded
                }
            }
            Ok(None) => SearchOutcome::Superseded,
            Err(e) => {
                warn!(error = %e, "search could not open document");
                if self.publish(generation, request.query, Vec::new()) {
                    SearchOutcome::Failed
                } else {
                    SearchOutcome::Superseded
                }
            }
        }
    }
}
