//! Screen state: the open document, its rendered pages, the search query and
//! the results the overlay draws.

use image::ImageFormat;
use serde::{Serialize, Serializer};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::document::{DocumentHandle, DocumentPicker};
use crate::overlay::{self, Highlight, HighlightStyle};
use crate::pdf::{PageSize, PdfBackend, PdfError, Rect};
use crate::rasterizer::{self, RenderedDocument, RenderedPage};
use crate::search::{SearchCoordinator, SearchOutcome, SearchRequest, SearchSnapshot};
use crate::settings::Settings;

/// What the UI shows for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    /// Match rectangles in page pixels
    pub matches: Vec<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchField {
    pub text: String,
    /// The trailing clear icon is shown only for a non-empty query
    pub show_clear: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Screen {
    /// Nothing open yet: a single "Choose PDF" action
    ChooseFile,
    Document {
        pages: Vec<PageView>,
        /// `None` when text search is unavailable
        search_field: Option<SearchField>,
    },
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Viewer state is unavailable")]
    Unavailable,
}

impl Serialize for ViewerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Renders a document without access to the viewer. Handed out by
/// [`Viewer::begin_open`].
pub struct DocumentLoader<B> {
    backend: Arc<B>,
    scale: f32,
    ticket: u64,
}

impl<B: PdfBackend> DocumentLoader<B> {
    pub fn load(self, handle: DocumentHandle) -> LoadedDocument {
        LoadedDocument {
            ticket: self.ticket,
            document: rasterizer::render_document(self.backend.as_ref(), handle, self.scale),
        }
    }
}

/// A rendered document waiting for [`Viewer::install`].
pub struct LoadedDocument {
    ticket: u64,
    document: RenderedDocument,
}

pub struct Viewer<B: PdfBackend + 'static> {
    backend: Arc<B>,
    settings: Settings,
    document: Option<RenderedDocument>,
    /// Bumped by every `begin_open`; only the newest load is installed
    opening: u64,
    query: String,
    search: SearchCoordinator,
}

impl<B: PdfBackend + 'static> Viewer<B> {
    pub fn new(backend: B, settings: Settings) -> Self {
        Self {
            backend: Arc::new(backend),
            settings,
            document: None,
            opening: 0,
            query: String::new(),
            search: SearchCoordinator::new(),
        }
    }

    pub fn search_available(&self) -> bool {
        self.settings.search_enabled && self.backend.supports_text_search()
    }

    /// Drop the open document, its query and results, and hand out a loader
    /// for the next one. Rendering happens in the loader so callers can do
    /// it without holding the viewer.
    pub fn begin_open(&mut self) -> DocumentLoader<B> {
        self.document = None;
        self.query.clear();
        self.search.clear();
        self.opening += 1;

        DocumentLoader {
            backend: self.backend.clone(),
            scale: self.settings.render_scale,
            ticket: self.opening,
        }
    }

    /// Show a loaded document. Returns false if another open started after
    /// this one; the stale document is dropped.
    pub fn install(&mut self, loaded: LoadedDocument) -> bool {
        if loaded.ticket != self.opening {
            debug!(
                path = %loaded.document.handle.path().display(),
                "dropping superseded document"
            );
            return false;
        }
        info!(
            path = %loaded.document.handle.path().display(),
            pages = loaded.document.pages.len(),
            "opened document"
        );
        self.document = Some(loaded.document);

        // A query typed while the document was loading.
        if !self.query.is_empty() {
            let query = self.query.clone();
            let _ = self.set_query(&query);
        }
        true
    }

    pub fn handle(&self) -> Option<&DocumentHandle> {
        self.document.as_ref().map(|d| &d.handle)
    }

    pub fn pages(&self) -> &[RenderedPage] {
        self.document.as_ref().map(|d| d.pages.as_slice()).unwrap_or(&[])
    }

    pub fn page(&self, index: u32) -> Option<&RenderedPage> {
        self.pages().get(index as usize)
    }

    /// A rendered page encoded as PNG.
    pub fn page_png(&self, index: u32) -> Result<Vec<u8>, PdfError> {
        let document = self.document.as_ref().ok_or(PdfError::NoDocument)?;
        let page = document
            .pages
            .get(index as usize)
            .ok_or(PdfError::InvalidPage(index))?;

        let mut png = Vec::new();
        page.image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PdfError::ImageError(e.to_string()))?;
        Ok(png)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Store the query and search for it in the background. An empty query
    /// clears the results instead.
    pub fn set_query(&mut self, text: &str) -> Option<JoinHandle<SearchOutcome>> {
        self.query = text.to_string();

        if text.is_empty() {
            self.search.clear();
            return None;
        }
        if !self.search_available() {
            return None;
        }

        let document = self.document.as_ref()?;
        Some(self.search.spawn(
            self.backend.clone(),
            document.bytes.clone(),
            SearchRequest {
                query: text.to_string(),
                scale: self.settings.render_scale,
                case_sensitive: self.settings.case_sensitive,
            },
        ))
    }

    /// The clear icon: empty query, no results.
    pub fn clear_query(&mut self) {
        self.query.clear();
        self.search.clear();
    }

    pub fn results(&self) -> SearchSnapshot {
        self.search.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.search.subscribe()
    }

    pub fn screen(&self) -> Screen {
        let Some(document) = &self.document else {
            return Screen::ChooseFile;
        };

        let results = self.results();
        let pages = document
            .pages
            .iter()
            .map(|page| PageView {
                index: page.index,
                width: page.image.width(),
                height: page.image.height(),
                matches: results
                    .for_page(page.index)
                    .map(|m| m.rects.clone())
                    .unwrap_or_default(),
            })
            .collect();

        let search_field = self.search_available().then(|| SearchField {
            text: self.query.clone(),
            show_clear: !self.query.is_empty(),
        });

        Screen::Document {
            pages,
            search_field,
        }
    }

    /// Highlights for one page drawn at `display` size.
    pub fn highlights(&self, page_index: u32, display: PageSize) -> Vec<Highlight> {
        let Some(page) = self.page(page_index) else {
            return Vec::new();
        };
        let results = self.results();
        let Some(matches) = results.for_page(page_index) else {
            return Vec::new();
        };

        overlay::highlights_for(
            &matches.rects,
            page.size(),
            display,
            HighlightStyle::from_settings(&self.settings),
        )
    }
}

pub fn lock<B: PdfBackend + 'static>(
    shared: &Mutex<Viewer<B>>,
) -> Result<MutexGuard<'_, Viewer<B>>, ViewerError> {
    shared.lock().map_err(|_| ViewerError::Unavailable)
}

/// Let `picker` choose a document and open it in the shared viewer. The lock
/// is not held while the picker runs or while pages render. Dismissing the
/// picker keeps the current document.
pub fn open_with<B: PdfBackend + 'static>(
    shared: &Mutex<Viewer<B>>,
    picker: &dyn DocumentPicker,
) -> Result<Screen, ViewerError> {
    let Some(handle) = picker.pick() else {
        return Ok(lock(shared)?.screen());
    };

    let loader = lock(shared)?.begin_open();
    let loaded = loader.load(handle);

    let mut viewer = lock(shared)?;
    viewer.install(loaded);
    Ok(viewer.screen())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FixedPicker;
    use crate::pdf::fake::{FakeBackend, FakePage, FAKE_PDF};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fake_pdf(dir: &TempDir, name: &str) -> DocumentHandle {
        let path = dir.path().join(name);
        std::fs::write(&path, FAKE_PDF).unwrap();
        DocumentHandle::from_path(path).unwrap()
    }

    fn open(viewer: &mut Viewer<FakeBackend>, handle: DocumentHandle) {
        let loaded = viewer.begin_open().load(handle);
        assert!(viewer.install(loaded));
    }

    fn viewer() -> Viewer<FakeBackend> {
        Viewer::new(
            FakeBackend::new(vec![
                FakePage::new(100.0, 200.0, &["hello world"]),
                FakePage::new(100.0, 200.0, &["goodbye", "hello again"]),
            ]),
            Settings::default(),
        )
    }

    fn search(viewer: &mut Viewer<FakeBackend>, query: &str) {
        let outcome = viewer.set_query(query).unwrap().join().unwrap();
        assert_eq!(outcome, SearchOutcome::Published);
    }

    fn document_pages(screen: Screen) -> Vec<PageView> {
        match screen {
            Screen::Document { pages, .. } => pages,
            Screen::ChooseFile => panic!("no document open"),
        }
    }

    #[test]
    fn starts_on_choose_file_screen() {
        let mut viewer = viewer();
        assert_eq!(viewer.screen(), Screen::ChooseFile);
        assert!(viewer.set_query("hello").is_none());
        assert!(viewer.pages().is_empty());
    }

    #[test]
    fn opening_renders_all_pages() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));

        let pages = document_pages(viewer.screen());
        assert_eq!(pages.len(), 2);
        assert_eq!((pages[1].index, pages[1].width, pages[1].height), (1, 100, 200));
    }

    #[test]
    fn search_results_appear_on_pages() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "hello");

        let pages = document_pages(viewer.screen());
        assert_eq!(pages[0].matches, vec![Rect::from_xywh(0.0, 0.0, 50.0, 12.0)]);
        assert_eq!(pages[1].matches, vec![Rect::from_xywh(0.0, 20.0, 50.0, 12.0)]);
    }

    #[test]
    fn empty_query_clears_results() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "hello");

        assert!(viewer.set_query("").is_none());
        assert!(viewer.results().pages.is_empty());
        assert!(document_pages(viewer.screen()).iter().all(|p| p.matches.is_empty()));
        assert!(viewer.highlights(0, PageSize::new(50.0, 100.0)).is_empty());
    }

    #[test]
    fn clear_icon_resets_query_and_overlays() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "hello");

        match viewer.screen() {
            Screen::Document { search_field, .. } => {
                assert_eq!(
                    search_field,
                    Some(SearchField {
                        text: "hello".into(),
                        show_clear: true
                    })
                );
            }
            Screen::ChooseFile => panic!("no document open"),
        }

        viewer.clear_query();
        assert_eq!(viewer.query(), "");
        assert!(viewer.results().is_empty());
    }

    #[test]
    fn no_match_query_gives_empty_entries() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "zzz");

        let results = viewer.results();
        assert_eq!(results.pages.len(), 2);
        assert!(results.is_empty());
    }

    #[test]
    fn highlights_are_scaled_to_display() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "hello");

        let highlights = viewer.highlights(0, PageSize::new(200.0, 400.0));
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].rect, Rect::from_xywh(0.0, 0.0, 100.0, 24.0));
        assert_eq!(highlights[0].color, [255, 255, 0, 128]);
    }

    #[test]
    fn new_document_discards_old_pages_and_results() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        search(&mut viewer, "hello");
        let mut rx = viewer.subscribe();

        let broken = dir.path().join("broken.pdf");
        std::fs::write(&broken, b"not really").unwrap();
        open(&mut viewer, DocumentHandle::from_path(broken).unwrap());

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().pages.is_empty());
        assert!(viewer.pages().is_empty());
        assert_eq!(viewer.query(), "");
        assert!(document_pages(viewer.screen()).is_empty());
    }

    #[test]
    fn unavailable_search_hides_field() {
        let dir = TempDir::new().unwrap();
        let mut viewer = Viewer::new(
            FakeBackend::new(vec![FakePage::new(10.0, 10.0, &["x"])]).without_search(),
            Settings::default(),
        );
        open(&mut viewer, fake_pdf(&dir, "a.pdf"));

        assert!(matches!(
            viewer.screen(),
            Screen::Document {
                search_field: None,
                ..
            }
        ));
        assert!(viewer.set_query("x").is_none());
    }

    #[test]
    fn disabled_search_setting_hides_field() {
        let viewer = Viewer::new(
            FakeBackend::new(Vec::new()),
            Settings {
                search_enabled: false,
                ..Settings::default()
            },
        );
        assert!(!viewer.search_available());
    }

    #[test]
    fn picker_choice_opens_document() {
        let dir = TempDir::new().unwrap();
        let handle = fake_pdf(&dir, "picked.pdf");
        let shared = Mutex::new(viewer());

        let screen = open_with(&shared, &FixedPicker(None)).unwrap();
        assert_eq!(screen, Screen::ChooseFile);

        let picker = FixedPicker(Some(PathBuf::from(handle.path())));
        let screen = open_with(&shared, &picker).unwrap();
        assert_eq!(document_pages(screen).len(), 2);
        assert_eq!(lock(&shared).unwrap().handle(), Some(&handle));
    }

    #[test]
    fn dismissed_picker_keeps_current_document() {
        let dir = TempDir::new().unwrap();
        let shared = Mutex::new(viewer());
        open(&mut lock(&shared).unwrap(), fake_pdf(&dir, "a.pdf"));

        let screen = open_with(&shared, &FixedPicker(None)).unwrap();
        assert_eq!(document_pages(screen).len(), 2);
    }

    #[test]
    fn viewer_is_free_while_document_renders() {
        let dir = TempDir::new().unwrap();
        let shared = Mutex::new(viewer());
        open(&mut lock(&shared).unwrap(), fake_pdf(&dir, "a.pdf"));

        let loader = lock(&shared).unwrap().begin_open();
        // Old pages are gone before rendering starts, and the viewer answers.
        assert!(lock(&shared).unwrap().pages().is_empty());
        assert!(matches!(
            lock(&shared).unwrap().page_png(0),
            Err(PdfError::NoDocument)
        ));

        let loaded = loader.load(fake_pdf(&dir, "b.pdf"));
        assert!(lock(&shared).unwrap().install(loaded));
        assert_eq!(lock(&shared).unwrap().pages().len(), 2);
    }

    #[test]
    fn superseded_load_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();

        let first = viewer.begin_open();
        let second = viewer.begin_open();
        let stale = first.load(fake_pdf(&dir, "a.pdf"));
        let fresh = second.load(fake_pdf(&dir, "b.pdf"));

        assert!(!viewer.install(stale));
        assert!(viewer.pages().is_empty());
        assert!(viewer.install(fresh));
        assert_eq!(viewer.handle().map(|h| h.path()), Some(dir.path().join("b.pdf").as_path()));
    }

    #[test]
    fn query_typed_while_loading_is_searched() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();

        let loader = viewer.begin_open();
        assert!(viewer.set_query("hello").is_none());
        let mut rx = viewer.subscribe();
        rx.borrow_and_update();
        viewer.install(loader.load(fake_pdf(&dir, "a.pdf")));

        let snapshot = wait_for_results(&mut rx);
        assert_eq!(snapshot.query, "hello");
        assert_eq!(snapshot.for_page(0).unwrap().rects.len(), 1);
    }

    fn wait_for_results(rx: &mut watch::Receiver<SearchSnapshot>) -> SearchSnapshot {
        for _ in 0..500 {
            if rx.has_changed().unwrap() {
                let snapshot = rx.borrow_and_update().clone();
                if !snapshot.pages.is_empty() {
                    return snapshot;
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("search never published");
    }

    #[test]
    fn page_png_reports_missing_pages() {
        let dir = TempDir::new().unwrap();
        let mut viewer = viewer();
        assert!(matches!(viewer.page_png(0), Err(PdfError::NoDocument)));

        open(&mut viewer, fake_pdf(&dir, "a.pdf"));
        let png = viewer.page_png(1).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(matches!(viewer.page_png(2), Err(PdfError::InvalidPage(2))));
    }
}
