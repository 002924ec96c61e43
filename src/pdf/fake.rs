//! In-memory backend for tests. Pages are laid out as fixed-pitch text:
//! each character is 10pt wide and 12pt tall, lines are 20pt apart.

use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use super::backend::{PageChar, PageSize, PdfBackend, PdfError, PdfSession, Rect};

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

#[derive(Debug, Clone)]
pub struct FakePage {
    pub size: PageSize,
    pub lines: Vec<String>,
}

impl FakePage {
    pub fn new(width: f32, height: f32, lines: &[&str]) -> Self {
        Self {
            size: PageSize::new(width, height),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

pub struct FakeBackend {
    pages: Vec<FakePage>,
    search: bool,
    failing_page: Option<u32>,
    /// Searches for this query wait for a signal before touching page 0
    gate: Mutex<Option<(String, Receiver<()>)>>,
    pub sessions: AtomicUsize,
}

impl FakeBackend {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            search: true,
            failing_page: None,
            gate: Mutex::new(None),
            sessions: AtomicUsize::new(0),
        }
    }

    pub fn without_search(mut self) -> Self {
        self.search = false;
        self
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub fn gate_query(&self, query: &str, release: Receiver<()>) {
        *self.gate.lock().unwrap() = Some((query.to_string(), release));
    }
}

struct FakeSession<'a> {
    backend: &'a FakeBackend,
}

impl FakeSession<'_> {
    fn page(&self, index: u32) -> Result<&FakePage, PdfError> {
        if self.backend.failing_page == Some(index) {
            return Err(PdfError::RenderError(format!("page {index} is broken")));
        }
        self.backend
            .pages
            .get(index as usize)
            .ok_or(PdfError::InvalidPage(index))
    }
}

impl PdfSession for FakeSession<'_> {
    fn page_count(&self) -> u32 {
        self.backend.pages.len() as u32
    }

    fn page_size(&self, index: u32) -> Result<PageSize, PdfError> {
        Ok(self.page(index)?.size)
    }

    fn render_page(&self, index: u32, scale: f32) -> Result<RgbaImage, PdfError> {
        let (width, height) = self.page(index)?.size.to_pixels(scale);
        Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    fn page_chars(&self, index: u32) -> Result<Vec<PageChar>, PdfError> {
        let page = self.page(index)?;
        let mut chars = Vec::new();
        for (row, line) in page.lines.iter().enumerate() {
            if row > 0 {
                chars.push(PageChar::new('\n', None));
            }
            let top = row as f32 * 20.0;
            for (col, ch) in line.chars().enumerate() {
                let bounds = Rect::from_xywh(col as f32 * 10.0, top, 10.0, 12.0);
                chars.push(PageChar::new(ch, Some(bounds)));
            }
        }
        Ok(chars)
    }

    fn search_page(
        &self,
        index: u32,
        query: &str,
        case_sensitive: bool,
    ) -> Result<Vec<super::backend::TextMatch>, PdfError> {
        if index == 0 {
            let gate = self.backend.gate.lock().unwrap().take();
            match gate {
                Some((gated, release)) if gated == query => {
                    let _ = release.recv();
                }
                other => *self.backend.gate.lock().unwrap() = other,
            }
        }
        let chars = self.page_chars(index)?;
        Ok(super::text::find_matches(&chars, query, case_sensitive))
    }
}

impl PdfBackend for FakeBackend {
    fn with_session<R>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&dyn PdfSession) -> R,
    ) -> Result<R, PdfError> {
        if bytes != FAKE_PDF {
            return Err(PdfError::LoadError("not a PDF".to_string()));
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(f(&FakeSession { backend: self }))
    }

    fn supports_text_search(&self) -> bool {
        self.search
    }
}
