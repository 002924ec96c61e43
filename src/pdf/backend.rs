//! The PDF engine contract: a backend opens sessions, a session answers
//! page queries for the lifetime of one open document.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::text;

/// Errors that can occur during PDF operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to initialize PDFium: {0}")]
    InitError(String),

    #[error("Failed to load PDF: {0}")]
    LoadError(String),

    #[error("No document loaded")]
    NoDocument,

    #[error("Invalid page index: {0}")]
    InvalidPage(u32),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Image encoding failed: {0}")]
    ImageError(String),

    #[error("Text search is not available")]
    SearchUnsupported,
}

impl Serialize for PdfError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Page dimensions. In points when coming from a session, in pixels once
/// the page has been rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of this page rendered at `scale` (1.0 = 72 DPI).
    pub fn to_pixels(self, scale: f32) -> (u32, u32) {
        let px = |v: f32| ((v * scale).round() as u32).max(1);
        (px(self.width), px(self.height))
    }
}

/// Axis-aligned rectangle with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self::new(self.left * sx, self.top * sy, self.right * sx, self.bottom * sy)
    }
}

/// One character of a page's text layer with its tight bounds in points.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChar {
    pub ch: char,
    /// `None` for generated characters (e.g. inserted line breaks)
    pub bounds: Option<Rect>,
}

impl PageChar {
    pub fn new(ch: char, bounds: Option<Rect>) -> Self {
        Self { ch, bounds }
    }
}

/// A single textual match on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    /// Character index of the first matched character
    pub start: usize,
    /// Bounding rectangles, one per line the match spans
    pub bounds: Vec<Rect>,
}

/// An open document. Only valid inside [`PdfBackend::with_session`].
pub trait PdfSession {
    fn page_count(&self) -> u32;

    /// Page size in points.
    fn page_size(&self, index: u32) -> Result<PageSize, PdfError>;

    fn render_page(&self, index: u32, scale: f32) -> Result<RgbaImage, PdfError>;

    /// Characters of the page text layer, in reading order.
    fn page_chars(&self, index: u32) -> Result<Vec<PageChar>, PdfError>;

    /// Find every occurrence of `query` on the page. Rectangles are in points.
    fn search_page(
        &self,
        index: u32,
        query: &str,
        case_sensitive: bool,
    ) -> Result<Vec<TextMatch>, PdfError> {
        let chars = self.page_chars(index)?;
        Ok(text::find_matches(&chars, query, case_sensitive))
    }
}

/// Opens rendering sessions over document bytes.
pub trait PdfBackend: Send + Sync {
    /// Open `bytes`, run `f` against the session and release it.
    fn with_session<R>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&dyn PdfSession) -> R,
    ) -> Result<R, PdfError>;

    fn supports_text_search(&self) -> bool {
        true
    }
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Total number of pages
    pub page_count: u32,
    /// Page sizes in points, in page order
    pub pages: Vec<PageSize>,
}

/// Open `bytes` and collect page count and sizes.
pub fn document_info<B: PdfBackend>(backend: &B, bytes: &[u8]) -> Result<DocumentInfo, PdfError> {
    backend.with_session(bytes, |session| {
        let pages = (0..session.page_count())
            .map(|index| session.page_size(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentInfo {
            page_count: pages.len() as u32,
            pages,
        })
    })?
}
