//! Document → page bitmaps, in one pass over a single session.

use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::document::DocumentHandle;
use crate::pdf::{PageSize, PdfBackend, PdfError};

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page index (0-based)
    pub index: u32,
    pub image: RgbaImage,
}

impl RenderedPage {
    /// Pixel size of the bitmap.
    pub fn size(&self) -> PageSize {
        PageSize::new(self.image.width() as f32, self.image.height() as f32)
    }
}

/// Render every page in document order, keeping the first error.
pub fn try_rasterize<B: PdfBackend>(
    backend: &B,
    bytes: &[u8],
    scale: f32,
) -> Result<Vec<RenderedPage>, PdfError> {
    backend.with_session(bytes, |session| {
        let page_count = session.page_count();
        debug!(page_count, scale, "rasterizing document");

        (0..page_count)
            .map(|index| {
                session
                    .render_page(index, scale)
                    .map(|image| RenderedPage { index, image })
            })
            .collect::<Result<Vec<_>, _>>()
    })?
}

/// Render every page in document order. Any failure yields no pages at all.
pub fn rasterize<B: PdfBackend>(backend: &B, bytes: &[u8], scale: f32) -> Vec<RenderedPage> {
    try_rasterize(backend, bytes, scale).unwrap_or_else(|e| {
        warn!(error = %e, "rasterization failed");
        Vec::new()
    })
}

/// A read and rendered document. `bytes` stay around for searching.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub handle: DocumentHandle,
    pub bytes: Arc<[u8]>,
    pub pages: Vec<RenderedPage>,
}

/// Read `handle` and render it. Unreadable files yield no pages.
pub fn render_document<B: PdfBackend>(
    backend: &B,
    handle: DocumentHandle,
    scale: f32,
) -> RenderedDocument {
    let bytes: Arc<[u8]> = match handle.read_bytes() {
        Ok(bytes) => bytes.into(),
        Err(e) => {
            warn!(error = %e, "could not read document");
            Arc::from(Vec::new())
        }
    };

    let pages = if bytes.is_empty() {
        Vec::new()
    } else {
        rasterize(backend, &bytes, scale)
    };
    info!(path = %handle.path().display(), pages = pages.len(), "rendered document");

    RenderedDocument {
        handle,
        bytes,
        pages,
    }
}
