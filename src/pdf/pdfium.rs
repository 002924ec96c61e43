//! [`PdfBackend`] implementation using pdfium-render.
//!
//! Note: pdfium-render's Pdfium struct is not Send+Sync, so we bind the
//! library on demand for each session rather than storing it in shared state.

use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::backend::{PageChar, PageSize, PdfBackend, PdfError, PdfSession, Rect};

static LOGGED_SUCCESS: AtomicBool = AtomicBool::new(false);

fn log_bound(source: &dyn std::fmt::Debug) {
    if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
        info!(?source, "loaded PDFium library");
    }
}

fn try_bind(path: &Path) -> Option<Pdfium> {
    match Pdfium::bind_to_library(path) {
        Ok(bindings) => {
            log_bound(&path);
            Some(Pdfium::new(bindings))
        }
        Err(e) => {
            debug!(?path, error = ?e, "failed to bind PDFium");
            None
        }
    }
}

/// Bind to the PDFium library, trying the configured path first, then a
/// library bundled next to the executable, then the system library.
fn bind_pdfium(configured: Option<&Path>) -> Result<Pdfium, PdfError> {
    if let Some(path) = configured {
        if let Some(pdfium) = try_bind(path) {
            return Ok(pdfium);
        }
        warn!(?path, "configured PDFium library could not be loaded");
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // macOS bundles keep it in Contents/Frameworks
            #[cfg(target_os = "macos")]
            let exe_dir = exe_dir.join("..").join("Frameworks");

            let bundled = Pdfium::pdfium_platform_library_name_at_path(&exe_dir);
            if bundled.exists() {
                if let Some(pdfium) = try_bind(&bundled) {
                    return Ok(pdfium);
                }
            }
        }
    }

    if let Ok(bindings) = Pdfium::bind_to_system_library() {
        log_bound(&"system library");
        return Ok(Pdfium::new(bindings));
    }

    #[cfg(target_os = "macos")]
    if let Some(pdfium) = try_bind(Path::new("/usr/local/lib/libpdfium.dylib")) {
        return Ok(pdfium);
    }

    Err(PdfError::InitError(
        "Could not load PDFium library. Set PAGELIGHT_PDFIUM_PATH or install libpdfium.".to_string(),
    ))
}

/// Backend over the PDFium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

impl PdfBackend for PdfiumBackend {
    fn with_session<R>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&dyn PdfSession) -> R,
    ) -> Result<R, PdfError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PdfError::LoadError(e.to_string()))?;

        let session = PdfiumSession { document: &document };
        Ok(f(&session))
    }
}

struct PdfiumSession<'a, 'b> {
    document: &'b PdfDocument<'a>,
}

impl<'a> PdfiumSession<'a, '_> {
    fn page(&self, index: u32) -> Result<PdfPage<'a>, PdfError> {
        let index_u16 = u16::try_from(index).map_err(|_| PdfError::InvalidPage(index))?;
        self.document
            .pages()
            .get(index_u16)
            .map_err(|_| PdfError::InvalidPage(index))
    }
}

impl PdfSession for PdfiumSession<'_, '_> {
    fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }

    fn page_size(&self, index: u32) -> Result<PageSize, PdfError> {
        let page = self.page(index)?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }

    fn render_page(&self, index: u32, scale: f32) -> Result<RgbaImage, PdfError> {
        let page = self.page(index)?;
        let (width, height) =
            PageSize::new(page.width().value, page.height().value).to_pixels(scale);

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::RenderError(e.to_string()))?;

        Ok(bitmap.as_image().into_rgba8())
    }

    fn page_chars(&self, index: u32) -> Result<Vec<PageChar>, PdfError> {
        let page = self.page(index)?;
        let page_height = page.height().value;
        let text_page = page
            .text()
            .map_err(|e| PdfError::RenderError(e.to_string()))?;

        let mut chars = Vec::new();
        for char_obj in text_page.chars().iter() {
            let Some(ch) = char_obj.unicode_string().and_then(|s| s.chars().next()) else {
                continue;
            };

            // PDF coordinates are bottom-up, convert to top-down
            let bounds = char_obj.tight_bounds().ok().map(|rect| {
                Rect::from_xywh(
                    rect.left().value,
                    page_height - rect.top().value,
                    rect.width().value,
                    rect.height().value,
                )
            });

            chars.push(PageChar::new(ch, bounds));
        }

        Ok(chars)
    }
}
