//! PDF engine access.
//!
//! This module provides:
//! - The backend/session contract the rest of the app renders and searches through
//! - A PDFium implementation of that contract
//! - Character-level text matching with line-merged bounding boxes

mod backend;
#[cfg(test)]
pub(crate) mod fake;
mod pdfium;
pub mod text;

pub use backend::*;
pub use pdfium::PdfiumBackend;
