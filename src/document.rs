//! Document handles and the pickers that produce them.

use serde::{Serialize, Serializer};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("File does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Not a PDF file: {0}")]
    NotPdf(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Serialize for DocumentError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// A user-chosen PDF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHandle {
    path: PathBuf,
}

impl DocumentHandle {
    /// Accept `path` if it names an existing `.pdf` file.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        if !path.exists() {
            return Err(DocumentError::NotFound(path));
        }
        if !path.is_file() {
            return Err(DocumentError::NotAFile(path));
        }
        if !has_pdf_extension(&path) {
            return Err(DocumentError::NotPdf(path));
        }
        Ok(Self { path })
    }

    /// Interpret `arg` as a plain path, a `file://` URL or a percent-encoded
    /// path, in that order.
    pub fn parse(arg: &str) -> Result<Self, DocumentError> {
        let direct = Self::from_path(arg);
        if direct.is_ok() {
            return direct;
        }

        if arg.starts_with("file://") {
            if let Some(path) = url::Url::parse(arg).ok().and_then(|u| u.to_file_path().ok()) {
                if let Ok(handle) = Self::from_path(path) {
                    debug!(arg, "resolved file URL");
                    return Ok(handle);
                }
            }
        }

        if let Ok(decoded) = urlencoding::decode(arg) {
            if decoded != arg {
                if let Ok(handle) = Self::from_path(&*decoded) {
                    debug!(arg, "resolved percent-encoded path");
                    return Ok(handle);
                }
            }
        }

        direct
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        std::fs::read(&self.path).map_err(|source| DocumentError::Read {
            path: self.path.clone(),
            source,
        })
    }
}

/// Find the first PDF among launch arguments. The first argument is the
/// executable and is skipped, as are flags and arguments that are not UTF-8.
pub fn pdf_from_args<I, S>(args: I) -> Option<DocumentHandle>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter().skip(1).find_map(|arg| {
        let arg = arg.as_ref().to_str()?;
        if arg.starts_with('-') {
            return None;
        }
        DocumentHandle::parse(arg).ok()
    })
}

/// Something that lets the user choose a PDF. `None` means nothing was chosen.
pub trait DocumentPicker {
    fn pick(&self) -> Option<DocumentHandle>;
}

/// Picker that always offers the same path, used where the choice was made
/// up front (command line, file association).
#[derive(Debug, Clone)]
pub struct FixedPicker(pub Option<PathBuf>);

impl DocumentPicker for FixedPicker {
    fn pick(&self) -> Option<DocumentHandle> {
        self.0
            .as_ref()
            .and_then(|path| DocumentHandle::from_path(path).ok())
    }
}
