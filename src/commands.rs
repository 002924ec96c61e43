//! Tauri commands for the viewer.
//!
//! These commands expose the viewer state to the WebView frontend via IPC.
//! Search results are pushed separately as `search-results` events.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::{Arc, Mutex, MutexGuard};
use tauri::{AppHandle, Runtime, State};
use tauri_plugin_dialog::DialogExt;

use crate::document::{DocumentHandle, DocumentPicker, FixedPicker};
use crate::overlay::Highlight;
use crate::pdf::{PageSize, PdfiumBackend};
use crate::viewer::{self, Screen, Viewer};

/// Application state holding the single viewer.
pub struct AppState {
    pub viewer: Arc<Mutex<Viewer<PdfiumBackend>>>,
}

impl AppState {
    pub fn new(viewer: Viewer<PdfiumBackend>) -> Self {
        Self {
            viewer: Arc::new(Mutex::new(viewer)),
        }
    }

    fn viewer(&self) -> Result<MutexGuard<'_, Viewer<PdfiumBackend>>, String> {
        viewer::lock(&self.viewer).map_err(|e| e.to_string())
    }
}

/// Native open dialog restricted to PDF files.
pub struct DialogPicker<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> DocumentPicker for DialogPicker<R> {
    fn pick(&self) -> Option<DocumentHandle> {
        let chosen = self
            .app
            .dialog()
            .file()
            .add_filter("PDF", &["pdf"])
            .blocking_pick_file()?;
        let path = chosen.into_path().ok()?;
        DocumentHandle::from_path(path).ok()
    }
}

/// Pick and render on a blocking worker. The viewer lock is only taken to
/// swap documents, so the read-side commands stay responsive.
async fn open_in_background<P>(state: &AppState, picker: P) -> Result<Screen, String>
where
    P: DocumentPicker + Send + 'static,
{
    let shared = state.viewer.clone();
    tauri::async_runtime::spawn_blocking(move || viewer::open_with(&shared, &picker))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

/// Show the file chooser and open the selection. Dismissing the dialog keeps
/// the current document.
#[tauri::command]
pub async fn choose_pdf<R: Runtime>(
    app: AppHandle<R>,
    state: State<'_, AppState>,
) -> Result<Screen, String> {
    open_in_background(&state, DialogPicker { app }).await
}

/// Open a PDF from a path, `file://` URL or percent-encoded path.
#[tauri::command]
pub async fn open_pdf(path: String, state: State<'_, AppState>) -> Result<Screen, String> {
    let handle = DocumentHandle::parse(&path).map_err(|e| e.to_string())?;
    open_in_background(&state, FixedPicker(Some(handle.path().to_path_buf()))).await
}

#[tauri::command(async)]
pub fn get_screen(state: State<'_, AppState>) -> Result<Screen, String> {
    Ok(state.viewer()?.screen())
}

/// A rendered page as a PNG data URL.
#[tauri::command(async)]
pub fn render_page(page_index: u32, state: State<'_, AppState>) -> Result<String, String> {
    let png = state
        .viewer()?
        .page_png(page_index)
        .map_err(|e| e.to_string())?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Update the query. Results arrive as a `search-results` event.
#[tauri::command(async)]
pub fn set_search_query(query: String, state: State<'_, AppState>) -> Result<(), String> {
    // The worker publishes through the viewer's channel; nothing to join here.
    let _ = state.viewer()?.set_query(&query);
    Ok(())
}

#[tauri::command(async)]
pub fn clear_search(state: State<'_, AppState>) -> Result<(), String> {
    state.viewer()?.clear_query();
    Ok(())
}

/// Highlights for a page displayed at `width` x `height`.
#[tauri::command(async)]
pub fn get_highlights(
    page_index: u32,
    width: f32,
    height: f32,
    state: State<'_, AppState>,
) -> Result<Vec<Highlight>, String> {
    Ok(state
        .viewer()?
        .highlights(page_index, PageSize::new(width, height)))
}
