// pagelight - PDF page viewer with search highlights
//
// The library renders PDF pages through PDFium, searches their text layer
// and maps match rectangles onto the displayed pages. The desktop shell
// (feature `gui`) wraps it in a Tauri window.

pub mod cli;
pub mod document;
pub mod logging;
pub mod overlay;
pub mod pdf;
pub mod rasterizer;
pub mod search;
pub mod settings;
pub mod viewer;

#[cfg(feature = "gui")]
mod commands;

#[cfg(feature = "gui")]
pub use desktop::{run, run_with};

#[cfg(feature = "gui")]
mod desktop {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tauri::{Emitter, Manager};
    use tracing::{info, warn};

    use crate::commands::{
        choose_pdf, clear_search, get_highlights, get_screen, open_pdf, render_page,
        set_search_query, AppState,
    };
    use crate::document::{pdf_from_args, DocumentHandle};
    use crate::pdf::PdfiumBackend;
    use crate::settings::Settings;
    use crate::viewer::Viewer;

    /// Stores the file path that was passed to the app on launch (if any).
    /// This is used to open PDFs when the app is launched via file association.
    pub struct LaunchFile(pub Mutex<Option<String>>);

    /// Handle file associations - extract PDF paths from URLs and emit to frontend.
    #[cfg_attr(not(any(target_os = "macos", target_os = "ios")), allow(dead_code))]
    fn handle_file_associations<R: tauri::Runtime>(
        app_handle: &tauri::AppHandle<R>,
        urls: Vec<url::Url>,
    ) {
        info!(count = urls.len(), "received file open event");

        let handle = urls
            .iter()
            .filter_map(|url| url.to_file_path().ok())
            .find_map(|path| DocumentHandle::from_path(path).ok());

        match handle {
            Some(handle) => {
                let path = handle.path().display().to_string();
                // Only open the first PDF
                if let Err(e) = app_handle.emit("open-file", &path) {
                    warn!(error = %e, "failed to emit open-file event");
                }
            }
            None => warn!("file open event carried no readable PDF"),
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        run_with(None, None)
    }

    /// Start the desktop shell, opening `file` (or the first PDF among the
    /// launch arguments) once the frontend asks for it. Settings come from
    /// `config` when given, otherwise from the app config directory.
    pub fn run_with(file: Option<PathBuf>, config: Option<PathBuf>) {
        crate::logging::init();

        let launch_file = file
            .and_then(|path| DocumentHandle::from_path(path).ok())
            .or_else(|| pdf_from_args(std::env::args_os()))
            .map(|handle| handle.path().display().to_string());
        if let Some(ref file) = launch_file {
            info!(file, "launch file");
        }

        let app = tauri::Builder::default()
            .plugin(tauri_plugin_dialog::init())
            .manage(LaunchFile(Mutex::new(launch_file)))
            .invoke_handler(tauri::generate_handler![
                choose_pdf,
                open_pdf,
                get_screen,
                render_page,
                set_search_query,
                clear_search,
                get_highlights,
                get_launch_file,
            ])
            .setup(move |app| {
                let settings_path = match config {
                    Some(path) => path,
                    None => app.path().app_config_dir()?.join("settings.json"),
                };
                let settings = Settings::load(&settings_path)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "using default settings");
                        Settings::default()
                    })
                    .with_env();

                let backend = PdfiumBackend::new(settings.pdfium_library_path.clone());
                let viewer = Viewer::new(backend, settings);
                let mut results = viewer.subscribe();
                app.manage(AppState::new(viewer));

                let handle = app.handle().clone();
                tauri::async_runtime::spawn(async move {
                    while results.changed().await.is_ok() {
                        let snapshot = results.borrow_and_update().clone();
                        if let Err(e) = handle.emit("search-results", &snapshot) {
                            warn!(error = %e, "failed to emit search results");
                        }
                    }
                });

                info!("app setup complete");
                Ok(())
            })
            .build(tauri::generate_context!())
            .expect("error while building tauri application");

        app.run(|app_handle, event| match event {
            // Handle macOS "Open With" / double-click file associations
            #[cfg(any(target_os = "macos", target_os = "ios"))]
            tauri::RunEvent::Opened { urls } => {
                handle_file_associations(app_handle, urls);
            }
            _ => {}
        });
    }

    /// Get the file path that was passed on launch (if any).
    /// Frontend calls this on startup to check if a PDF should be opened.
    #[tauri::command]
    fn get_launch_file(state: tauri::State<LaunchFile>) -> Option<String> {
        state.0.lock().ok().and_then(|mut guard| guard.take())
    }
}
