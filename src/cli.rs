use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::document::DocumentHandle;
use crate::overlay::{self, HighlightStyle};
use crate::pdf::{self, PageSize, PdfBackend, PdfError, PdfiumBackend, Rect};
use crate::rasterizer;
use crate::search::{self, PageMatches};
use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "pagelight")]
#[command(version, about = "Render PDF pages and highlight text matches")]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print page count and page sizes as JSON.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render every page to a PNG file.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output directory (defaults to the PDF's directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Render scale, 1.0 = 72 DPI
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Search every page and print the match rectangles as JSON.
    Search {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "QUERY")]
        query: String,
        /// Also write highlighted PNGs of matching pages into this directory
        #[arg(long, value_name = "DIR")]
        render: Option<PathBuf>,
        /// Scale rectangles to pages displayed at this width
        #[arg(long)]
        display_width: Option<f32>,
    },
    /// Open the desktop viewer.
    #[cfg(feature = "gui")]
    Open {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSize>,
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    query: String,
    pages: Vec<PageMatches>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let settings = load_settings(cli.config.as_deref())?;
    let backend = PdfiumBackend::new(settings.pdfium_library_path.clone());

    match cli.command {
        Commands::Info { file } => run_info(&backend, &file),
        Commands::Render { file, out, scale } => run_render(
            &backend,
            &file,
            out.as_deref(),
            scale.unwrap_or(settings.render_scale),
        ),
        Commands::Search {
            file,
            query,
            render,
            display_width,
        } => run_search(
            &backend,
            &settings,
            &file,
            &query,
            render.as_deref(),
            display_width,
        ),
        #[cfg(feature = "gui")]
        Commands::Open { file } => {
            crate::run_with(file, cli.config);
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    Ok(settings.with_env())
}

fn open(file: &Path) -> Result<(DocumentHandle, Vec<u8>)> {
    let handle = DocumentHandle::from_path(file)?;
    let bytes = handle.read_bytes()?;
    Ok((handle, bytes))
}

fn run_info<B: PdfBackend>(backend: &B, file: &Path) -> Result<()> {
    let (handle, bytes) = open(file)?;
    let info = pdf::document_info(backend, &bytes).context("failed to open PDF")?;

    let payload = InfoOutput {
        path: handle.path().display().to_string(),
        page_count: info.page_count,
        pages: info.pages,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_render<B: PdfBackend>(backend: &B, file: &Path, out: Option<&Path>, scale: f32) -> Result<()> {
    if !(scale > 0.0 && scale.is_finite()) {
        anyhow::bail!("--scale must be a positive number");
    }

    let (handle, bytes) = open(file)?;
    let pages = rasterizer::try_rasterize(backend, &bytes, scale).context("failed to render PDF")?;
    let out_dir = output_dir(handle.path(), out)?;

    for page in &pages {
        let output = out_dir.join(page_file_name(handle.path(), page.index, None));
        page.image
            .save(&output)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
        println!("{}", output.display());
    }

    info!(pages = pages.len(), "rendered document");
    Ok(())
}

fn run_search<B: PdfBackend>(
    backend: &B,
    settings: &Settings,
    file: &Path,
    query: &str,
    render: Option<&Path>,
    display_width: Option<f32>,
) -> Result<()> {
    let (handle, bytes) = open(file)?;
    if !backend.supports_text_search() || !settings.search_enabled {
        return Err(PdfError::SearchUnsupported.into());
    }

    let scale = settings.render_scale;
    let (matches, sizes) = backend
        .with_session(&bytes, |session| {
            let matches =
                search::search_document(session, query, scale, settings.case_sensitive, &|| false)
                    .unwrap_or_default();
            let sizes = (0..session.page_count())
                .map(|index| session.page_size(index))
                .collect::<Result<Vec<_>, _>>();
            (matches, sizes)
        })
        .context("failed to open PDF")?;
    let sizes = sizes.context("failed to read page sizes")?;

    if let Some(dir) = render {
        write_highlighted_pages(backend, &handle, &bytes, &matches, settings, dir)?;
    }

    let pages = match display_width {
        Some(width) => scale_to_width(matches, &sizes, scale, width),
        None => matches,
    };
    let payload = SearchOutput {
        query: query.to_string(),
        pages,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn scale_to_width(
    matches: Vec<PageMatches>,
    sizes: &[PageSize],
    scale: f32,
    width: f32,
) -> Vec<PageMatches> {
    matches
        .into_iter()
        .map(|page_matches| {
            let Some(size) = sizes.get(page_matches.page as usize) else {
                return page_matches;
            };
            let (w, h) = size.to_pixels(scale);
            let page = PageSize::new(w as f32, h as f32);
            let display = overlay::display_size_for_width(page, width);
            let rects: Vec<Rect> = page_matches
                .rects
                .iter()
                .map(|rect| overlay::scale_rect(rect, page, display))
                .collect();
            PageMatches {
                page: page_matches.page,
                rects,
            }
        })
        .collect()
}

fn write_highlighted_pages<B: PdfBackend>(
    backend: &B,
    handle: &DocumentHandle,
    bytes: &[u8],
    matches: &[PageMatches],
    settings: &Settings,
    dir: &Path,
) -> Result<()> {
    let pages = rasterizer::try_rasterize(backend, bytes, settings.render_scale)
        .context("failed to render PDF")?;
    fs::create_dir_all(dir)?;
    let style = HighlightStyle::from_settings(settings);

    for mut page in pages {
        let Some(page_matches) = matches.iter().find(|m| m.page == page.index) else {
            continue;
        };
        if page_matches.rects.is_empty() {
            continue;
        }

        let size = page.size();
        let highlights = overlay::highlights_for(&page_matches.rects, size, size, style);
        overlay::draw_highlights(&mut page.image, &highlights);

        let output = dir.join(page_file_name(handle.path(), page.index, Some("matches")));
        page.image
            .save(&output)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
        eprintln!("{}", output.display());
    }

    Ok(())
}

fn output_dir(file: &Path, out: Option<&Path>) -> Result<PathBuf> {
    let dir = match out {
        Some(dir) => dir.to_path_buf(),
        None => file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

/// `<stem>-page-<n>[-suffix].png` with a 1-based page number.
fn page_file_name(file: &Path, index: u32, suffix: Option<&str>) -> String {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");
    match suffix {
        Some(suffix) => format!("{stem}-page-{}-{suffix}.png", index + 1),
        None => format!("{stem}-page-{}.png", index + 1),
    }
}
