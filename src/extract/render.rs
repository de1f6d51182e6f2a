//! Page rasterisation with pdfium.
//!
//! pdfium keeps thread-local state, so every call here runs inside
//! `spawn_blocking` and binds its own [`Pdfium`] instance on that thread.

use crate::error::StudioError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Environment variable naming the directory that holds libpdfium.
pub(crate) const PDFIUM_PATH_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Where to look for libpdfium before falling back to the system library:
/// `dir` if given, then [`PDFIUM_PATH_ENV`], then `./`.
fn pdfium_search_dir(dir: Option<&Path>) -> PathBuf {
    dir.map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./"))
}

/// Bind to libpdfium from [`pdfium_search_dir`], then the system library.
pub(crate) fn bind_pdfium(dir: Option<&Path>) -> Result<Pdfium, StudioError> {
    let dir = pdfium_search_dir(dir);
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| StudioError::PdfiumBindingFailed(e.to_string()))
}

/// Check that a pdfium library can be bound at all.
pub(crate) async fn probe_pdfium(dir: Option<PathBuf>) -> Result<(), StudioError> {
    tokio::task::spawn_blocking(move || bind_pdfium(dir.as_deref()).map(|_| ()))
        .await
        .map_err(|e| StudioError::Internal(format!("pdfium probe panicked: {e}")))?
}

/// Rasterise every page of `bytes`, longest edge capped at `max_pixels`.
///
/// Returns `(page_index_0based, image)` pairs in page order.
pub(crate) async fn render_document(
    name: String,
    bytes: Arc<[u8]>,
    max_pixels: u32,
    pdfium_dir: Option<PathBuf>,
) -> Result<Vec<(usize, DynamicImage)>, StudioError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(StudioError::CorruptDocument {
            name,
            detail: "missing %PDF- header".into(),
        });
    }

    tokio::task::spawn_blocking(move || {
        render_blocking(&name, &bytes, max_pixels, pdfium_dir.as_deref())
    })
    .await
    .map_err(|e| StudioError::Internal(format!("Render task panicked: {e}")))?
}

fn render_blocking(
    name: &str,
    bytes: &[u8],
    max_pixels: u32,
    pdfium_dir: Option<&Path>,
) -> Result<Vec<(usize, DynamicImage)>, StudioError> {
    let pdfium = bind_pdfium(pdfium_dir)?;
    let corrupt = |detail: String| StudioError::CorruptDocument {
        name: name.to_string(),
        detail,
    };

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| corrupt(format!("{e:?}")))?;
    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(corrupt("document has no pages".into()));
    }
    info!("{}: {} pages", name, total);

    let edge = i32::try_from(max_pixels).unwrap_or(i32::MAX);
    let render_config = PdfRenderConfig::new()
        .set_target_width(edge)
        .set_maximum_height(edge);

    let mut out = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| corrupt(format!("page {}: {e:?}", idx + 1)))?
            .as_image();
        debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
        out.push((idx, image));
    }
    Ok(out)
}
