//! Page-level text extraction.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use boundly_core::{Error, Result};

/// `(1-based page number, text)` for every page with non-blank text.
///
/// PDFs are read page by page; plain text and markdown files are a single
/// page. Blocking; run on `spawn_blocking` from async code.
pub fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => extract_pdf(path),
        "txt" | "md" => {
            let text = std::fs::read_to_string(path).map_err(|e| Error::extraction(path.display().to_string(), e.to_string()))?;
            Ok(if text.trim().is_empty() { Vec::new() } else { vec![(1, text)] })
        }
        other => Err(Error::extraction(path.display().to_string(), format!("unsupported extension '{other}'"))),
    }
}

fn extract_pdf(path: &Path) -> Result<Vec<(u32, String)>> {
    let doc = Document::load(path).map_err(|e| Error::extraction(path.display().to_string(), e.to_string()))?;
    let mut pages = Vec::new();
    for page in doc.get_pages().into_keys() {
        match doc.extract_text(&[page]) {
            Ok(text) if !text.trim().is_empty() => pages.push((page, text)),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), page, error = %e, "page text unreadable, skipping page"),
        }
    }
    debug!(path = %path.display(), pages = pages.len(), "extracted");
    Ok(pages)
}
