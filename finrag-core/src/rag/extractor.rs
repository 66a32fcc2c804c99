//! PDF text extraction.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction error: {0}")]
    Pdf(#[from] pdf_extract::OutputError),

    /// The parser panicked or its worker thread was cancelled.
    #[error("PDF extraction aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Extracts the text of every page, each page followed by a newline.
///
/// Parsing runs on a blocking thread. A panic inside the parser (which
/// happens on some malformed files) is reported as [`ExtractError::Aborted`].
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String> {
    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
        .await
        .map_err(|e| ExtractError::Aborted(e.to_string()))??;

    debug!(pages = pages.len(), "extracted PDF text");
    Ok(join_pages(&pages))
}

fn join_pages(pages: &[String]) -> String {
    let mut full_text = String::with_capacity(pages.iter().map(|p| p.len() + 1).sum());
    for page in pages {
        full_text.push_str(page);
        full_text.push('\n');
    }
    full_text
}
