use scraper::{Html, Node};

use super::IngestError;

/// Tags whose subtrees carry no article content.
const SKIP_TAGS: [&str; 5] = ["script", "style", "header", "footer", "nav"];

/// Fetch raw HTML from a URL.
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<String, IngestError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (ragline)")
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| IngestError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    response.text().await.map_err(|err| IngestError::Fetch {
        url: url.to_string(),
        message: err.to_string(),
    })
}

/// Extract the main textual content from an HTML document.
///
/// Drops script/style/nav/header/footer subtrees, then joins the surviving
/// text nodes as trimmed, non-empty lines.
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.tree.root(), &mut raw);

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Element(element) => {
            if SKIP_TAGS.contains(&element.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
            out.push('\n');
        }
        Node::Text(text) => {
            out.push_str(text);
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

/// Split text into overlapping word-count windows.
///
/// A window of 400 with overlap 50 steps 350 words at a time, so a 1000-word
/// text yields chunks starting at words 0, 350, and 700, the last shorter
/// than the window.
pub fn chunk_words(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || window == 0 {
        return Vec::new();
    }

    let step = window.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + window).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }
    chunks
}

/// One page-local chunk with character offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageChunk {
    pub text: String,
    /// Character offset within the page where this chunk starts.
    pub start_offset: usize,
    /// Character offset within the page where this chunk ends (exclusive).
    pub end_offset: usize,
}

/// Split one page's text into overlapping character windows.
///
/// Offsets are page-local character counts, not byte positions, so they stay
/// meaningful for non-ASCII pages. A 2500-char page with window 2000 and
/// overlap 200 yields `[0, 2000)` and `[1800, 2500)`.
pub fn chunk_page(page_text: &str, window: usize, overlap: usize) -> Vec<PageChunk> {
    if page_text.is_empty() || window == 0 {
        return Vec::new();
    }
    // Overlap must leave room to advance, or the loop would never move
    // past the first window.
    let overlap = overlap.min(window - 1);

    // Byte position of every char boundary, plus the end of the string.
    let mut boundaries: Vec<usize> = page_text.char_indices().map(|(byte, _)| byte).collect();
    boundaries.push(page_text.len());
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(total_chars);
        chunks.push(PageChunk {
            text: page_text[boundaries[start]..boundaries[end]].to_string(),
            start_offset: start,
            end_offset: end,
        });
        if end == total_chars {
            break;
        }
        start = end.saturating_sub(overlap);
    }
    chunks
}

/// Extract per-page text from PDF bytes.
///
/// Pages are extracted one at a time: a page the extractor cannot read
/// degrades to an empty string (and is skipped by chunking) rather than
/// failing the whole document. Only a document-level parse failure is an
/// error.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, IngestError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|err| IngestError::Pdf(err.to_string()))?;

    let mut pages = Vec::new();
    for (page_number, _) in document.get_pages() {
        let mut text = String::new();
        let mut output = pdf_extract::PlainTextOutput::new(&mut text);
        if let Err(err) = pdf_extract::output_doc_page(&document, &mut output, page_number) {
            tracing::warn!(page = page_number, error = %err, "skipping unreadable pdf page");
            text.clear();
        }
        pages.push(text);
    }
    Ok(pages)
}
