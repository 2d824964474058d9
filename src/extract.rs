//! PDF section extraction.
//!
//! Turns raw PDF bytes into an ordered sequence of sections, each a
//! detected heading plus the body text beneath it. Extraction is
//! pipeline-layer: callers supply bytes and a document name; this module
//! returns a [`Document`] or a [`ParseError`], never a partial result.
//!
//! Heading detection works on the shape of extracted text lines (word
//! count, capitalization, terminal punctuation) because `pdf-extract`
//! exposes no font information. Text that precedes the first detected
//! heading is collected into an implicit "Preamble" section, so every
//! line of the document lands in exactly one section body.

use chrono::Utc;

use crate::models::{Document, Section};

/// Section title used for text that precedes the first detected heading.
pub const PREAMBLE_TITLE: &str = "Preamble";

/// Upper bound (exclusive) on the word count of a heading line.
const MAX_HEADING_WORDS: usize = 30;

/// Extraction error. The document is rejected whole; nothing reaches
/// the index.
#[derive(Debug)]
pub enum ParseError {
    /// The PDF is password-protected.
    Encrypted,
    /// The bytes are not a readable PDF.
    Unreadable(String),
    /// The PDF decoded but yielded no text (e.g. a scanned image with
    /// no OCR available).
    NoText,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Encrypted => write!(f, "PDF is encrypted"),
            ParseError::Unreadable(e) => write!(f, "PDF could not be read: {}", e),
            ParseError::NoText => write!(f, "PDF contains no extractable text"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a PDF into an ordered sequence of sections.
///
/// The returned sections cover the full extracted text: heading lines
/// become section titles, every other non-empty line is appended to the
/// body of the nearest preceding heading's section.
pub fn extract_sections(bytes: &[u8], doc_name: &str) -> Result<Document, ParseError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(classify_pdf_error)?;

    if text.trim().is_empty() {
        return Err(ParseError::NoText);
    }

    let pages = split_pages(&text);
    let sections = assemble_sections(&pages);

    let title = document_title(&sections, doc_name);

    Ok(Document {
        doc_name: doc_name.to_string(),
        title,
        sections,
        ingested_at: Utc::now(),
    })
}

/// Document title: the first detected heading, else the document name
/// without its `.pdf` suffix.
fn document_title(sections: &[Section], doc_name: &str) -> String {
    sections
        .iter()
        .find(|s| s.title != PREAMBLE_TITLE)
        .map(|s| s.title.clone())
        .unwrap_or_else(|| doc_name.trim_end_matches(".pdf").to_string())
}

fn classify_pdf_error(err: pdf_extract::OutputError) -> ParseError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("encrypt") {
        ParseError::Encrypted
    } else {
        ParseError::Unreadable(msg)
    }
}

/// Split extracted text into (page number, page text) pairs.
///
/// `pdf-extract` separates pages with form feeds; a PDF without them is
/// treated as a single page. Page numbers are assigned before empty
/// pages are discarded so they stay aligned with the source document.
fn split_pages(text: &str) -> Vec<(usize, String)> {
    if text.contains('\x0C') {
        text.split('\x0C')
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| (i + 1, page.to_string()))
            .collect()
    } else {
        vec![(1, text.to_string())]
    }
}

/// Group page lines into sections under the nearest preceding heading.
fn assemble_sections(pages: &[(usize, String)]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_title = PREAMBLE_TITLE.to_string();
    let mut current_page = pages.first().map(|(n, _)| *n).unwrap_or(1);
    let mut current_body = String::new();

    for (page_num, page_text) in pages {
        for line in page_text.lines() {
            let line = normalize_text(line);
            if line.is_empty() {
                continue;
            }

            if is_heading(&line) {
                flush_section(&mut sections, &current_title, current_page, &current_body);
                current_title = clean_heading(&line);
                current_page = *page_num;
                current_body.clear();
            } else {
                if !current_body.is_empty() {
                    current_body.push(' ');
                }
                current_body.push_str(&line);
            }
        }
    }

    flush_section(&mut sections, &current_title, current_page, &current_body);
    sections
}

fn flush_section(sections: &mut Vec<Section>, title: &str, page: usize, body: &str) {
    // The implicit preamble is only emitted when it accrued text; a
    // detected heading is kept even with an empty body so downstream
    // consumers see the document's full outline.
    if title == PREAMBLE_TITLE && body.is_empty() {
        return;
    }
    sections.push(Section {
        title: title.to_string(),
        page,
        body: body.to_string(),
    });
}

/// Fold common ligatures and collapse runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    let folded = text
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decide whether a normalized line is a heading.
///
/// A heading is short (1–29 words), is not a bullet, does not end like
/// a sentence, starts with an uppercase letter or digit, and has a
/// majority of capitalized or numeric words (short connectives like
/// "of" and "the" are exempt from the majority count).
fn is_heading(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() >= MAX_HEADING_WORDS {
        return false;
    }

    if line.contains('\u{2022}') || line.starts_with('-') || line.starts_with('*') {
        return false;
    }

    if line.ends_with(['.', '?', '!', ',', ';', ':']) {
        return false;
    }

    let first = line.chars().next().unwrap_or(' ');
    if !(first.is_uppercase() || first.is_ascii_digit()) {
        return false;
    }

    let mut capitalized = 0usize;
    let mut counted = 0usize;
    for word in &words {
        if is_connective(word) {
            continue;
        }
        counted += 1;
        let c = word.chars().next().unwrap_or(' ');
        if c.is_uppercase() || c.is_ascii_digit() {
            capitalized += 1;
        }
    }

    counted == 0 || capitalized * 2 >= counted
}

fn is_connective(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "and" | "as" | "at" | "by" | "for" | "in" | "of" | "on" | "or" | "the" | "to"
            | "with"
    )
}

/// Clean a heading line for display: drop a trailing page number,
/// leading outline numbering ("2.1.3 Results" → "Results"), and
/// trailing punctuation.
fn clean_heading(line: &str) -> String {
    let mut text = line.trim().to_string();

    // Trailing page number from running headers ("Introduction 7").
    if let Some((head, last)) = text.rsplit_once(' ') {
        if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
            text = head.trim_end().to_string();
        }
    }

    // Leading outline numbering: digits and dots up to the first space.
    if let Some((prefix, rest)) = text.split_once(' ') {
        let numbering = !prefix.is_empty()
            && prefix.chars().all(|c| c.is_ascii_digit() || c == '.')
            && prefix.chars().any(|c| c.is_ascii_digit());
        if numbering {
            text = rest.trim_start().to_string();
        }
    }

    text.trim_end_matches(['.', ',', ':']).trim().to_string()
}
