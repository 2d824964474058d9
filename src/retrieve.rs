//! Related-section retrieval.
//!
//! The query-time half of the pipeline: embed the selected text, search
//! the index with an over-fetched `k`, de-duplicate chunks that map to
//! the same document section (the closest chunk per section wins),
//! truncate to the requested size, and format a sentence-aligned snippet
//! for each retained chunk.
//!
//! Results are ordered by ascending distance. Retrieval against an
//! unchanged index is idempotent. A failure anywhere in the pipeline is
//! reported as an error — an empty result list always means "no
//! matches", never "search failed".

use std::collections::HashSet;

use anyhow::{bail, Context, Result};

use crate::cancel::CancelToken;
use crate::chunk::split_sentences;
use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::RelatedSection;

/// Find up to `top_n` sections related to `query_text`.
///
/// Cancellation is checked before embedding, before search, and before
/// snippet formatting. If fewer than `top_n` distinct sections match,
/// the available ones are returned; nothing is padded in.
pub async fn retrieve(
    index: &VectorIndex,
    provider: &dyn EmbeddingProvider,
    config: &RetrievalConfig,
    query_text: &str,
    top_n: usize,
    cancel: &CancelToken,
) -> Result<Vec<RelatedSection>> {
    if query_text.trim().is_empty() {
        bail!("query text must not be empty");
    }
    if top_n == 0 {
        return Ok(Vec::new());
    }

    cancel.check()?;
    let query_vec = embed_query(provider, query_text)
        .await
        .context("failed to embed query text")?;

    cancel.check()?;
    let k = top_n * config.overfetch_factor.max(1);
    let hits = index.search(&query_vec, k)?;

    // Hits arrive sorted by ascending distance, so the first chunk seen
    // for a section is also its closest one.
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut retained = Vec::new();
    for hit in hits {
        let key = (hit.record.doc_name.clone(), hit.record.section_title.clone());
        if seen.insert(key) {
            retained.push(hit);
        }
        if retained.len() == top_n {
            break;
        }
    }

    cancel.check()?;
    Ok(retained
        .into_iter()
        .map(|hit| RelatedSection {
            doc_name: hit.record.doc_name,
            section_title: hit.record.section_title,
            page: hit.record.page,
            snippet: make_snippet(&hit.record.text, config.snippet_max_chars),
        })
        .collect())
}

/// Trim chunk text to a sentence-aligned excerpt of at most `max_chars`
/// characters (plus an ellipsis when trimmed).
///
/// Whole leading sentences are kept while they fit; if even the first
/// sentence is too long it is cut at a character boundary.
pub fn make_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for (_, sentence) in split_sentences(text) {
        let len = sentence.chars().count();
        let sep = if out.is_empty() { 0 } else { 1 };
        if used + sep + len > max_chars {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(&sentence);
        used += sep + len;
    }

    if out.is_empty() {
        out = text.chars().take(max_chars).collect();
    }
    out.push('…');
    out
}
