//! Sentence-window text chunker.
//!
//! Splits a section body into overlapping windows of whole sentences so
//! that no semantic unit crossing a window boundary is entirely lost.
//! Windows hold `window_sentences` sentences and successive windows
//! share `overlap_sentences` of them; only the final window of a
//! section may be shorter.
//!
//! Each chunk records its byte offset within the section body, a token
//! count, and a SHA-256 hash of its text. Chunking is deterministic:
//! identical input and configuration always produce identical chunks,
//! which re-ingestion and the test suite rely on.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Split a section body into overlapping sentence windows.
///
/// Bodies with fewer than `min_words` words produce no chunks; such
/// sections carry no searchable content worth indexing.
pub fn chunk_text(body: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if body.split_whitespace().count() < config.min_words {
        return Vec::new();
    }

    let sentences = split_sentences(body);
    if sentences.is_empty() {
        return Vec::new();
    }

    let window = config.window_sentences.max(1);
    let step = window.saturating_sub(config.overlap_sentences).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(sentences.len());
        let text = sentences[start..end]
            .iter()
            .map(|(_, s)| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        chunks.push(make_chunk(text, sentences[start].0));

        if end >= sentences.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Split text at sentence boundaries: a terminal `.`, `!`, or `?`
/// followed by a space and then an uppercase letter or a line break.
/// Returns (byte offset, trimmed sentence) pairs; offsets refer to the
/// original text.
pub fn split_sentences(text: &str) -> Vec<(usize, String)> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0usize;

    let mut i = 0usize;
    while i < bytes.len() {
        let terminal = bytes[i] == b'.' || bytes[i] == b'!' || bytes[i] == b'?';
        if terminal && i + 1 < bytes.len() && bytes[i + 1] == b' ' {
            let after = if i + 2 < bytes.len() { bytes[i + 2] } else { b'\n' };
            if after.is_ascii_uppercase() || after == b'\n' {
                push_sentence(text, start, i + 1, &mut sentences);
                start = i + 2;
                i = start;
                continue;
            }
        }
        i += 1;
    }

    push_sentence(text, start, text.len(), &mut sentences);
    sentences
}

fn push_sentence(text: &str, start: usize, end: usize, out: &mut Vec<(usize, String)>) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    out.push((start + lead, trimmed.to_string()));
}

fn make_chunk(text: String, char_offset: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let token_count = text.split_whitespace().count();

    Chunk {
        text,
        char_offset,
        token_count,
        hash,
    }
}
