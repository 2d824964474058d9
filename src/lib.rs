//! # Synapse
//!
//! A semantic retrieval engine for PDF libraries.
//!
//! Synapse parses PDFs into heading-delimited sections, chunks each
//! section into overlapping sentence windows, embeds the chunks with a
//! hosted embedding model, and answers "related sections" queries with
//! nearest-neighbor search, per-section de-duplication, and
//! sentence-aligned snippets.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ PDF bytes │──▶│ extract → chunk →     │──▶│ Vector Index │
//! │ (upload)  │   │ embed                 │   │ (RwLock)     │
//! └──────────┘   └──────────────────────┘   └──────┬───────┘
//!                                                  │
//!                    selected text ──▶ embed ──▶ search ──▶ dedup ──▶ snippets
//!                                                  │
//!                               ┌──────────┐   ┌───┴──────┐
//!                               │   CLI     │   │   HTTP   │
//!                               │ (synapse) │   │  (axum)  │
//!                               └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and wire shapes |
//! | [`extract`] | PDF → ordered sections |
//! | [`chunk`] | Sentence-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index with persist/load |
//! | [`retrieve`] | Related-section queries |
//! | [`ingest`] | Per-document ingestion pipeline |
//! | [`cancel`] | Cooperative cancellation token |
//! | [`server`] | JSON HTTP server |

pub mod cancel;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod server;
