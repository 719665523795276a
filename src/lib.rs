//! # docqa
//!
//! Question answering over a single PDF or DOCX document.
//!
//! A document is fetched once per URL, normalized, split into overlapping
//! word windows, embedded, and held in an in-memory vector index. Each
//! question is embedded, scored against the index, given a context of the
//! most similar chunks (or the document's opening chunks when retrieval is
//! weak), and answered by an LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ DocumentSrc  │──▶│ Chunk+Embed │──▶│ VectorIndex  │ (cached per URL)
//! │ HTTP / file  │   │             │   │              │
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │
//!                    ┌────────────────────────┤
//!                    ▼                        ▼
//!             ┌─────────────┐          ┌─────────────┐
//!             │  Relevance  │          │   Context   │
//!             └──────┬──────┘          └──────┬──────┘
//!                    └──────────┬─────────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │  Answerer   │
//!                        └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa check                                   # validate configuration
//! docqa ask ./policy.pdf -q "What is the grace period?"
//! docqa serve                                   # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Text normalization and word-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact cosine-similarity vector index |
//! | [`relevance`] | Retrieval confidence analysis |
//! | [`context`] | Context assembly and fallback |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`source`] | Document download and decoding |
//! | [`answer`] | LLM answering |
//! | [`explain`] | Key-clause extraction for explainable answers |
//! | [`cache`] | Per-URL document cache with build locking |
//! | [`pipeline`] | Query orchestration |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod explain;
pub mod extract;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod server;
pub mod source;
