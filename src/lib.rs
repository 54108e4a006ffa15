//! # docrag
//!
//! Retrieval-augmented question answering over PDFs and images.
//!
//! Uploaded documents are run through text-layer extraction, table
//! detection and OCR; the resulting chunks are embedded and stored in a
//! flat L2 index persisted as a snapshot on disk. Questions are answered
//! by retrieving the nearest chunks and handing them to an LLM; fields can
//! be compared across documents as a Markdown table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Uploads    │──▶│   Extract    │──▶│ Embed+Index  │
//! │ PDF / image │   │ text/tbl/OCR │   │  (snapshot)  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │  Query   │         │ Compare  │
//!                 │ + LLM    │         │  table   │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Chunks, uploads, ingestion outcomes |
//! | [`error`] | Typed pipeline errors |
//! | [`extract`] | PDF and image extraction |
//! | [`ocr`] | Tesseract / pdftoppm wrappers |
//! | [`table`] | Table detection from glyph positions |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat L2 vector index |
//! | [`store`] | Snapshot persistence |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Retrieval and answer generation |
//! | [`compare`] | Field comparison table |
//! | [`generation`] | LLM provider abstraction |
//! | [`server`] | HTTP server |
//! | [`stats`] | Snapshot summary |
//! | [`logging`] | Tracing subscriber setup |

pub mod compare;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod ocr;
pub mod query;
pub mod server;
pub mod stats;
pub mod store;
pub mod table;
