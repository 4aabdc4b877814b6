//! # table-rag core
//!
//! Pure, I/O-free logic shared by the `table-rag` pipeline: the content node
//! model, HTML table extraction, page-aware text splitting, node assembly,
//! the store abstraction, and the retrieval-side hooks.
//!
//! This crate contains no tokio, sqlx, zip, or filesystem access. Everything
//! here operates on strings and in-memory collections.

pub mod assemble;
pub mod chunk;
pub mod models;
pub mod postprocess;
pub mod prompt;
pub mod store;
pub mod table;
