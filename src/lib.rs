//! repolens: incremental git repository indexing into a vector store
//!
//! A sync pass walks a repository, detects changed files by their last
//! commit hash, chunks and embeds the survivors, and upserts the vectors
//! into a per-repository collection. Queries embed natural-language text
//! and return the nearest chunks with their source paths.

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod meta;
pub mod retry;
pub mod revision;
pub mod search;
pub mod store;
pub mod sync;
