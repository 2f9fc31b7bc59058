//! # context7-kb
//!
//! Search Context7 documentation libraries, keep their documentation in a local
//! knowledge base, and mirror their source repositories next to it.
//!
//! ## Features
//!
//! - Search and fetch library documentation from the Context7 API
//! - Save documentation as one markdown file per library
//! - Clone or update the GitHub repository referenced by the documentation
//! - Maintain an `INDEX.md` with one section per library
//! - Expose everything as MCP tools over stdio
//!
//! ## Modules
//!
//! - `server`: MCP server implementation and tools
//! - `service`: remote API and knowledge base composed for callers
//! - `sync`: the synchronization pipeline for one fetched document
//! - `index`: the `INDEX.md` document
//! - `storage`: documentation files on disk
//! - `repository`: shallow clone maintenance through git
//! - `document`: text analysis of fetched documentation
//! - `api`: Context7 HTTP client

/// Context7 HTTP client
pub mod api;
/// Runtime configuration
pub mod config;
/// Documentation text analysis
pub mod document;
/// Knowledge base index document
pub mod index;
/// Library identifiers
pub mod library;
/// Repository clone synchronization
pub mod repository;
/// Server implementation and MCP tools
pub mod server;
/// Search, fetch and knowledge base access for the CLI and the server
pub mod service;
/// Documentation file storage
pub mod storage;
/// Synchronization pipeline
pub mod sync;
