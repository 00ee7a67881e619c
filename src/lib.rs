//! # Paperdesk
//!
//! A research assistant backend: fetches arXiv papers per topic through an
//! incremental cache, stores them in SQLite, and answers questions over a
//! topic's papers with retrieval-augmented generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │  arXiv   │──▶│ FetchCache │──▶│  SQLite  │
//! │  (Atom)  │   │ per topic  │   │  store   │
//! └──────────┘   └─────┬──────┘   └────┬─────┘
//!                      │               │
//!                      │        ┌──────┴──────┐
//!                      │        │ ask: embed, │
//!                      │        │ top-k, gen  │
//!                      │        └──────┬──────┘
//!                      ▼               ▼
//!                 ┌──────────┐   ┌──────────┐
//!                 │   CLI    │   │   HTTP   │
//!                 └──────────┘   └──────────┘
//! ```
//!
//! Traits and pure logic (store, source, embedder, generator, flat index)
//! live in the `paperdesk-core` crate; this crate wires them to SQLite,
//! reqwest, and axum.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`arxiv`] | arXiv Atom feed client |
//! | [`cache`] | Incremental per-topic fetch cache |
//! | [`fetch`] | Batch topic acquisition |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text generation providers |
//! | [`ask`] | Retrieval-augmented question answering |
//! | [`topics`] | Topic and document listings |
//! | [`export`] | JSON interchange files |
//! | [`server`] | HTTP API |

pub mod arxiv;
pub mod ask;
pub mod cache;
pub mod config;
pub mod db;
pub mod embedding;
pub mod export;
pub mod fetch;
pub mod generation;
pub mod migrate;
pub mod retry;
pub mod server;
pub mod sqlite_store;
pub mod topics;
