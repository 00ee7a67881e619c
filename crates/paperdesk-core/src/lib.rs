//! # Paperdesk Core
//!
//! Runtime-agnostic logic for Paperdesk: paper and topic models, the
//! paper-source and store abstractions, the flat vector index, and the
//! prompt helpers used by the generation step.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Concrete implementations (arXiv client, SQLite store, model providers)
//! live in the `paperdesk` app crate.

pub mod clock;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod models;
pub mod source;
pub mod store;
