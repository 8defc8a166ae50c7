//! ctd-index: Metadata Resolution and Navigable Index for Document Archives
//!
//! Walks a regulatory document archive, resolves the layered metadata each
//! folder declares, and writes a navigable index that can be split into
//! lazily loaded fragments. The consumer side loads those fragments on
//! demand for expansion and search.

pub mod concurrency;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod text;
pub mod tooling;
pub mod tree;
pub mod watch;
