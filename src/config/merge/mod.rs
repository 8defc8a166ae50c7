//! Source composition for `IndexConfig`.

pub mod merge_policy;
pub mod service;
