//! Integration tests for index building and the navigable consumer

mod build_index;
mod config_load;
mod consumer;
mod support;
