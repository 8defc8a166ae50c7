//! Watch mode: full rebuild on debounced filesystem changes.

pub mod events;
pub mod runtime;

pub use events::{ChangeEvent, WatchConfig};
pub use runtime::WatchDaemon;
