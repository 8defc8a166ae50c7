//! Index tree: node model, filesystem walk, partitioning, and output

pub mod builder;
pub mod listing;
pub mod markdown;
pub mod node;
pub mod ordering;
pub mod partition;
pub mod walker;
pub mod writer;

pub use builder::{BuildOutput, BuildReport, BuildWarning, BuilderConfig, IdentityFn, IndexBuilder};
pub use listing::{build_listing, FileEntry, FileListing};
pub use node::{DocumentNode, NodeKind, StoredContents};
pub use partition::{fragment_locator, FragmentSet, Partitioner};
pub use writer::{IndexWriter, WriteSummary};
pub use walker::DirIdentity;
