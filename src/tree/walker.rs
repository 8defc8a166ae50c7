//! Directory listing for the index builder
//!
//! Lists one directory level at a time without following symbolic links, and
//! tracks the identity of every directory on the current descent path so a
//! directory reached twice (bind mounts, filesystem loops) is caught instead
//! of recursed into forever.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Walker configuration
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Entry names never included in the tree
    pub skip_names: BTreeSet<String>,
    /// Include entries whose name starts with `.`
    pub include_hidden: bool,
}

impl WalkerConfig {
    fn is_skipped(&self, name: &str) -> bool {
        self.skip_names.contains(name) || (!self.include_hidden && name.starts_with('.'))
    }
}

/// Entry type after symlinks have been filtered out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Directory,
    File,
}

/// One listed entry
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub entry_type: EntryType,
}

/// Something that could not be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingIssue {
    Unreadable { path: PathBuf, reason: String },
    SymlinkSkipped { path: PathBuf },
}

/// Result of listing one directory
#[derive(Debug, Default)]
pub struct Listing {
    pub entries: Vec<DirEntry>,
    pub issues: Vec<ListingIssue>,
}

/// List the immediate entries of `dir`.
///
/// Fails only when `dir` itself cannot be read. Individual entries that
/// cannot be inspected are reported as issues and left out.
pub fn list_dir(dir: &Path, config: &WalkerConfig) -> io::Result<Listing> {
    let mut listing = Listing::default();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let failed_path = e.path().map(Path::to_path_buf);
                if e.depth() == 0 {
                    return Err(e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")));
                }
                listing.issues.push(ListingIssue::Unreadable {
                    path: failed_path.unwrap_or_else(|| dir.to_path_buf()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let name = match entry.file_name().to_str() {
            Some(name) => name.to_string(),
            None => {
                listing.issues.push(ListingIssue::Unreadable {
                    path: entry.path().to_path_buf(),
                    reason: "name is not valid UTF-8".to_string(),
                });
                continue;
            }
        };
        if config.is_skipped(&name) {
            continue;
        }

        let file_type = entry.file_type();
        let entry_type = if file_type.is_symlink() {
            listing.issues.push(ListingIssue::SymlinkSkipped {
                path: entry.path().to_path_buf(),
            });
            continue;
        } else if file_type.is_dir() {
            EntryType::Directory
        } else if file_type.is_file() {
            EntryType::File
        } else {
            continue;
        };

        listing.entries.push(DirEntry {
            name,
            path: entry.into_path(),
            entry_type,
        });
    }

    Ok(listing)
}

/// Stable identity of a directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    Canonical(PathBuf),
}

impl DirIdentity {
    pub fn of(path: &Path) -> io::Result<DirIdentity> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = std::fs::metadata(path)?;
            Ok(DirIdentity::Inode {
                dev: meta.dev(),
                ino: meta.ino(),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(DirIdentity::Canonical(dunce::canonicalize(path)?))
        }
    }
}

/// Directories on the current descent path
#[derive(Debug, Default)]
pub struct AncestorStack {
    stack: Vec<DirIdentity>,
}

impl AncestorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a directory; returns `false` if it is already on the stack.
    pub fn enter(&mut self, identity: DirIdentity) -> bool {
        if self.stack.contains(&identity) {
            return false;
        }
        self.stack.push(identity);
        true
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(listing: &Listing) -> BTreeSet<String> {
        listing.entries.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_lists_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        fs::write(dir.path().join("toc.json"), b"{}").unwrap();

        let config = WalkerConfig {
            skip_names: ["toc.json".to_string()].into_iter().collect(),
            include_hidden: false,
        };
        let listing = list_dir(dir.path(), &config).unwrap();
        assert_eq!(
            names(&listing),
            ["a.pdf".to_string(), "sub".to_string()].into_iter().collect()
        );
        let sub = listing.entries.iter().find(|e| e.name == "sub").unwrap();
        assert_eq!(sub.entry_type, EntryType::Directory);
    }

    #[test]
    fn test_include_hidden() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".notes"), b"x").unwrap();
        let config = WalkerConfig {
            include_hidden: true,
            ..Default::default()
        };
        let listing = list_dir(dir.path(), &config).unwrap();
        assert!(names(&listing).contains(".notes"));
    }

    #[test]
    fn test_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(list_dir(&dir.path().join("nope"), &WalkerConfig::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        let listing = list_dir(dir.path(), &WalkerConfig::default()).unwrap();
        assert_eq!(names(&listing), ["real".to_string()].into_iter().collect());
        assert!(matches!(
            listing.issues.as_slice(),
            [ListingIssue::SymlinkSkipped { .. }]
        ));
    }

    #[test]
    fn test_ancestor_stack_detects_revisit() {
        let dir = TempDir::new().unwrap();
        let mut stack = AncestorStack::new();
        assert!(stack.enter(DirIdentity::of(dir.path()).unwrap()));
        assert!(!stack.enter(DirIdentity::of(dir.path()).unwrap()));
        stack.leave();
        assert_eq!(stack.depth(), 0);
        assert!(stack.enter(DirIdentity::of(dir.path()).unwrap()));
    }
}
