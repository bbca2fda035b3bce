//! Mirrors a path from one side of a transfer to the other.
//!
//! An operation's root paths (spec.md §3 "root paths") name one remote
//! directory and one local directory; every item underneath either root
//! occupies the same relative position on the other side, except where an
//! autorename (tracked in [`queue::Item::target_name`]) gave it a
//! different final-component name. This module is the one place that
//! arithmetic happens, so [`crate::worker::Worker`] never hand-rolls
//! string surgery on a path inline.

use std::path::{Path, PathBuf};

use wire::path::{is_prefix, PathType};

/// Strips `root` off the front of `full` (remote-side, path-type aware),
/// returning the remainder with any leading separator trimmed. Returns
/// the whole path unchanged if `root` is not actually a prefix, which a
/// caller should treat as "nothing to mirror" rather than panic on, since
/// a racing rename on the server can legitimately move a path out from
/// under an in-flight listing.
#[must_use]
pub fn remote_relative(path_type: PathType, root: &str, full: &str) -> String {
    if !is_prefix(path_type, root, full) {
        return full.to_string();
    }
    full[root.len()..].trim_start_matches(['/', '\\', '.']).to_string()
}

/// Mirrors a remote `full` path (known to live under `remote_root`) onto
/// the local side, rooted at `local_root`.
#[must_use]
pub fn mirror_to_local(path_type: PathType, remote_root: &str, local_root: &Path, full: &str) -> PathBuf {
    let relative = remote_relative(path_type, remote_root, full);
    if relative.is_empty() {
        return local_root.to_path_buf();
    }
    let mut target = local_root.to_path_buf();
    for component in relative.split(['/', '\\']) {
        if !component.is_empty() {
            target.push(component);
        }
    }
    target
}

/// Mirrors a local `full` path (known to live under `local_root`) onto the
/// remote side, rooted at `remote_root`.
#[must_use]
pub fn mirror_to_remote(path_type: PathType, local_root: &Path, remote_root: &str, full: &Path) -> String {
    let relative = full.strip_prefix(local_root).unwrap_or(full);
    let mut target = remote_root.to_string();
    for component in relative.components() {
        if let std::path::Component::Normal(name) = component {
            target = wire::path::append(path_type, &target, &name.to_string_lossy());
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_relative_strips_root_and_separator() {
        let relative = remote_relative(PathType::Unix, "/incoming", "/incoming/sub/file.txt");
        assert_eq!(relative, "sub/file.txt");
    }

    #[test]
    fn remote_relative_returns_whole_path_when_root_does_not_match() {
        let relative = remote_relative(PathType::Unix, "/other", "/incoming/file.txt");
        assert_eq!(relative, "/incoming/file.txt");
    }

    #[test]
    fn mirror_to_local_joins_relative_components() {
        let target = mirror_to_local(PathType::Unix, "/incoming", Path::new("/tmp/dst"), "/incoming/sub/file.txt");
        assert_eq!(target, Path::new("/tmp/dst/sub/file.txt"));
    }

    #[test]
    fn mirror_to_remote_joins_with_path_type_separator() {
        let target = mirror_to_remote(PathType::Unix, Path::new("/tmp/src"), "/incoming", Path::new("/tmp/src/sub/file.txt"));
        assert_eq!(target, "/incoming/sub/file.txt");
    }

    #[test]
    fn mirror_to_local_at_root_returns_root_itself() {
        let target = mirror_to_local(PathType::Unix, "/incoming", Path::new("/tmp/dst"), "/incoming");
        assert_eq!(target, Path::new("/tmp/dst"));
    }
}
