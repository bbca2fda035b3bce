//! Glob-list matching for spec.md §6's `masks` and `ascii_mask` options.
//!
//! An operation's `masks` decide which entries a directory exploration
//! includes at all; `ascii_mask` decides, under
//! [`TransferModeDefault::Autodetect`], whether a given file name's
//! transfer runs in [`wire::TransferMode::Ascii`] or
//! [`wire::TransferMode::Binary`]. Both are plain glob lists matched
//! against a file's final name component, mirroring the teacher's own
//! `globset`-backed filter crate rather than hand-rolling wildcard
//! matching.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use wire::TransferMode;

/// A compiled glob list, or "match everything" when no patterns were
/// given — the default for an operation that does not restrict its
/// scope at all.
#[derive(Clone, Debug)]
pub struct MaskSet {
    set: Option<GlobSet>,
}

impl MaskSet {
    /// Compiles `patterns` into a matcher. An empty list matches every
    /// name, matching spec.md's "masks" defaulting to unrestricted scope.
    ///
    /// # Errors
    ///
    /// Returns [`globset::Error`] if any pattern is not a valid glob.
    pub fn compile(patterns: &[String]) -> Result<Self, globset::Error> {
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self { set: Some(builder.build()?) })
    }

    /// A matcher that accepts every name, used when an operation sets no
    /// mask at all.
    #[must_use]
    pub const fn match_all() -> Self {
        Self { set: None }
    }

    /// Returns whether `name` matches this mask set.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.set.as_ref().is_none_or(|set| set.is_match(name))
    }
}

/// `transfer_mode_default`, spec.md §6's closed enumeration deciding how
/// a worker picks [`TransferMode`] for a file it has not yet inspected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TransferModeDefault {
    /// Always [`TransferMode::Ascii`].
    Ascii,
    /// Always [`TransferMode::Binary`].
    #[default]
    Binary,
    /// [`TransferMode::Ascii`] for names matching the operation's
    /// `ascii_mask`, [`TransferMode::Binary`] otherwise.
    Autodetect,
}

impl TransferModeDefault {
    /// Resolves the mode to use for a file named `name`, consulting
    /// `ascii_mask` only under [`Self::Autodetect`].
    #[must_use]
    pub fn resolve(self, name: &str, ascii_mask: &MaskSet) -> TransferMode {
        match self {
            Self::Ascii => TransferMode::Ascii,
            Self::Binary => TransferMode::Binary,
            Self::Autodetect => {
                if ascii_mask.is_match(name) {
                    TransferMode::Ascii
                } else {
                    TransferMode::Binary
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_matches_everything() {
        let mask = MaskSet::compile(&[]).unwrap();
        assert!(mask.is_match("anything.bin"));
    }

    #[test]
    fn mask_matches_only_listed_patterns() {
        let mask = MaskSet::compile(&["*.txt".to_string(), "*.log".to_string()]).unwrap();
        assert!(mask.is_match("readme.txt"));
        assert!(mask.is_match("app.log"));
        assert!(!mask.is_match("photo.jpg"));
    }

    #[test]
    fn autodetect_falls_back_to_binary_outside_ascii_mask() {
        let ascii_mask = MaskSet::compile(&["*.txt".to_string()]).unwrap();
        assert_eq!(TransferModeDefault::Autodetect.resolve("a.txt", &ascii_mask), TransferMode::Ascii);
        assert_eq!(TransferModeDefault::Autodetect.resolve("a.bin", &ascii_mask), TransferMode::Binary);
    }

    #[test]
    fn fixed_modes_ignore_the_mask_entirely() {
        let ascii_mask = MaskSet::match_all();
        assert_eq!(TransferModeDefault::Binary.resolve("a.txt", &ascii_mask), TransferMode::Binary);
        assert_eq!(TransferModeDefault::Ascii.resolve("a.bin", &ascii_mask), TransferMode::Ascii);
    }
}
