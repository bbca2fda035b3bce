//! Path-type arithmetic: component joining/splitting and validity rules
//! that vary across server families.

use crate::error::WireError;

/// The naming convention a server's file system follows, as detected by
/// [`crate::server_family::detect_server_family`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PathType {
    /// `/`-separated, case sensitive. The default assumption.
    Unix,
    /// `\`- or `/`-separated, case preserving but insensitive for
    /// comparison (Windows/DOS FTP servers).
    Dos,
    /// `device:[dir.subdir]name.type;version` (OpenVMS, reached over a
    /// DCL-style shell rather than the dedicated FTP server below).
    Vms,
    /// `/QSYS.LIB/LIB.LIB/FILE.TYPE` style library paths (IBM AS/400).
    As400,
    /// IBM MVS/z-OS dataset naming (`HLQ.QUALIFIER.MEMBER`). No pack
    /// example or teacher speaks this dialect; arithmetic falls back to
    /// [`PathType::Unix`] rules until a real separator/reserved-char table
    /// is grounded.
    Mvs,
    /// HP NonStop (Tandem) Guardian path naming (`$VOL.SUBVOL.FILE`). Same
    /// fallback caveat as [`Self::Mvs`].
    Tandem,
    /// OpenVMS reached through a dedicated FTP server that reports itself
    /// distinctly from the DCL-shell [`Self::Vms`] case above. Carries the
    /// same `device:[dir]name.type;version` syntax as [`Self::Vms`], kept
    /// as a separate variant so [`crate::server_family::detect_server_family`]
    /// does not need to fold the two detections together.
    OpenVms,
    /// A server family that replied but does not map to any of the above;
    /// path arithmetic falls back to [`PathType::Unix`] rules.
    Unknown,
}

impl PathType {
    fn separator(self) -> char {
        match self {
            Self::Dos => '\\',
            Self::Vms | Self::OpenVms | Self::As400 => '.',
            Self::Unix | Self::Mvs | Self::Tandem | Self::Unknown => '/',
        }
    }

    fn is_case_sensitive(self) -> bool {
        !matches!(self, Self::Dos | Self::Vms | Self::OpenVms)
    }

    fn reserved_chars(self) -> &'static [char] {
        match self {
            Self::Unix | Self::Mvs | Self::Tandem | Self::Unknown => &['/', '\0'],
            Self::Dos => &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\0'],
            Self::Vms | Self::OpenVms => &['[', ']', ':', ';', '\0'],
            Self::As400 => &['/', '\0'],
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Dos => "dos",
            Self::Vms => "vms",
            Self::As400 => "as400",
            Self::Mvs => "mvs",
            Self::Tandem => "tandem",
            Self::OpenVms => "openvms",
            Self::Unknown => "unknown",
        }
    }
}

/// Appends `component` to `base` using `path_type`'s separator, avoiding a
/// doubled separator when `base` already ends with one.
#[must_use]
pub fn append(path_type: PathType, base: &str, component: &str) -> String {
    if base.is_empty() {
        return component.to_string();
    }
    let sep = path_type.separator();
    if base.ends_with(sep) {
        format!("{base}{component}")
    } else {
        format!("{base}{sep}{component}")
    }
}

/// Splits off the final path component, returning `(parent, last)`. The
/// parent retains no trailing separator except for a root path.
#[must_use]
pub fn cut_last(path_type: PathType, path: &str) -> (String, String) {
    let sep = path_type.separator();
    match path.rfind(sep) {
        None => (String::new(), path.to_string()),
        Some(0) => (sep.to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
    }
}

/// Returns whether `prefix` is a path-prefix of `path` at a separator
/// boundary (so `/pub` is a prefix of `/pub/incoming` but not of
/// `/published`).
#[must_use]
pub fn is_prefix(path_type: PathType, prefix: &str, path: &str) -> bool {
    let (prefix, path) = normalize_case(path_type, prefix, path);
    if !path.starts_with(prefix.as_str()) {
        return false;
    }
    if prefix.len() == path.len() {
        return true;
    }
    let sep = path_type.separator();
    prefix.ends_with(sep) || path[prefix.len()..].starts_with(sep)
}

/// Returns whether two paths denote the same location under `path_type`'s
/// comparison rules (case-insensitive for [`PathType::Dos`] and
/// [`PathType::Vms`]).
#[must_use]
pub fn is_same(path_type: PathType, a: &str, b: &str) -> bool {
    let (a, b) = normalize_case(path_type, a, b);
    a == b
}

fn normalize_case(path_type: PathType, a: &str, b: &str) -> (String, String) {
    if path_type.is_case_sensitive() {
        (a.to_string(), b.to_string())
    } else {
        (a.to_lowercase(), b.to_lowercase())
    }
}

/// Validates that `component` can be used as a single path component under
/// `path_type`'s rules: non-empty and free of that family's reserved
/// characters.
///
/// # Errors
///
/// Returns [`WireError::InvalidPathComponent`] if the component is empty
/// or contains a reserved character.
pub fn is_valid_component(path_type: PathType, component: &str) -> Result<(), WireError> {
    if component.is_empty() || component.chars().any(|c| path_type.reserved_chars().contains(&c)) {
        return Err(WireError::InvalidPathComponent {
            component: component.to_string(),
            path_type: path_type.label().to_string(),
        });
    }
    Ok(())
}

/// Formats a directory name in VMS's `[dir]` bracket notation, as required
/// when building a `CWD` argument against a [`PathType::Vms`] server.
#[must_use]
pub fn make_vms_dir_name(dir: &str) -> String {
    format!("[{dir}]")
}

/// Splits an AS/400 `QSYS.LIB` style path (`/QSYS.LIB/LIB.LIB/FILE.TYPE`)
/// into its library, file, and member components.
#[must_use]
pub fn split_qsys_path(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split('/')
        .map(str::to_string)
        .collect()
}

/// Joins AS/400 `QSYS.LIB` path segments back into a single path string.
#[must_use]
pub fn join_qsys_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_unix_component() {
        assert_eq!(append(PathType::Unix, "/pub", "incoming"), "/pub/incoming");
        assert_eq!(append(PathType::Unix, "/pub/", "incoming"), "/pub/incoming");
    }

    #[test]
    fn appends_dos_component_with_backslash() {
        assert_eq!(append(PathType::Dos, "C:\\pub", "incoming"), "C:\\pub\\incoming");
    }

    #[test]
    fn cuts_last_component() {
        assert_eq!(
            cut_last(PathType::Unix, "/pub/incoming/file.txt"),
            ("/pub/incoming".to_string(), "file.txt".to_string())
        );
    }

    #[test]
    fn cuts_last_component_at_root() {
        assert_eq!(cut_last(PathType::Unix, "/file.txt"), ("/".to_string(), "file.txt".to_string()));
    }

    #[test]
    fn is_prefix_respects_separator_boundary() {
        assert!(is_prefix(PathType::Unix, "/pub", "/pub/incoming"));
        assert!(!is_prefix(PathType::Unix, "/pub", "/published"));
    }

    #[test]
    fn is_same_is_case_insensitive_for_dos() {
        assert!(is_same(PathType::Dos, "C:\\PUB", "c:\\pub"));
        assert!(!is_same(PathType::Unix, "/PUB", "/pub"));
    }

    #[test]
    fn rejects_reserved_characters_per_path_type() {
        assert!(is_valid_component(PathType::Unix, "a/b").is_err());
        assert!(is_valid_component(PathType::Dos, "a:b").is_ok());
        assert!(is_valid_component(PathType::Dos, "a*b").is_err());
        assert!(is_valid_component(PathType::Unix, "").is_err());
    }

    #[test]
    fn mvs_and_tandem_fall_back_to_unix_arithmetic() {
        assert_eq!(append(PathType::Mvs, "/pub", "incoming"), "/pub/incoming");
        assert_eq!(append(PathType::Tandem, "/pub", "incoming"), "/pub/incoming");
        assert!(is_valid_component(PathType::Mvs, "a/b").is_err());
        assert!(is_valid_component(PathType::Tandem, "a.b").is_ok());
    }

    #[test]
    fn openvms_shares_vms_separator_and_case_insensitivity() {
        assert_eq!(append(PathType::OpenVms, "[PUB]", "FILE.TXT"), "[PUB].FILE.TXT");
        assert!(is_same(PathType::OpenVms, "[PUB]FILE.TXT;1", "[pub]file.txt;1"));
    }

    #[test]
    fn formats_vms_dir_name() {
        assert_eq!(make_vms_dir_name("PUB"), "[PUB]");
    }

    #[test]
    fn splits_and_joins_qsys_path() {
        let segments = split_qsys_path("/QSYS.LIB/MYLIB.LIB/MYFILE.FILE");
        assert_eq!(segments, vec!["QSYS.LIB", "MYLIB.LIB", "MYFILE.FILE"]);
        assert_eq!(join_qsys_path(&segments), "/QSYS.LIB/MYLIB.LIB/MYFILE.FILE");
    }
}
