//! Best-effort detection of a server's path-type family from its banner
//! and `SYST` reply.

use crate::path::PathType;

/// A detected server family: the [`PathType`] to use for path arithmetic
/// plus a short hint describing what triggered the match, for logging.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerFamilyHint {
    /// The path-type arithmetic to apply for this connection.
    pub path_type: PathType,
    /// A short human-readable description of the signal that was matched,
    /// e.g. `"SYST: VMS"`.
    pub hint: &'static str,
}

/// Inspects a `220` greeting and a `215` `SYST` reply to guess the
/// server's [`PathType`]. `SYST` is authoritative when recognised;
/// otherwise the greeting text is scanned for well-known server banners.
/// Falls back to [`PathType::Unknown`] if nothing matches.
#[must_use]
pub fn detect_server_family(greeting: &str, syst_reply: &str) -> ServerFamilyHint {
    let syst_upper = syst_reply.to_ascii_uppercase();

    // Checked before the plain "VMS" match below since "OPENVMS" contains
    // "VMS" as a substring.
    if syst_upper.contains("OPENVMS") {
        return ServerFamilyHint { path_type: PathType::OpenVms, hint: "SYST: OpenVMS" };
    }
    if syst_upper.contains("VMS") {
        return ServerFamilyHint { path_type: PathType::Vms, hint: "SYST: VMS" };
    }
    if syst_upper.contains("OS/400") || syst_upper.contains("AS/400") {
        return ServerFamilyHint { path_type: PathType::As400, hint: "SYST: OS/400" };
    }
    if syst_upper.contains("TANDEM") || syst_upper.contains("GUARDIAN") || syst_upper.contains("NONSTOP") {
        return ServerFamilyHint { path_type: PathType::Tandem, hint: "SYST: Tandem/NonStop" };
    }
    if syst_upper.contains("MVS") {
        return ServerFamilyHint { path_type: PathType::Mvs, hint: "SYST: MVS" };
    }
    if syst_upper.contains("WINDOWS") || syst_upper.contains("WIN32") {
        return ServerFamilyHint { path_type: PathType::Dos, hint: "SYST: Windows" };
    }
    if syst_upper.contains("UNIX") || syst_upper.contains("L8") {
        return ServerFamilyHint { path_type: PathType::Unix, hint: "SYST: UNIX" };
    }

    let greeting_upper = greeting.to_ascii_uppercase();
    if greeting_upper.contains("MICROSOFT FTP SERVICE") {
        return ServerFamilyHint { path_type: PathType::Dos, hint: "greeting: Microsoft FTP Service" };
    }
    if greeting_upper.contains("OPENVMS") {
        return ServerFamilyHint { path_type: PathType::OpenVms, hint: "greeting: OpenVMS" };
    }

    ServerFamilyHint { path_type: PathType::Unknown, hint: "no match; defaulting to Unix rules" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unix_from_syst() {
        let hint = detect_server_family("220 Ready", "215 UNIX Type: L8");
        assert_eq!(hint.path_type, PathType::Unix);
    }

    #[test]
    fn detects_windows_from_syst() {
        let hint = detect_server_family("220 Ready", "215 Windows_NT");
        assert_eq!(hint.path_type, PathType::Dos);
    }

    #[test]
    fn detects_vms_from_syst() {
        let hint = detect_server_family("220 Ready", "215 VMS");
        assert_eq!(hint.path_type, PathType::Vms);
    }

    #[test]
    fn detects_openvms_from_syst_distinct_from_plain_vms() {
        let hint = detect_server_family("220 Ready", "215 OpenVMS V8.4");
        assert_eq!(hint.path_type, PathType::OpenVms);
    }

    #[test]
    fn detects_mvs_from_syst() {
        let hint = detect_server_family("220 Ready", "215 MVS is the operating system of this server");
        assert_eq!(hint.path_type, PathType::Mvs);
    }

    #[test]
    fn detects_tandem_from_syst() {
        let hint = detect_server_family("220 Ready", "215 TANDEM/NSK GUARDIAN");
        assert_eq!(hint.path_type, PathType::Tandem);
    }

    #[test]
    fn detects_windows_from_greeting_when_syst_is_uninformative() {
        let hint = detect_server_family("220 Microsoft FTP Service", "215 UNKNOWN Type: L8");
        assert_eq!(hint.path_type, PathType::Dos);
    }

    #[test]
    fn falls_back_to_unknown() {
        let hint = detect_server_family("220 hello", "215 FooOS");
        assert_eq!(hint.path_type, PathType::Unknown);
    }
}
