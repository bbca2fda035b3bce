//! FTP command construction and wire formatting.

/// A command the control connection can send. Variants cover the command
/// set spec.md §4.1 lists as in scope; arguments are carried pre-encoded
/// for the target path type rather than as raw [`str`]s, since path
/// encoding is [`crate::path`]'s job, not this one's.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// `USER <name>`
    User(String),
    /// `PASS <password>`
    Pass(String),
    /// `ACCT <account>`
    Acct(String),
    /// `SYST`
    Syst,
    /// `FEAT`
    Feat,
    /// `PWD`
    Pwd,
    /// `CWD <path>`
    Cwd(String),
    /// `CDUP`
    Cdup,
    /// `TYPE <code>`, e.g. `A` or `I`.
    Type(char),
    /// `MODE <code>`, e.g. `S` or `Z`.
    Mode(char),
    /// `MKD <path>`
    Mkd(String),
    /// `RMD <path>`
    Rmd(String),
    /// `DELE <path>`
    Dele(String),
    /// `RNFR <path>`
    Rnfr(String),
    /// `RNTO <path>`
    Rnto(String),
    /// `SITE <args>`
    Site(String),
    /// `LIST [path]`
    List(Option<String>),
    /// `NLST [path]`
    Nlst(Option<String>),
    /// `MLSD [path]`
    Mlsd(Option<String>),
    /// `PASV`
    Pasv,
    /// `EPSV`
    Epsv,
    /// `PORT <h1,h2,h3,h4,p1,p2>`
    Port(String),
    /// `EPRT <|proto|addr|port|>`
    Eprt(String),
    /// `RETR <path>`
    Retr(String),
    /// `STOR <path>`
    Stor(String),
    /// `APPE <path>`
    Appe(String),
    /// `REST <offset>`
    Rest(u64),
    /// `SIZE <path>`
    Size(String),
    /// `MDTM <path>`
    Mdtm(String),
    /// `QUIT`
    Quit,
    /// `NOOP`
    Noop,
    /// `AUTH TLS`
    AuthTls,
    /// `PBSZ <size>`
    Pbsz(u64),
    /// `PROT <level>`, e.g. `C` or `P`.
    Prot(char),
    /// `CCC`
    Ccc,
}

/// The wire bytes and the log-safe redacted bytes for a [`Command`].
///
/// `PASS` arguments are replaced with `***` in the log form so credentials
/// never reach a log sink, matching the logging crate's redaction contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormattedCommand {
    /// The literal bytes to write to the control socket, CRLF-terminated.
    pub wire: Vec<u8>,
    /// The bytes safe to pass to a [`crate`]-external log sink.
    pub log: Vec<u8>,
}

/// Formats `cmd` into its wire representation and a redacted logging
/// representation.
#[must_use]
pub fn format(cmd: &Command) -> FormattedCommand {
    let (verb, arg): (&str, Option<String>) = match cmd {
        Command::User(name) => ("USER", Some(name.clone())),
        Command::Pass(password) => ("PASS", Some(password.clone())),
        Command::Acct(account) => ("ACCT", Some(account.clone())),
        Command::Syst => ("SYST", None),
        Command::Feat => ("FEAT", None),
        Command::Pwd => ("PWD", None),
        Command::Cwd(path) => ("CWD", Some(path.clone())),
        Command::Cdup => ("CDUP", None),
        Command::Type(code) => ("TYPE", Some(code.to_string())),
        Command::Mode(code) => ("MODE", Some(code.to_string())),
        Command::Mkd(path) => ("MKD", Some(path.clone())),
        Command::Rmd(path) => ("RMD", Some(path.clone())),
        Command::Dele(path) => ("DELE", Some(path.clone())),
        Command::Rnfr(path) => ("RNFR", Some(path.clone())),
        Command::Rnto(path) => ("RNTO", Some(path.clone())),
        Command::Site(args) => ("SITE", Some(args.clone())),
        Command::List(path) => ("LIST", path.clone()),
        Command::Nlst(path) => ("NLST", path.clone()),
        Command::Mlsd(path) => ("MLSD", path.clone()),
        Command::Pasv => ("PASV", None),
        Command::Epsv => ("EPSV", None),
        Command::Port(arg) => ("PORT", Some(arg.clone())),
        Command::Eprt(arg) => ("EPRT", Some(arg.clone())),
        Command::Retr(path) => ("RETR", Some(path.clone())),
        Command::Stor(path) => ("STOR", Some(path.clone())),
        Command::Appe(path) => ("APPE", Some(path.clone())),
        Command::Rest(offset) => ("REST", Some(offset.to_string())),
        Command::Size(path) => ("SIZE", Some(path.clone())),
        Command::Mdtm(path) => ("MDTM", Some(path.clone())),
        Command::Quit => ("QUIT", None),
        Command::Noop => ("NOOP", None),
        Command::AuthTls => ("AUTH", Some("TLS".to_string())),
        Command::Pbsz(size) => ("PBSZ", Some(size.to_string())),
        Command::Prot(level) => ("PROT", Some(level.to_string())),
        Command::Ccc => ("CCC", None),
    };

    let wire = render(verb, arg.as_deref());
    let log = if matches!(cmd, Command::Pass(_)) {
        render(verb, Some("***"))
    } else {
        wire.clone()
    };

    FormattedCommand { wire, log }
}

fn render(verb: &str, arg: Option<&str>) -> Vec<u8> {
    let mut out = Vec::with_capacity(verb.len() + arg.map_or(0, |a| a.len() + 1) + 2);
    out.extend_from_slice(verb.as_bytes());
    if let Some(arg) = arg {
        out.push(b' ');
        out.extend_from_slice(arg.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_simple_command_without_argument() {
        let formatted = format(&Command::Pwd);
        assert_eq!(formatted.wire, b"PWD\r\n");
    }

    #[test]
    fn formats_command_with_argument() {
        let formatted = format(&Command::Cwd("/pub/incoming".to_string()));
        assert_eq!(formatted.wire, b"CWD /pub/incoming\r\n");
    }

    #[test]
    fn redacts_password_in_log_form_only() {
        let formatted = format(&Command::Pass("hunter2".to_string()));
        assert_eq!(formatted.wire, b"PASS hunter2\r\n");
        assert_eq!(formatted.log, b"PASS ***\r\n");
    }

    #[test]
    fn list_without_path_has_no_trailing_space() {
        let formatted = format(&Command::List(None));
        assert_eq!(formatted.wire, b"LIST\r\n");
    }

    #[test]
    fn list_with_path_includes_it() {
        let formatted = format(&Command::List(Some("-la /pub".to_string())));
        assert_eq!(formatted.wire, b"LIST -la /pub\r\n");
    }

    #[test]
    fn formats_rest_with_numeric_offset() {
        let formatted = format(&Command::Rest(4_096));
        assert_eq!(formatted.wire, b"REST 4096\r\n");
    }

    #[test]
    fn formats_auth_tls_as_two_tokens() {
        let formatted = format(&Command::AuthTls);
        assert_eq!(formatted.wire, b"AUTH TLS\r\n");
    }
}
