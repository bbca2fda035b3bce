//! Fetching a remote directory listing over a data connection.
//!
//! [`dataconn::download::DownloadConnection`] always routes received
//! bytes to disk through [`diskpool::DiskPool`], which is the wrong shape
//! for a `LIST`/`MLSD` reply: the scheduler needs the bytes parsed into
//! structured entries in memory, not written to a file. This module owns
//! that narrower pipeline instead of stretching the download pipeline to
//! cover it.
//!
//! The control connection's [`control::ControlConnection::send_command`]
//! blocks its caller until the final reply arrives, which for `LIST`
//! only happens after the data connection has delivered every byte and
//! closed. Draining that data connection therefore has to happen from a
//! second thread running concurrently with the blocking `send_command`
//! call; [`std::thread::scope`] gives us that without smuggling
//! `ControlConnection` across an `'static` boundary.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use control::{CancelToken, ControlConnection, DataChannelMode};
use diskpool::EntryKind;
use reactor::{Event, Reactor};
use wire::Command;

use crate::cache::CachedEntry;
use crate::error::SchedulerError;

/// How long to wait for the data connection's `Connected` event before
/// giving up on a listing fetch.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lists `path` on the server `control` is connected to, returning its
/// entries. Always negotiates a passive data connection; spec.md's
/// active-mode fallback is a worker-level concern for transfers and is
/// not exercised here since a listing fetch has no local listener to
/// fall back to.
///
/// # Errors
///
/// Returns [`SchedulerError`] if the `PASV`/`EPSV` negotiation, the data
/// connection, or the `LIST` command itself fails.
pub fn fetch_remote_listing(
    control: &mut ControlConnection,
    reactor: &Reactor,
    control_peer: SocketAddr,
    path: &str,
    cancel: &CancelToken,
) -> Result<Vec<CachedEntry>, SchedulerError> {
    let plan = control.prepare_data_channel(DataChannelMode::Passive { active_fallback_addr: None }, cancel)?;

    let data_addr = match plan.passive_addr {
        Some(wire::addr::PassiveAddr::V4(ip, port)) => SocketAddr::new(ip.into(), port),
        Some(wire::addr::PassiveAddr::SamePeer(port)) => SocketAddr::new(control_peer.ip(), port),
        None => return Err(SchedulerError::Protocol("server offered no passive address for listing".to_string())),
    };

    let (_socket, events) = reactor.connect(data_addr);
    wait_for_connected(&events, CONNECT_TIMEOUT)?;

    let command = Command::List(Some(path.to_string()));
    let (reply_result, raw) = std::thread::scope(|scope| {
        let command_thread = scope.spawn(|| control.send_command(&command, cancel));
        let bytes = drain_until_closed(&events);
        (command_thread.join().expect("listing command thread panicked"), bytes)
    });

    reply_result?;
    // `LIST`'s initial reply only confirms the data connection opened;
    // the server writes its final `226 Transfer complete` only after
    // the data socket closes, which `drain_until_closed` above already
    // waited for. Draining it now keeps the control connection's
    // command/reply pipeline in sync for whatever the caller sends next
    // (spec.md §5: commands and replies are strictly ordered).
    control.read_transfer_reply(cancel)?;
    Ok(parse_listing(&raw))
}

fn wait_for_connected(events: &crossbeam_channel::Receiver<Event>, timeout: Duration) -> Result<(), SchedulerError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SchedulerError::Protocol("timed out opening listing data connection".to_string()));
        }
        match events.recv_timeout(remaining) {
            Ok(Event::Connected { ok: true, .. }) => return Ok(()),
            Ok(Event::Connected { ok: false, err }) => {
                return Err(SchedulerError::Protocol(format!("listing data connection failed: {}", err.unwrap_or_default())));
            }
            Ok(_) => continue,
            Err(_) => return Err(SchedulerError::Protocol("listing data connection channel closed".to_string())),
        }
    }
}

fn drain_until_closed(events: &crossbeam_channel::Receiver<Event>) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        match events.recv_timeout(Duration::from_secs(30)) {
            Ok(Event::BytesRead { data }) => buf.extend_from_slice(&data),
            Ok(Event::Closed { .. }) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    buf
}

/// Parses raw `LIST`/`MLSD`/`NLST` reply bytes into entries, accepting
/// whichever of the three shapes the bytes happen to be in: MLSD's
/// `key=value;...; name` facts, Unix `ls -l` style lines, or bare
/// newline-separated names (`NLST`).
fn parse_listing(raw: &[u8]) -> Vec<CachedEntry> {
    let text = String::from_utf8_lossy(raw);
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.to_ascii_lowercase().starts_with("total "))
        .filter_map(parse_listing_line)
        .collect()
}

fn parse_listing_line(line: &str) -> Option<CachedEntry> {
    if line.contains(';') && line.contains('=') {
        return parse_mlsd_line(line);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() >= 9 && tokens[0].len() == 10 {
        return parse_unix_ls_line(&tokens);
    }

    Some(CachedEntry { name: line.to_string(), kind: EntryKind::File })
}

fn parse_mlsd_line(line: &str) -> Option<CachedEntry> {
    let (facts, name) = line.rsplit_once(' ')?;
    let mut kind = EntryKind::File;
    for fact in facts.split(';') {
        if let Some(value) = fact.strip_prefix("type=").or_else(|| fact.strip_prefix("Type=")) {
            kind = match value.to_ascii_lowercase().as_str() {
                "dir" | "cdir" | "pdir" => EntryKind::Dir,
                _ => EntryKind::File,
            };
        }
    }
    Some(CachedEntry { name: name.to_string(), kind })
}

fn parse_unix_ls_line(tokens: &[&str]) -> Option<CachedEntry> {
    let kind = match tokens[0].as_bytes().first()? {
        b'd' => EntryKind::Dir,
        b'l' => EntryKind::Link,
        _ => EntryKind::File,
    };
    let mut name = tokens[8..].join(" ");
    if kind == EntryKind::Link {
        if let Some((target_name, _)) = name.split_once(" -> ") {
            name = target_name.to_string();
        }
    }
    Some(CachedEntry { name, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_ls_lines() {
        let raw = b"drwxr-xr-x 2 user group 4096 Jan 1 00:00 subdir\n-rw-r--r-- 1 user group  123 Jan 1 00:00 file.txt\n";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], CachedEntry { name: "subdir".into(), kind: EntryKind::Dir });
        assert_eq!(entries[1], CachedEntry { name: "file.txt".into(), kind: EntryKind::File });
    }

    #[test]
    fn parses_unix_ls_symlink_line() {
        let raw = b"lrwxrwxrwx 1 user group 7 Jan 1 00:00 link -> target\n";
        let entries = parse_listing(raw);
        assert_eq!(entries, vec![CachedEntry { name: "link".into(), kind: EntryKind::Link }]);
    }

    #[test]
    fn parses_mlsd_facts() {
        let raw = b"type=dir;modify=20240101000000; subdir\ntype=file;size=123; file.txt\n";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Dir);
        assert_eq!(entries[1].kind, EntryKind::File);
    }

    #[test]
    fn parses_bare_nlst_names() {
        let raw = b"one.txt\ntwo.txt\n";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == EntryKind::File));
    }

    #[test]
    fn skips_total_summary_line() {
        let raw = b"total 8\n-rw-r--r-- 1 user group 1 Jan 1 00:00 a\n";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 1);
    }
}
