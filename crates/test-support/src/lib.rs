#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Shared test fixtures for the FTP engine workspace.
//!
//! Crates that need a scratch directory, a quick way to seed files for the
//! disk worker pool, or a byte-oriented loopback listener for exercising
//! the wire codec and reactor without a real FTP daemon depend on this
//! crate as a dev-dependency.

use std::fs;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A scratch directory that is removed when dropped, with convenience
/// helpers for seeding files the disk worker pool or upload pipeline can
/// operate on.
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates a new empty workspace.
    ///
    /// # Panics
    ///
    /// Panics if a temporary directory cannot be created; this is test-only
    /// infrastructure and failures here indicate a broken test environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
        }
    }

    /// Returns the workspace root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `relative`, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics on any I/O failure, for the same reason as [`Self::new`].
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directories");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Creates an empty directory at `relative`.
    ///
    /// # Panics
    ///
    /// Panics on any I/O failure, for the same reason as [`Self::new`].
    pub fn make_dir(&self, relative: impl AsRef<Path>) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(&path).expect("create fixture directory");
        path
    }

    /// Reads back the contents of `relative` as bytes.
    ///
    /// # Errors
    ///
    /// Returns any [`io::Error`] from the underlying read.
    pub fn read_file(&self, relative: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        fs::read(self.dir.path().join(relative))
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal loopback TCP listener bound to `127.0.0.1:0`, for tests that
/// need to exercise the reactor or control connection against a real
/// socket without depending on an external FTP daemon.
pub struct LoopbackListener {
    listener: TcpListener,
}

impl LoopbackListener {
    /// Binds a new listener on an OS-assigned ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns any [`io::Error`] from the underlying bind.
    pub fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(false)?;
        Ok(Self { listener })
    }

    /// Returns the port the listener is bound to.
    ///
    /// # Panics
    ///
    /// Panics if the listener's local address cannot be read, which would
    /// indicate the socket was closed out from under the test.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("listener has a local address")
            .port()
    }

    /// Accepts one connection and returns the accepted stream.
    ///
    /// # Errors
    ///
    /// Returns any [`io::Error`] from the underlying accept.
    pub fn accept_once(&self) -> io::Result<TcpStream> {
        self.listener.accept().map(|(stream, _)| stream)
    }

    /// Connects a client socket to this listener.
    ///
    /// # Errors
    ///
    /// Returns any [`io::Error`] from the underlying connect.
    pub fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(("127.0.0.1", self.port()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn temp_workspace_round_trips_file_contents() {
        let workspace = TempWorkspace::new();
        workspace.write_file("sub/dir/file.txt", b"hello");
        let contents = workspace.read_file("sub/dir/file.txt").unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn temp_workspace_make_dir_creates_empty_directory() {
        let workspace = TempWorkspace::new();
        let dir = workspace.make_dir("empty");
        assert!(dir.is_dir());
    }

    #[test]
    fn loopback_listener_accepts_a_connection() {
        let listener = LoopbackListener::bind().unwrap();
        let client = listener.connect().unwrap();
        let mut server = listener.accept_once().unwrap();

        let mut client = client;
        client.write_all(b"220 ready\r\n").unwrap();

        let mut buf = [0_u8; 64];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"220 ready\r\n");
    }
}
