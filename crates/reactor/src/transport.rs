//! The stackable transport filters: plain TCP, TLS with session reuse, and
//! MODE-Z compression.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use modez::zlib::{CompressionLevel, CountingZlibDecoder, CountingZlibEncoder};
use rustls::{ClientConfig, ClientConnection, StreamOwned};

/// A full-duplex byte transport a socket registration is built on. TCP is
/// the base; TLS and MODE-Z each wrap an inner `Transport` to add a layer,
/// matching spec.md §4.2's "stackable filter" design.
pub trait Transport: Read + Write + Send {}
impl<T: Read + Write + Send> Transport for T {}

/// A plain, unencrypted TCP transport.
pub struct TcpTransport(TcpStream);

impl TcpTransport {
    /// Wraps an already-connected [`TcpStream`].
    #[must_use]
    pub const fn new(stream: TcpStream) -> Self {
        Self(stream)
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// A TLS transport over an inner [`Transport`], built from an established
/// [`rustls::ClientConnection`]. Constructed either fresh (a full
/// handshake) or by cloning the parent control connection's
/// [`rustls::ClientConnection`] session state, which is how the data
/// connection satisfies spec.md §4.2's "session reuse from a parent
/// socket" requirement: the caller resumes the parent's session ticket
/// when building the `ClientConnection` passed in here, and this type just
/// drives whatever connection it is given.
pub struct TlsTransport<T: Transport> {
    inner: StreamOwned<ClientConnection, T>,
}

impl<T: Transport> TlsTransport<T> {
    /// Wraps `inner` in a TLS session described by `connection`.
    #[must_use]
    pub fn new(connection: ClientConnection, inner: T) -> Self {
        Self { inner: StreamOwned::new(connection, inner) }
    }

    /// Returns the negotiated session, for extracting session-resumption
    /// state to pass to a data connection's [`Self::new`] call.
    #[must_use]
    pub fn connection(&self) -> &ClientConnection {
        &self.inner.conn
    }
}

impl<T: Transport> Read for TlsTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Transport> Write for TlsTransport<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Builds a [`ClientConfig`] suitable for an FTPS control or data
/// connection from a caller-supplied `roots` store (the bundled
/// `webpki-roots` trust anchors in production, an in-process test
/// root for the loopback test double); TLS 1.2 and 1.3 are both
/// permitted since many FTP servers still only offer 1.2.
#[must_use]
pub fn default_tls_client_config(roots: rustls::RootCertStore) -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

struct ReadHalf<T: Transport>(Arc<Mutex<T>>);
struct WriteHalf<T: Transport>(Arc<Mutex<T>>);

impl<T: Transport> Read for ReadHalf<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.lock().expect("transport mutex poisoned").read(buf)
    }
}

impl<T: Transport> Write for WriteHalf<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("transport mutex poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().expect("transport mutex poisoned").flush()
    }
}

/// A MODE-Z transport over an inner [`Transport`]: deflates on write,
/// inflates on read, per spec.md §4.2.
pub struct ModeZTransport<T: Transport> {
    encoder: CountingZlibEncoder<WriteHalf<T>>,
    decoder: CountingZlibDecoder<ReadHalf<T>>,
}

impl<T: Transport> ModeZTransport<T> {
    /// Wraps `inner`, compressing writes at `level` and decompressing
    /// reads.
    #[must_use]
    pub fn new(inner: T, level: CompressionLevel) -> Self {
        let shared = Arc::new(Mutex::new(inner));
        let encoder = CountingZlibEncoder::with_sink(WriteHalf(Arc::clone(&shared)), level);
        let decoder = CountingZlibDecoder::new(ReadHalf(shared));
        Self { encoder, decoder }
    }

    /// Total compressed bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.encoder.bytes_written()
    }

    /// Total decompressed bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.decoder.bytes_read()
    }
}

impl<T: Transport> Read for ModeZTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

impl<T: Transport> Write for ModeZTransport<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct DuplexCursor {
        write_buf: Vec<u8>,
        read_buf: Cursor<Vec<u8>>,
    }

    impl Read for DuplexCursor {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.read_buf.read(buf)
        }
    }

    impl Write for DuplexCursor {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_buf.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn modez_transport_compresses_writes_and_is_readable_independently() {
        let compressed_input = modez::zlib::compress_to_vec(b"round trip payload", CompressionLevel::Default).unwrap();
        let duplex = DuplexCursor { write_buf: Vec::new(), read_buf: Cursor::new(compressed_input) };
        let mut transport = ModeZTransport::new(duplex, CompressionLevel::Default);

        transport.write_all(b"hello").unwrap();
        transport.flush().unwrap();
        assert!(transport.bytes_written() > 0);

        let mut decoded = Vec::new();
        transport.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, b"round trip payload");
    }
}
