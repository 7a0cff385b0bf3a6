//! Transport trait with a default TCP implementation
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
#[cfg(feature = "tls")]
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use url::Url;

use crate::error::{HttpError, Result, TimeoutPhase};

/// URL scheme understood by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP
    Http,
    /// TLS over TCP
    Https,
}

/// Where a connection should go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Scheme
    pub scheme: Scheme,
    /// Host name or IP literal, without brackets
    pub host: String,
    /// Port, defaulted from the scheme
    pub port: u16,
}

impl Target {
    /// Extract the connection target from a request URL
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(HttpError::Connect(format!("unsupported scheme: {}", other))),
        };
        let host = match url.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            Some(url::Host::Ipv4(addr)) => addr.to_string(),
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(HttpError::Connect(format!("URL has no host: {}", url))),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::Connect(format!("URL has no port: {}", url)))?;

        Ok(Self { scheme, host, port })
    }
}

/// An open, exclusively owned byte stream to a server
///
/// Dropping the connection releases it.
pub trait Connection: Read + Write + Send + Debug {
    /// Bound the next blocking read; `None` blocks indefinitely
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Expected connection provider
pub trait Transport: Send + Sync + Debug {
    /// Open a new connection to `target` within `timeout`
    ///
    /// Implementations report an expired budget as
    /// `HttpError::Timeout(TimeoutPhase::Connect)` and every other failure as
    /// `HttpError::Connect`.
    fn connect(&self, target: &Target, timeout: Option<Duration>) -> Result<Box<dyn Connection>>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Default transport over `std::net`, with TLS when the `tls` feature is on
#[derive(Clone)]
pub struct TcpTransport {
    #[cfg(feature = "tls")]
    tls: Arc<rustls::ClientConfig>,
}

impl Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TCP transport")
    }
}

impl TcpTransport {
    /// Create a transport trusting the bundled web PKI roots
    #[cfg(feature = "tls")]
    pub fn new() -> Result<Self> {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| HttpError::Build(format!("TLS configuration: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self::with_tls_config(Arc::new(config)))
    }

    /// Create a plain TCP transport
    #[cfg(not(feature = "tls"))]
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    /// Create a transport using a caller supplied TLS configuration
    #[cfg(feature = "tls")]
    pub fn with_tls_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self { tls: config }
    }

    fn connect_tcp(target: &Target, deadline: Option<Instant>) -> Result<TcpStream> {
        let addrs = resolve(target, deadline)?;

        let mut last_error = None;
        for addr in addrs {
            let attempt = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(HttpError::Timeout(TimeoutPhase::Connect));
                    }
                    TcpStream::connect_timeout(&addr, remaining)
                }
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => {
                    tracing::trace!("Connected to {}", addr);
                    if let Err(err) = stream.set_nodelay(true) {
                        tracing::debug!("Could not disable Nagle on {}: {}", addr, err);
                    }
                    return Ok(stream);
                }
                Err(err) => {
                    tracing::debug!("Connect to {} failed: {}", addr, err);
                    last_error = Some(err);
                }
            }
        }

        Err(map_connect_error(last_error))
    }
}

impl Transport for TcpTransport {
    fn connect(&self, target: &Target, timeout: Option<Duration>) -> Result<Box<dyn Connection>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let stream = Self::connect_tcp(target, deadline)?;

        match target.scheme {
            Scheme::Http => Ok(Box::new(stream)),
            #[cfg(feature = "tls")]
            Scheme::Https => {
                let remaining =
                    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
                Ok(Box::new(tls::handshake(
                    self.tls.clone(),
                    target,
                    stream,
                    remaining,
                )?))
            }
            #[cfg(not(feature = "tls"))]
            Scheme::Https => Err(HttpError::Connect(
                "https requires the `tls` feature".to_string(),
            )),
        }
    }
}

/// Resolve `target`, giving up once `deadline` passes
///
/// A bounded lookup runs on a helper thread; when the deadline wins, that
/// thread finishes the system lookup on its own and its answer is dropped.
fn resolve(target: &Target, deadline: Option<Instant>) -> Result<Vec<SocketAddr>> {
    if let Ok(ip) = target.host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, target.port)]);
    }

    let Some(deadline) = deadline else {
        return lookup(&target.host, target.port);
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(HttpError::Timeout(TimeoutPhase::Connect));
    }

    let (tx, rx) = mpsc::channel();
    let host = target.host.clone();
    let port = target.port;
    thread::Builder::new()
        .name("minihttp-resolve".to_string())
        .spawn(move || {
            // The receiver is gone once the deadline passed
            let _ = tx.send(lookup(&host, port));
        })
        .map_err(|e| HttpError::Connect(format!("failed to start resolver: {}", e)))?;

    match rx.recv_timeout(remaining) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::debug!("Resolving {} exceeded the connect timeout", target.host);
            Err(HttpError::Timeout(TimeoutPhase::Connect))
        }
        Err(RecvTimeoutError::Disconnected) => Err(HttpError::Connect(format!(
            "resolver for {} exited without an answer",
            target.host
        ))),
    }
}

fn lookup(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| HttpError::Connect(format!("failed to resolve {}: {}", host, e)))?
        .collect();
    if addrs.is_empty() {
        return Err(HttpError::Connect(format!("no addresses found for {}", host)));
    }
    Ok(addrs)
}

fn map_connect_error(err: Option<io::Error>) -> HttpError {
    match err {
        Some(err)
            if matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) =>
        {
            HttpError::Timeout(TimeoutPhase::Connect)
        }
        Some(err) => HttpError::Connect(err.to_string()),
        None => HttpError::Connect("no address could be reached".to_string()),
    }
}

#[cfg(feature = "tls")]
mod tls {
    use std::io::{self, Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;
    use std::time::Duration;

    use rustls::pki_types::ServerName;
    use rustls::{ClientConfig, ClientConnection, StreamOwned};

    use super::{Connection, Target};
    use crate::error::{HttpError, Result, TimeoutPhase};

    /// TLS session over a TCP stream
    #[derive(Debug)]
    pub(super) struct TlsConnection {
        stream: StreamOwned<ClientConnection, TcpStream>,
    }

    pub(super) fn handshake(
        config: Arc<ClientConfig>,
        target: &Target,
        mut sock: TcpStream,
        timeout: Option<Duration>,
    ) -> Result<TlsConnection> {
        if timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(HttpError::Timeout(TimeoutPhase::Connect));
        }

        let server_name = ServerName::try_from(target.host.clone())
            .map_err(|e| HttpError::Connect(format!("invalid TLS server name: {}", e)))?;
        let mut conn = ClientConnection::new(config, server_name)
            .map_err(|e| HttpError::Connect(format!("TLS setup failed: {}", e)))?;

        sock.set_read_timeout(timeout).map_err(connect_io)?;
        sock.set_write_timeout(timeout).map_err(connect_io)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(connect_io)?;
        }
        sock.set_read_timeout(None).map_err(connect_io)?;
        sock.set_write_timeout(None).map_err(connect_io)?;

        Ok(TlsConnection {
            stream: StreamOwned::new(conn, sock),
        })
    }

    fn connect_io(err: io::Error) -> HttpError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                HttpError::Timeout(TimeoutPhase::Connect)
            }
            _ => HttpError::Connect(format!("TLS handshake failed: {}", err)),
        }
    }

    impl Read for TlsConnection {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.stream.read(buf)
        }
    }

    impl Write for TlsConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.stream.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.stream.flush()
        }
    }

    impl Connection for TlsConnection {
        fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
            self.stream.sock.set_read_timeout(timeout)
        }
    }
}
