//! Line-oriented SCPI exchange over a raw socket (port 5025).
//!
//! Every message is terminated by `\n` in both directions. The transport is
//! strictly half-duplex: `query` takes `&mut self`, so a reply is always
//! consumed before the next message can be written.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const SCPI_SOCKET_PORT: u16 = 5025;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_port(host, SCPI_SOCKET_PORT)
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bracket bare IPv6 literals so the output stays a valid socket address.
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

pub struct ScpiTransport<S = TcpStream> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl ScpiTransport<TcpStream> {
    /// Connect to `endpoint`, giving up after `connect_timeout`.
    ///
    /// The same duration is used afterwards to bound every read and write.
    pub async fn open(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Self> {
        let connect = TcpStream::connect((endpoint.host(), endpoint.port()));
        let stream = match timeout(connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(Error::Connection {
                    endpoint: endpoint.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(Error::Connection {
                    endpoint: endpoint.clone(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connection not established within {connect_timeout:?}"),
                    ),
                });
            }
        };

        stream
            .set_nodelay(true)
            .map_err(|source| Error::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;

        info!("connected to {endpoint}");
        Ok(Self::from_stream(stream, connect_timeout))
    }
}

impl<S> ScpiTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_stream(stream: S, io_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout: io_timeout,
        }
    }

    /// Write `text` followed by the line terminator. No reply is read.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        debug!("SCPI write  -> {text}");
        self.write_line(text).await
    }

    /// Write `text` and block until exactly one reply line arrives.
    ///
    /// The returned string has the terminator removed and is otherwise
    /// untouched.
    pub async fn query(&mut self, text: &str) -> Result<String> {
        debug!("SCPI query  -> {text}");
        self.write_line(text).await?;

        let mut raw = Vec::new();
        let read = self.stream.read_until(TERMINATOR, &mut raw);
        match timeout(self.timeout, read).await {
            Err(_) => {
                return Err(Error::Timeout {
                    query: text.to_string(),
                    after: self.timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(Error::transport(format!("reading reply to {text:?}"), e));
            }
            Ok(Ok(_)) => {}
        }

        if raw.last() != Some(&TERMINATOR) {
            return Err(Error::transport(
                format!("reading reply to {text:?}"),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed after {} bytes of an unterminated line", raw.len()),
                ),
            ));
        }
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }

        let line = String::from_utf8(raw).map_err(|e| {
            Error::protocol(
                text,
                String::from_utf8_lossy(e.as_bytes()),
                "reply is not valid UTF-8",
            )
        })?;
        debug!("SCPI result <- {line}");
        Ok(line)
    }

    /// Shut down the write half of the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.stream
            .get_mut()
            .shutdown()
            .await
            .map_err(|e| Error::transport("closing connection", e))
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(TERMINATOR);

        let stream = self.stream.get_mut();
        let write = async {
            stream.write_all(&frame).await?;
            stream.flush().await
        };
        match timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::transport(format!("sending {text:?}"), e)),
            Err(_) => Err(Error::Timeout {
                query: text.to_string(),
                after: self.timeout,
            }),
        }
    }
}
