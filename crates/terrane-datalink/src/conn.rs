//! DataLink connection: ID negotiation and acknowledged record writes.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::DataLinkError;
use crate::frame::{Frame, PREHEADER_SIZE};

/// Default DataLink port appended when the server address has none.
const DEFAULT_PORT: u16 = 18000;

/// Client configuration; [`connect`][DataLink::connect] yields the live
/// connection.
#[derive(Debug, Clone)]
pub struct DataLink {
    server: String,
    timeout: Duration,
    program: String,
    username: String,
}

impl DataLink {
    pub fn new(server: impl Into<String>) -> DataLink {
        DataLink {
            server: server.into(),
            timeout: Duration::from_secs(5),
            program: "terrane".to_owned(),
            username: "terrane".to_owned(),
        }
    }

    /// Per-command deadline. Zero disables deadlines.
    pub fn with_timeout(mut self, timeout: Duration) -> DataLink {
        self.timeout = timeout;
        self
    }

    /// Program name reported in the ID handshake.
    pub fn with_program(mut self, program: impl Into<String>) -> DataLink {
        self.program = program.into();
        self
    }

    /// Username reported in the ID handshake.
    pub fn with_username(mut self, username: impl Into<String>) -> DataLink {
        self.username = username.into();
        self
    }

    /// Dial the server and negotiate the connection id and capabilities.
    pub async fn connect(&self) -> Result<DlConn, DataLinkError> {
        let address = ensure_port(&self.server, DEFAULT_PORT);
        let stream = deadline(self.timeout, TcpStream::connect(&address)).await?;
        tracing::debug!(server = %address, "datalink connected");

        let mut conn = DlConn {
            stream,
            timeout: self.timeout,
            id: String::new(),
            writable: false,
            packet_size: 0,
        };
        conn.send_id(&self.program, &self.username).await?;
        Ok(conn)
    }
}

/// One negotiated DataLink connection.
///
/// Writes are strictly request/reply; callers sharing a connection across
/// tasks must serialise access themselves.
pub struct DlConn {
    stream: TcpStream,
    timeout: Duration,

    id: String,
    writable: bool,
    packet_size: usize,
}

impl DlConn {
    /// The client identification sent to the server.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the server granted the WRITE capability.
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Negotiated record size; writes must match it exactly.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Send `ID <program>:<username>:<pid>:<os>-<arch>` and fold the
    /// server's reply into the connection capabilities.
    async fn send_id(&mut self, program: &str, username: &str) -> Result<(), DataLinkError> {
        let id = format!(
            "{program}:{username}:{}:{}-{}",
            std::process::id(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        );

        let reply = self.exchange(Frame::command(format!("ID {id}"))).await?;
        self.id = id;

        // reply like: "ID DataLink 2014.269 :: DLPROTO:1.0 PACKETSIZE:512 WRITE"
        let header = reply.header_str();
        if let Some((_, tokens)) = header.split_once("::") {
            for token in tokens.split_whitespace() {
                if token == "WRITE" {
                    self.writable = true;
                } else if let Some(size) = token.strip_prefix("PACKETSIZE:") {
                    self.packet_size = size.parse().map_err(|_| {
                        DataLinkError::Protocol(format!("unparsable packet size: {token}"))
                    })?;
                }
            }
        }

        tracing::debug!(
            writable = self.writable,
            packet_size = self.packet_size,
            "datalink handshake complete"
        );
        Ok(())
    }

    /// Publish one pre-encoded record and wait for the acknowledgement.
    ///
    /// The header carries the stream id, the record's first and last
    /// sample times as epoch microseconds, and the `A` acknowledgement
    /// request the server answers with `OK` or `ERROR`.
    pub async fn write_record(
        &mut self,
        srcname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        data: &[u8],
    ) -> Result<(), DataLinkError> {
        if !self.writable {
            return Err(DataLinkError::NotWritable);
        }
        if data.len() != self.packet_size {
            return Err(DataLinkError::SizeMismatch {
                expected: self.packet_size,
                got: data.len(),
            });
        }

        let header = format!(
            "WRITE {srcname}/MSEED {} {} A {}",
            start.timestamp_micros(),
            end.timestamp_micros(),
            data.len(),
        );

        let reply = self.exchange(Frame::with_body(header, data)).await?;
        let reply_header = reply.header_str();
        if !reply_header.starts_with("OK") {
            return Err(DataLinkError::Protocol(format!(
                "non-OK write acknowledgement: {reply_header}"
            )));
        }
        Ok(())
    }

    /// One framed request/reply exchange, bounded by the command timeout.
    /// An `ERROR` reply surfaces its token and body.
    async fn exchange(&mut self, frame: Frame) -> Result<Frame, DataLinkError> {
        let out = frame.to_bytes()?;
        deadline(self.timeout, self.stream.write_all(&out)).await?;

        let reply = deadline(self.timeout, read_frame(&mut self.stream)).await??;

        let header = reply.header_str();
        if header.is_empty() {
            return Err(DataLinkError::Protocol(
                "empty response header from server".to_owned(),
            ));
        }

        let mut tokens = header.split_whitespace();
        if tokens.next() == Some("ERROR") {
            return Err(DataLinkError::Server {
                token: tokens.next().unwrap_or("unknown").to_owned(),
                body: String::from_utf8_lossy(&reply.body).trim().to_owned(),
            });
        }

        Ok(reply)
    }
}

/// Read one reply frame: preheader, header, then the body sized by the
/// trailing token of an `OK`/`ERROR` header.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Result<Frame, DataLinkError>> {
    let mut preheader = [0u8; PREHEADER_SIZE];
    stream.read_exact(&mut preheader).await?;
    if &preheader[..2] != b"DL" {
        return Ok(Err(DataLinkError::BadFrame("missing DL magic")));
    }

    let mut header = vec![0u8; usize::from(preheader[2])];
    stream.read_exact(&mut header).await?;

    // "OK <value> <size>" / "ERROR <value> <size>" carry <size> body bytes
    let text = String::from_utf8_lossy(&header).into_owned();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let body_len = match tokens.as_slice() {
        ["OK" | "ERROR", .., size] => size.parse().unwrap_or(0),
        _ => 0,
    };

    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        stream.read_exact(&mut body).await?;
    }

    Ok(Ok(Frame { header, body }))
}

/// Bound an I/O future by `timeout`; zero means no deadline.
async fn deadline<T>(
    timeout: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, DataLinkError> {
    if timeout.is_zero() {
        return Ok(fut.await?);
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(DataLinkError::Timeout),
    }
}

fn ensure_port(server: &str, port: u16) -> String {
    if server.contains(':') {
        server.to_owned()
    } else {
        format!("{server}:{port}")
    }
}
