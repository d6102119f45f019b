//! SeedLink connection: command exchange and packet framing over TCP.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::SeedLinkError;
use crate::info::Info;
use crate::packet::{Packet, PACKET_SIZE};

/// Command timestamps: `YYYY,MM,DD,HH,MM,SS` in UTC.
const TIME_FORMAT: &str = "%Y,%m,%d,%H,%M,%S";

const CRLF: &str = "\r\n";

/// Default SeedLink port appended when the server address has none.
const DEFAULT_PORT: u16 = 18000;

/// INFO levels and the capability each one requires.
const INFO_LEVELS: &[(&str, &str)] = &[
    ("ID", "info:id"),
    ("CAPABILITIES", "info:capabilities"),
    ("STATIONS", "info:stations"),
    ("STREAMS", "info:streams"),
    ("GAPS", "info:gaps"),
    ("CONNECTIONS", "info:connections"),
    ("ALL", "info:all"),
];

/// One negotiated connection to a SeedLink server.
///
/// Commands are bounded by the per-command timeout; packet reads survive a
/// deadline expiry without losing a partially received frame.
pub struct Conn {
    stream: TcpStream,
    timeout: Duration,

    raw_version: String,
    version: (u32, u32),
    capabilities: HashSet<String>,

    // partial packet carried across a read deadline
    buf: Box<[u8; PACKET_SIZE]>,
    filled: usize,
}

impl Conn {
    /// Dial the server and run the capability handshake: HELLO, then
    /// INFO CAPABILITIES.
    pub async fn connect(server: &str, timeout: Duration) -> Result<Conn, SeedLinkError> {
        let address = ensure_port(server, DEFAULT_PORT);
        let stream = deadline(timeout, TcpStream::connect(&address)).await?;
        tracing::debug!(server = %address, "seedlink connected");

        let mut conn = Conn {
            stream,
            timeout,
            raw_version: String::new(),
            version: (0, 0),
            capabilities: HashSet::new(),
            buf: Box::new([0u8; PACKET_SIZE]),
            filled: 0,
        };
        conn.handshake().await?;
        Ok(conn)
    }

    /// Server banner from HELLO, verbatim.
    pub fn raw_version(&self) -> &str {
        &self.raw_version
    }

    /// Protocol `(major, minor)` parsed from the banner, `(0, 0)` when the
    /// banner did not carry one.
    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    async fn handshake(&mut self) -> Result<(), SeedLinkError> {
        let hello = self.text_command("HELLO").await?;
        self.version = parse_version(&hello);

        // banner line: "SeedLink v3.1 (...) :: SLPROTO:3.1 CAP NSWILDCARD ..."
        if let Some(first) = hello.split(CRLF).next() {
            if let Some((_, tokens)) = first.split_once("::") {
                self.capabilities
                    .extend(tokens.split_whitespace().map(str::to_owned));
            }
        }
        self.raw_version = hello;

        let raw = self.info_command("INFO CAPABILITIES").await?;
        let info = Info::parse(&raw)?;
        self.capabilities.extend(info.capabilities);

        tracing::debug!(
            version = ?self.version,
            capabilities = self.capabilities.len(),
            "seedlink handshake complete"
        );
        Ok(())
    }

    // ── Raw exchanges ────────────────────────────────────────────────────────

    async fn send_line(&mut self, command: &str) -> Result<(), SeedLinkError> {
        let line = format!("{command}{CRLF}");
        deadline(self.timeout, self.stream.write_all(line.as_bytes())).await?;
        Ok(())
    }

    /// Send a command and read one free-form text reply.
    async fn text_command(&mut self, command: &str) -> Result<String, SeedLinkError> {
        self.send_line(command).await?;

        let mut reply = [0u8; 512];
        let n = deadline(self.timeout, self.stream.read(&mut reply)).await?;
        let text = String::from_utf8_lossy(&reply[..n]).into_owned();

        if text.starts_with("ERROR") {
            return Err(SeedLinkError::Command {
                command: command.to_owned(),
                reply: text.trim().to_owned(),
            });
        }
        Ok(text)
    }

    /// Send a handshake-modifier command that must be acknowledged `OK`.
    async fn modifier_command(&mut self, command: &str) -> Result<(), SeedLinkError> {
        self.send_line(command).await?;

        let mut reply = [0u8; 512];
        let n = deadline(self.timeout, self.stream.read(&mut reply)).await?;
        let text = String::from_utf8_lossy(&reply[..n]);

        if !text.starts_with("OK") {
            return Err(SeedLinkError::Command {
                command: command.to_owned(),
                reply: text.trim().to_owned(),
            });
        }
        Ok(())
    }

    /// Send an INFO command and concatenate the XML payloads of its
    /// response packets. The response ends at the first packet whose
    /// sequence does not carry the continuation marker.
    async fn info_command(&mut self, command: &str) -> Result<Vec<u8>, SeedLinkError> {
        self.send_line(command).await?;

        let mut payload = Vec::new();
        loop {
            let pkt = self.collect().await?;
            let part = pkt.info_payload();
            let trimmed = part
                .iter()
                .rposition(|&b| b != 0)
                .map_or(&part[..0], |p| &part[..p + 1]);
            payload.extend_from_slice(trimmed);

            if !pkt.is_info_continued() {
                break;
            }
        }
        Ok(payload)
    }

    // ── Protocol commands ────────────────────────────────────────────────────

    /// `STATION station [network]`. Wildcards in either pattern require
    /// the server to advertise `NSWILDCARD`.
    pub async fn command_station(
        &mut self,
        station: &str,
        network: &str,
    ) -> Result<(), SeedLinkError> {
        for pattern in [station, network] {
            if pattern.contains(['*', '?']) && !self.has_capability("NSWILDCARD") {
                tracing::debug!(pattern, "wildcard pattern without NSWILDCARD");
                return Err(SeedLinkError::CapabilityMissing {
                    capability: "NSWILDCARD".to_owned(),
                });
            }
        }
        let command = if network.is_empty() {
            format!("STATION {station}")
        } else {
            format!("STATION {station} {network}")
        };
        self.modifier_command(&command).await
    }

    /// `SELECT selector` for the current station.
    pub async fn command_select(&mut self, selector: &str) -> Result<(), SeedLinkError> {
        self.modifier_command(&format!("SELECT {selector}")).await
    }

    /// `DATA [seq [start]]` resumption for the current station.
    pub async fn command_data(
        &mut self,
        sequence: Option<&str>,
        start: Option<DateTime<Utc>>,
    ) -> Result<(), SeedLinkError> {
        let command = match (sequence, start) {
            (None, _) => "DATA".to_owned(),
            (Some(seq), None) => format!("DATA {seq}"),
            (Some(seq), Some(t)) => format!("DATA {seq} {}", t.format(TIME_FORMAT)),
        };
        self.modifier_command(&command).await
    }

    /// `TIME start [end]` windowed request for the current station.
    pub async fn command_time(
        &mut self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(), SeedLinkError> {
        let command = match end {
            None => format!("TIME {}", start.format(TIME_FORMAT)),
            Some(end) => format!("TIME {} {}", start.format(TIME_FORMAT), end.format(TIME_FORMAT)),
        };
        self.modifier_command(&command).await
    }

    /// `END`: finish the handshake and switch the connection to streaming.
    /// No acknowledgement follows.
    pub async fn command_end(&mut self) -> Result<(), SeedLinkError> {
        self.send_line("END").await
    }

    /// `INFO ID`, used as the keep-alive probe.
    pub async fn command_id(&mut self) -> Result<Vec<u8>, SeedLinkError> {
        self.info_command("INFO ID").await
    }

    /// Request an INFO document by level name, gated on the capability the
    /// server advertised for it.
    pub async fn get_info(&mut self, level: &str) -> Result<Vec<u8>, SeedLinkError> {
        let upper = level.to_uppercase();
        let (name, capability) = INFO_LEVELS
            .iter()
            .find(|(name, _)| *name == upper)
            .ok_or_else(|| SeedLinkError::Protocol(format!("unknown info level: {level}")))?;
        if !self.has_capability(capability) {
            return Err(SeedLinkError::CapabilityMissing {
                capability: (*capability).to_owned(),
            });
        }
        self.info_command(&format!("INFO {name}")).await
    }

    /// [`get_info`][Self::get_info] parsed into an [`Info`] document.
    pub async fn get_info_parsed(&mut self, level: &str) -> Result<Info, SeedLinkError> {
        let raw = self.get_info(level).await?;
        Info::parse(&raw)
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    /// Read the next 520-byte packet, bounded by the per-read deadline.
    ///
    /// A deadline expiry returns [`SeedLinkError::Timeout`] but keeps any
    /// partially received bytes, so the next call resumes the same frame.
    pub async fn collect(&mut self) -> Result<Packet, SeedLinkError> {
        while self.filled < PACKET_SIZE {
            let read = self.stream.read(&mut self.buf[self.filled..]);
            match deadline(self.timeout, read).await? {
                0 => {
                    return Err(SeedLinkError::Protocol(
                        "connection closed by server".to_owned(),
                    ))
                }
                n => self.filled += n,
            }
        }

        self.filled = 0;
        Packet::parse(&self.buf[..])
    }
}

/// Bound an I/O future by `timeout`; zero means no deadline.
async fn deadline<T>(
    timeout: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, SeedLinkError> {
    if timeout.is_zero() {
        return Ok(fut.await?);
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SeedLinkError::Timeout),
    }
}

fn ensure_port(server: &str, port: u16) -> String {
    if server.contains(':') {
        server.to_owned()
    } else {
        format!("{server}:{port}")
    }
}

fn parse_version(banner: &str) -> (u32, u32) {
    let Some(rest) = banner.strip_prefix("SeedLink v") else {
        return (0, 0);
    };
    let mut chars = rest.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(major), Some('.'), Some(minor)) if major.is_ascii_digit() && minor.is_ascii_digit() => (
            major.to_digit(10).unwrap_or(0),
            minor.to_digit(10).unwrap_or(0),
        ),
        _ => (0, 0),
    }
}
