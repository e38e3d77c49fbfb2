//! Server Name Indication extraction from a TLS ClientHello.
//!
//! # Responsibilities
//! - Recognise a TLS handshake record carrying a ClientHello
//! - Walk the ClientHello to the `server_name` extension
//! - Tell "not enough bytes yet" apart from "not TLS"

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

const RECORD_HEADER_LEN: usize = 5;
const HANDSHAKE_HEADER_LEN: usize = 4;
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0x00;
/// Largest record payload a peer may send (2^14 plus expansion allowance).
const MAX_RECORD_LEN: usize = 16384 + 2048;

const PEEK_INTERVAL: Duration = Duration::from_millis(5);

/// Outcome of inspecting the first bytes of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SniResult {
    /// Lowercased host name, trailing dot removed.
    Found(String),
    /// A complete ClientHello without a host name.
    NoServerName,
    /// The bytes so far are a valid prefix of a ClientHello.
    NeedMoreData,
    NotTls(String),
}

/// Inspect a buffer holding the start of a client stream.
pub fn inspect(data: &[u8]) -> SniResult {
    let handshake = match collect_handshake(data) {
        Ok(Some(handshake)) => handshake,
        Ok(None) => return SniResult::NeedMoreData,
        Err(reason) => return SniResult::NotTls(reason),
    };

    match parse_client_hello(&handshake) {
        Ok(Some(host)) => SniResult::Found(host),
        Ok(None) => SniResult::NoServerName,
        Err(reason) => SniResult::NotTls(reason),
    }
}

/// Peek at `stream` until the ClientHello is decisive.
///
/// Nothing is consumed from the socket. Fails with `TimedOut` when no
/// decision is reached within `limit` and with `UnexpectedEof` when the
/// client closes first.
pub async fn peek_server_name(stream: &TcpStream, max_bytes: usize, limit: Duration) -> io::Result<SniResult> {
    tokio::time::timeout(limit, peek_until_decisive(stream, max_bytes))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out waiting for ClientHello"))?
}

async fn peek_until_decisive(stream: &TcpStream, max_bytes: usize) -> io::Result<SniResult> {
    let mut buf = vec![0u8; max_bytes];

    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before ClientHello",
            ));
        }

        match inspect(&buf[..n]) {
            SniResult::NeedMoreData if n >= max_bytes => {
                return Ok(SniResult::NotTls(format!("ClientHello exceeds {} bytes", max_bytes)));
            }
            SniResult::NeedMoreData => tokio::time::sleep(PEEK_INTERVAL).await,
            decisive => return Ok(decisive),
        }
    }
}

/// Concatenate handshake record fragments until the first handshake message
/// is complete. `Ok(None)` means more bytes are needed.
fn collect_handshake(mut data: &[u8]) -> Result<Option<Vec<u8>>, String> {
    let mut handshake = Vec::new();

    loop {
        if data.is_empty() {
            return Ok(None);
        }
        if data[0] != CONTENT_TYPE_HANDSHAKE {
            return Err(format!("record type {:#04x} is not a handshake", data[0]));
        }
        if data.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }
        if data[1] != 0x03 {
            return Err(format!("unsupported record version {}.{}", data[1], data[2]));
        }

        let record_len = u16::from_be_bytes([data[3], data[4]]) as usize;
        if record_len == 0 || record_len > MAX_RECORD_LEN {
            return Err(format!("invalid record length {}", record_len));
        }

        let available = &data[RECORD_HEADER_LEN..];
        let take = record_len.min(available.len());
        handshake.extend_from_slice(&available[..take]);

        if handshake.len() >= HANDSHAKE_HEADER_LEN {
            if handshake[0] != HANDSHAKE_CLIENT_HELLO {
                return Err(format!("handshake type {:#04x} is not a ClientHello", handshake[0]));
            }
            let body_len = u32::from_be_bytes([0, handshake[1], handshake[2], handshake[3]]) as usize;
            let total = HANDSHAKE_HEADER_LEN + body_len;
            if handshake.len() >= total {
                handshake.truncate(total);
                return Ok(Some(handshake));
            }
        }

        if take < record_len {
            return Ok(None);
        }
        data = &available[record_len..];
    }
}

/// Bounds-checked reader over the ClientHello body.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.buf.len() < n {
            return Err("truncated ClientHello".to_string());
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn vec8(&mut self) -> Result<&'a [u8], String> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    fn vec16(&mut self) -> Result<&'a [u8], String> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn parse_client_hello(handshake: &[u8]) -> Result<Option<String>, String> {
    let mut r = Reader {
        buf: &handshake[HANDSHAKE_HEADER_LEN..],
    };

    r.take(2)?; // legacy_version
    r.take(32)?; // random
    r.vec8()?; // session id
    r.vec16()?; // cipher suites
    r.vec8()?; // compression methods

    if r.is_empty() {
        return Ok(None);
    }

    let mut extensions = Reader { buf: r.vec16()? };
    while !extensions.is_empty() {
        let kind = extensions.u16()?;
        let body = extensions.vec16()?;
        if kind == EXTENSION_SERVER_NAME {
            return parse_server_name(body);
        }
    }
    Ok(None)
}

fn parse_server_name(body: &[u8]) -> Result<Option<String>, String> {
    let mut outer = Reader { buf: body };
    let mut names = Reader { buf: outer.vec16()? };

    while !names.is_empty() {
        let name_type = names.u8()?;
        let name = names.vec16()?;
        if name_type != NAME_TYPE_HOST_NAME {
            continue;
        }

        let host = std::str::from_utf8(name).map_err(|_| "server name is not valid UTF-8".to_string())?;
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Ok(None);
        }
        return Ok(Some(host));
    }
    Ok(None)
}
