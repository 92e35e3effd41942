//! The opening handshake adapter (RFC 6455 Sections 1.3 and 4).
//!
//! The frame codec and connection layers assume an already-upgraded
//! stream; this module is the boundary that produces one. The server side
//! parses and answers the client's GET; the client side generates the GET
//! and verifies the server's 101 response. Transporting the HTTP bytes is
//! left to the caller.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The GUID appended to the client key in the accept computation
/// (RFC 6455 Section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute `Sec-WebSocket-Accept` for a client key:
/// `base64(SHA1(key || GUID))`.
///
/// # Example
///
/// ```
/// use wscore::protocol::handshake::accept_key;
///
/// assert_eq!(
///     accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=",
/// );
/// ```
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh `Sec-WebSocket-Key`: 16 random bytes, base64-encoded.
///
/// # Errors
///
/// `Error::Io` when the system entropy source fails.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::Io(format!("entropy source failed: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Parse header lines into a lowercase-keyed map.
///
/// Duplicates of the listed security-critical headers are rejected:
/// accepting the second occurrence would let a smuggled header override a
/// validated one.
fn parse_headers<'a, I>(lines: I, unique: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if unique.contains(&name.as_str()) && headers.contains_key(&name) {
            return Err(Error::InvalidHandshake(format!("duplicate header: {name}")));
        }
        headers.insert(name, value.trim().to_string());
    }
    Ok(headers)
}

fn reject_crlf(header: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{header} value contains CR or LF"
        )));
    }
    Ok(())
}

/// The client's upgrade request.
///
/// On the server this is parsed from the incoming GET; on the client it is
/// built with [`UpgradeRequest::generate`] and serialized with
/// [`UpgradeRequest::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path, e.g. `/chat`.
    pub path: String,
    /// Host header value.
    pub host: String,
    /// The `Sec-WebSocket-Key` nonce (base64 of 16 bytes).
    pub key: String,
    /// The `Sec-WebSocket-Version` value; must be 13.
    pub version: u8,
    /// Requested subprotocols, in preference order.
    pub protocols: Vec<String>,
}

impl UpgradeRequest {
    /// Build a client-side request with a freshly generated key.
    ///
    /// # Errors
    ///
    /// `Error::Io` when the entropy source fails.
    pub fn generate(host: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            host: host.into(),
            key: generate_key()?,
            version: 13,
            protocols: Vec::new(),
        })
    }

    /// Add a requested subprotocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Parse an upgrade request from raw HTTP bytes.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` when the request is not a well-formed
    /// `GET ... HTTP/1.1` upgrade: wrong method or version, missing or
    /// wrong `Upgrade`/`Connection`/`Host`/`Sec-WebSocket-Key`/
    /// `Sec-WebSocket-Version` headers, or duplicated security-critical
    /// headers.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("request is not UTF-8".into()))?;
        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty request".into()))?;
        let mut parts = request_line.split_whitespace();
        let (method, path, http) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(p), Some(h), None) => (m, p, h),
            _ => return Err(Error::InvalidHandshake("malformed request line".into())),
        };
        if method != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "expected GET, got {method}"
            )));
        }
        if !http.starts_with("HTTP/1.1") {
            return Err(Error::InvalidHandshake(format!(
                "expected HTTP/1.1, got {http}"
            )));
        }

        let headers = parse_headers(
            lines,
            &[
                "host",
                "upgrade",
                "connection",
                "sec-websocket-key",
                "sec-websocket-version",
            ],
        )?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Upgrade header is {upgrade:?}, not websocket"
            )));
        }

        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::InvalidHandshake("missing Connection header".into()))?;
        if !connection.to_ascii_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Connection header is {connection:?}, does not contain upgrade"
            )));
        }

        let host = headers
            .get("host")
            .ok_or_else(|| Error::InvalidHandshake("missing Host header".into()))?
            .clone();
        let key = headers
            .get("sec-websocket-key")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Key header".into()))?
            .clone();
        let version = headers
            .get("sec-websocket-version")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Version header".into()))?
            .parse()
            .map_err(|_| Error::InvalidHandshake("unparseable Sec-WebSocket-Version".into()))?;

        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_string(),
            host,
            key,
            version,
            protocols,
        })
    }

    /// Parse with an upper bound on the raw request size.
    ///
    /// # Errors
    ///
    /// `Error::HandshakeTooLarge` when over `max_size`, otherwise as
    /// [`UpgradeRequest::parse`].
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::HandshakeTooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Self::parse(data)
    }

    /// Enforce the upgrade rules a server must check before accepting:
    /// version 13 and a key that decodes to exactly 16 bytes. A violation
    /// means the server responds 400 and yields no connection.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` on any mismatch.
    pub fn validate(&self) -> Result<()> {
        if self.version != 13 {
            return Err(Error::InvalidHandshake(format!(
                "unsupported Sec-WebSocket-Version: {} (expected 13)",
                self.version
            )));
        }
        match BASE64.decode(&self.key) {
            Ok(decoded) if decoded.len() == 16 => {}
            Ok(decoded) => {
                return Err(Error::InvalidHandshake(format!(
                    "Sec-WebSocket-Key decodes to {} bytes, expected 16",
                    decoded.len()
                )))
            }
            Err(_) => {
                return Err(Error::InvalidHandshake(
                    "Sec-WebSocket-Key is not valid base64".into(),
                ))
            }
        }
        if self.host.is_empty() {
            return Err(Error::InvalidHandshake("empty Host header".into()));
        }
        Ok(())
    }

    /// Serialize the client-side GET request into `buf`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` when a field would inject CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        reject_crlf("path", &self.path)?;
        reject_crlf("Host", &self.host)?;

        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Version: {}\r\n", self.version).as_bytes());
        if !self.protocols.is_empty() {
            let list = self.protocols.join(", ");
            reject_crlf("Sec-WebSocket-Protocol", &list)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {list}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// The server's 101 upgrade response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResponse {
    /// The `Sec-WebSocket-Accept` value.
    pub accept: String,
    /// The selected subprotocol, echoed from the request when present.
    pub protocol: Option<String>,
}

impl UpgradeResponse {
    /// Build the accepting response for a validated request.
    #[must_use]
    pub fn from_request(req: &UpgradeRequest) -> Self {
        Self {
            accept: accept_key(&req.key),
            protocol: req.protocols.first().cloned(),
        }
    }

    /// Serialize the HTTP/101 response into `buf`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` when the subprotocol would inject CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        if let Some(protocol) = &self.protocol {
            reject_crlf("Sec-WebSocket-Protocol", protocol)?;
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {protocol}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Parse the server's response from raw HTTP bytes.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` when the status is not 101 or the
    /// `Upgrade`/`Connection`/`Sec-WebSocket-Accept` headers are missing
    /// or wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("response is not UTF-8".into()))?;
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::InvalidHandshake(format!(
                "expected 101 Switching Protocols, got {status_line:?}"
            )));
        }

        let headers = parse_headers(lines, &["upgrade", "connection", "sec-websocket-accept"])?;

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::InvalidHandshake("missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Upgrade header is {upgrade:?}, not websocket"
            )));
        }
        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::InvalidHandshake("missing Connection header".into()))?;
        if !connection.to_ascii_lowercase().contains("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Connection header is {connection:?}, does not contain upgrade"
            )));
        }
        let accept = headers
            .get("sec-websocket-accept")
            .ok_or_else(|| Error::InvalidHandshake("missing Sec-WebSocket-Accept header".into()))?
            .clone();

        Ok(Self {
            accept,
            protocol: headers.get("sec-websocket-protocol").cloned(),
        })
    }

    /// Client-side check that the server answered the key we sent.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` when the accept value does not match.
    pub fn verify(&self, sent_key: &str) -> Result<()> {
        let expected = accept_key(sent_key);
        if self.accept != expected {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {expected}, got {}",
                self.accept
            )));
        }
        Ok(())
    }
}
