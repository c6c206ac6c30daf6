//! `tcp`: lookups against a remote server over a line-oriented protocol
//!
//! ```text
//! request:  get SPACE quoted-key NEWLINE
//! reply:    DDD SPACE text NEWLINE
//!
//! 2xx  text is the quoted value
//! 4xx  transient error, try again
//! 5xx  not found
//! ```
//!
//! Keys and values are quoted by replacing every byte that is not a visible
//! ASCII character, and `%` itself, with `%XX`.
//!
//! The connection is made on first use and kept open. Any I/O error, protocol
//! violation or 4xx reply closes it and the whole request is retried after a
//! pause, up to a fixed number of attempts. Exhausting the attempts yields a
//! retry error, never a fatal one.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use tracing::{debug, warn};

use super::OpenRequest;
use crate::config::TcpSettings;
use crate::error::{DictError, Result};
use crate::flags::DictFlags;
use crate::owner::Owner;
use crate::table::{Table, TableMeta};

pub const KIND: &str = "tcp";

/// Parsed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Found(String),
    NotFound,
}

/// Why a single attempt failed
#[derive(Debug)]
enum AttemptError {
    Io(std::io::Error),
    Protocol(String),
    Transient(String),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Io(e) => write!(f, "{e}"),
            AttemptError::Protocol(s) => write!(f, "protocol error: {s}"),
            AttemptError::Transient(s) => write!(f, "remote server error: {s}"),
        }
    }
}

impl From<std::io::Error> for AttemptError {
    fn from(e: std::io::Error) -> Self {
        AttemptError::Io(e)
    }
}

#[derive(Debug)]
pub struct TcpTable {
    meta: TableMeta,
    settings: TcpSettings,
    conn: Option<BufReader<TcpStream>>,
}

impl TcpTable {
    pub fn open(req: &OpenRequest<'_>) -> Result<Self> {
        if req.flags.contains(DictFlags::NO_UNAUTH) {
            return Err(DictError::Unavailable {
                table: req.label(),
                reason: "tcp map is not allowed for security-sensitive data".to_string(),
            });
        }
        if !req.mode.is_read_only() {
            return Err(DictError::Unavailable {
                table: req.label(),
                reason: "tcp map requires read-only access".to_string(),
            });
        }
        Ok(Self {
            meta: TableMeta::new(KIND, req.name, req.mode, req.flags | DictFlags::PATTERN)
                .with_owner(Owner::Unknown),
            settings: req.config.tcp.clone(),
            conn: None,
        })
    }

    fn connect(&self) -> std::io::Result<BufReader<TcpStream>> {
        let timeout = self.settings.timeout();
        let mut last_err = None;
        for addr in self.meta.name.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    debug!("{}: connected to {}", self.meta.label(), addr);
                    return Ok(BufReader::new(stream));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses to connect to")
        }))
    }

    fn attempt(&mut self, request: &[u8]) -> std::result::Result<Reply, AttemptError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };
        let conn = self.conn.insert(conn);
        conn.get_mut().write_all(request)?;
        conn.get_mut().flush()?;

        let mut line = Vec::new();
        let limit = self.settings.max_reply_bytes as u64;
        conn.by_ref().take(limit).read_until(b'\n', &mut line)?;
        if line.is_empty() {
            return Err(AttemptError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        if line.last() != Some(&b'\n') {
            return Err(if line.len() as u64 >= limit {
                AttemptError::Protocol(format!("reply exceeds {limit} bytes"))
            } else {
                AttemptError::Io(std::io::ErrorKind::UnexpectedEof.into())
            });
        }
        line.pop();
        parse_reply(&line)
    }
}

/// Parse one reply line (without its newline).
fn parse_reply(line: &[u8]) -> std::result::Result<Reply, AttemptError> {
    let text = String::from_utf8_lossy(line);
    let malformed = || AttemptError::Protocol(format!("malformed reply: \"{}\"", text.trim_end()));
    if line.len() < 4 || !line[..3].iter().all(u8::is_ascii_digit) || line[3] != b' ' {
        return Err(malformed());
    }
    let body = &line[4..];
    match line[0] {
        b'2' => {
            // Invalid UTF-8 is replaced; the reply itself was well-formed.
            let value = unquote(body).ok_or_else(malformed)?;
            Ok(Reply::Found(String::from_utf8_lossy(&value).into_owned()))
        }
        b'4' => Err(AttemptError::Transient(text.into_owned())),
        b'5' => {
            debug!("not found: \"{}\"", text);
            Ok(Reply::NotFound)
        }
        _ => Err(malformed()),
    }
}

impl Table for TcpTable {
    fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut TableMeta {
        &mut self.meta
    }

    fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        let mut request = b"get ".to_vec();
        request.extend_from_slice(quote(key.as_bytes()).as_bytes());
        request.push(b'\n');

        let tries = self.settings.max_tries.max(1);
        for attempt in 1..=tries {
            match self.attempt(&request) {
                Ok(Reply::Found(value)) => return Ok(Some(value)),
                Ok(Reply::NotFound) => return Ok(None),
                Err(e) => {
                    warn!("{}: {} (attempt {}/{})", self.meta.label(), e, attempt, tries);
                    self.conn = None;
                    if attempt < tries {
                        std::thread::sleep(self.settings.retry_delay());
                    }
                }
            }
        }
        Err(DictError::Retry {
            table: self.meta.label(),
            reason: format!("giving up after {tries} attempts"),
        })
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

/// `%XX`-quote bytes that are not visible ASCII, and `%` itself.
pub fn quote(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw {
        if b.is_ascii_graphic() && b != b'%' {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([b]));
        }
    }
    out
}

/// Reverse of [`quote`]; accepts either hex case. `None` on a bad escape.
pub fn unquote(text: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'%' {
            let digits = text.get(i + 1..i + 3)?;
            let byte = hex::decode(digits).ok()?;
            out.extend_from_slice(&byte);
            i += 3;
        } else {
            out.push(text[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote(b"plain"), "plain");
        assert_eq!(quote(b"a b%c\n"), "a%20b%25c%0A");
        assert_eq!(quote("é".as_bytes()), "%C3%A9");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(b"%68%69").unwrap(), b"hi");
        assert_eq!(unquote(b"a%2fb%2Fc").unwrap(), b"a/b/c");
        assert!(unquote(b"bad%2").is_none());
        assert!(unquote(b"bad%zz").is_none());
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(parse_reply(b"200 %68%69").unwrap(), Reply::Found("hi".into()));
        assert_eq!(parse_reply(b"500 no such key").unwrap(), Reply::NotFound);
        assert_eq!(
            parse_reply(b"200 caf%E9").unwrap(),
            Reply::Found("caf\u{FFFD}".into())
        );
        assert!(matches!(
            parse_reply(b"400 try later"),
            Err(AttemptError::Transient(_))
        ));
        assert!(matches!(parse_reply(b"300 what"), Err(AttemptError::Protocol(_))));
        assert!(matches!(parse_reply(b"20 x"), Err(AttemptError::Protocol(_))));
        assert!(matches!(parse_reply(b"200x"), Err(AttemptError::Protocol(_))));
        assert!(matches!(parse_reply(b"2a0 x"), Err(AttemptError::Protocol(_))));
    }
}
