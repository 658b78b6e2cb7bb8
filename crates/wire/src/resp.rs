//! RESP2 framing.
//!
//! Commands arrive as arrays of bulk strings (`*N` of `$len`); replies are
//! any of the five RESP types. Parsing is incremental: a frame split
//! across reads yields `Ok(None)` and the caller retries with more bytes.

use thiserror::Error;

/// A RESP reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR ...\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`
    Bulk(Vec<u8>),
    /// `$-1\r\n`
    NullBulk,
    /// `*N\r\n` followed by N replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// Bulk string from anything byte-like.
    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(bytes.into())
    }

    /// Error reply with the conventional `ERR ` prefix already applied by
    /// the caller.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    /// Append the wire encoding of this reply to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Integer(i) => {
                out.push(b':');
                out.extend_from_slice(i.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(bytes) => {
                out.push(b'$');
                out.extend_from_slice(bytes.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
            }
            Reply::NullBulk => out.extend_from_slice(b"$-1\r\n"),
            Reply::Array(items) => {
                out.push(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    /// The wire encoding as an owned buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Protocol violations that close the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame does not follow RESP.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl FrameError {
    fn protocol(message: impl Into<String>) -> Self {
        FrameError::Protocol(message.into())
    }
}

/// Encode a command as an array of bulk strings, the form clients send.
pub fn encode_command(args: &[Vec<u8>]) -> Vec<u8> {
    let items = args.iter().map(|a| Reply::Bulk(a.clone())).collect();
    Reply::Array(items).to_bytes()
}

/// Parse one command array from the front of `buf`.
///
/// Returns `Ok(Some((args, consumed)))` for a complete frame, `Ok(None)`
/// when more bytes are needed, and `Err` for malformed input.
pub fn parse_command(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>, FrameError> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf[0] != b'*' {
        return Err(FrameError::protocol("expected array frame"));
    }

    let mut offset = 1;
    let count = match parse_integer_line(buf, &mut offset)? {
        Some(count) => count,
        None => return Ok(None),
    };
    if count < 0 {
        return Err(FrameError::protocol("negative command array length"));
    }

    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if offset >= buf.len() {
            return Ok(None);
        }
        if buf[offset] != b'$' {
            return Err(FrameError::protocol("command element is not a bulk string"));
        }
        offset += 1;
        let len = match parse_integer_line(buf, &mut offset)? {
            Some(len) => len,
            None => return Ok(None),
        };
        if len < 0 {
            return Err(FrameError::protocol("null element in command array"));
        }
        let len = len as usize;
        if buf.len() < offset + len + 2 {
            return Ok(None);
        }
        if &buf[offset + len..offset + len + 2] != b"\r\n" {
            return Err(FrameError::protocol("bulk string missing CRLF terminator"));
        }
        args.push(buf[offset..offset + len].to_vec());
        offset += len + 2;
    }

    Ok(Some((args, offset)))
}

/// Parse one reply from the front of `buf`. Used by the client REPL.
pub fn parse_reply(buf: &[u8]) -> Result<Option<(Reply, usize)>, FrameError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let mut offset = 1;
    match buf[0] {
        b'+' => Ok(parse_text_line(buf, &mut offset)?
            .map(|line| (Reply::Simple(line), offset))),
        b'-' => Ok(parse_text_line(buf, &mut offset)?
            .map(|line| (Reply::Error(line), offset))),
        b':' => Ok(parse_integer_line(buf, &mut offset)?
            .map(|value| (Reply::Integer(value), offset))),
        b'$' => {
            let len = match parse_integer_line(buf, &mut offset)? {
                Some(len) => len,
                None => return Ok(None),
            };
            if len < 0 {
                return Ok(Some((Reply::NullBulk, offset)));
            }
            let len = len as usize;
            if buf.len() < offset + len + 2 {
                return Ok(None);
            }
            if &buf[offset + len..offset + len + 2] != b"\r\n" {
                return Err(FrameError::protocol("bulk reply missing CRLF terminator"));
            }
            let bytes = buf[offset..offset + len].to_vec();
            Ok(Some((Reply::Bulk(bytes), offset + len + 2)))
        }
        b'*' => {
            let count = match parse_integer_line(buf, &mut offset)? {
                Some(count) => count,
                None => return Ok(None),
            };
            if count < 0 {
                return Ok(Some((Reply::Array(Vec::new()), offset)));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match parse_reply(&buf[offset..])? {
                    Some((item, consumed)) => {
                        items.push(item);
                        offset += consumed;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(items), offset)))
        }
        other => Err(FrameError::protocol(format!(
            "unknown reply type byte 0x{other:02x}"
        ))),
    }
}

/// Read an integer line (digits with optional sign) up to CRLF, starting
/// at `*offset`. Advances past the CRLF. `Ok(None)` when the line is not
/// complete yet.
fn parse_integer_line(buf: &[u8], offset: &mut usize) -> Result<Option<i64>, FrameError> {
    let Some(end) = find_crlf(buf, *offset) else {
        return Ok(None);
    };
    let line = &buf[*offset..end];
    let text = std::str::from_utf8(line)
        .map_err(|_| FrameError::protocol("non-ASCII integer line"))?;
    let value: i64 = text
        .parse()
        .map_err(|_| FrameError::protocol(format!("invalid integer line: {text:?}")))?;
    *offset = end + 2;
    Ok(Some(value))
}

fn parse_text_line(buf: &[u8], offset: &mut usize) -> Result<Option<String>, FrameError> {
    let Some(end) = find_crlf(buf, *offset) else {
        return Ok(None);
    };
    let line = String::from_utf8_lossy(&buf[*offset..end]).into_owned();
    *offset = end + 2;
    Ok(Some(line))
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| from + pos)
}
