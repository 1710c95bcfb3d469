//! Request framing
//!
//! Reads exactly one request head (up to `\r\n\r\n`) plus, when a
//! `Content-Length` header is present, that many body bytes.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed request line and optional body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Option<String>,
}

impl Request {
    /// Parse a complete head + body buffer.
    ///
    /// Only the request line is interpreted; header lines are skipped.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = match find_terminator(raw) {
            Some(pos) => (&raw[..pos], &raw[pos + HEADER_TERMINATOR.len()..]),
            None => (raw, &raw[raw.len()..]),
        };

        let head = std::str::from_utf8(head).map_err(|_| Error::MalformedRequest("head is not UTF-8".into()))?;
        let request_line = head.split("\r\n").next().unwrap_or_default();

        let mut tokens = request_line.split(' ');
        let method = tokens.next();
        let path = tokens.next();

        let (Some(method), Some(path)) = (method, path) else {
            return Err(Error::MalformedRequest(format!("bad request line: {request_line:?}")));
        };

        let body = if body.is_empty() {
            None
        } else {
            let body = std::str::from_utf8(body).map_err(|_| Error::MalformedRequest("body is not UTF-8".into()))?;
            Some(body.to_string())
        };

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            body,
        })
    }
}

/// Read one request from `reader`.
///
/// Fails with [`Error::ConnectionClosed`] if the peer closes before the head
/// is complete and with [`Error::RequestTooLarge`] once more than
/// `max_size` bytes are buffered.
pub async fn read_request<R>(reader: &mut R, max_size: usize, read_buffer_size: usize) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(read_buffer_size.min(max_size).max(512));

    let head_len = loop {
        if let Some(pos) = find_terminator(&buf) {
            break pos + HEADER_TERMINATOR.len();
        }
        fill(reader, &mut buf, max_size).await?;
    };

    if let Some(content_length) = content_length(&buf[..head_len]) {
        let total = head_len.saturating_add(content_length);
        if total > max_size {
            return Err(Error::RequestTooLarge { limit: max_size });
        }
        while buf.len() < total {
            fill(reader, &mut buf, max_size).await?;
        }
        buf.truncate(total);
    }

    let request = Request::parse(&buf)?;

    tracing::trace!(method = %request.method, path = %request.path, "Request read");
    Ok(request)
}

async fn fill<R>(reader: &mut R, buf: &mut BytesMut, max_size: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    if buf.len() >= max_size {
        return Err(Error::RequestTooLarge { limit: max_size });
    }

    let n = reader.read_buf(buf).await?;
    if n == 0 {
        return Err(Error::ConnectionClosed);
    }
    if buf.len() > max_size {
        return Err(Error::RequestTooLarge { limit: max_size });
    }
    Ok(())
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len()).position(|w| w == HEADER_TERMINATOR)
}

fn content_length(head: &[u8]) -> Option<usize> {
    let head = std::str::from_utf8(head).ok()?;
    head.split("\r\n").skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
