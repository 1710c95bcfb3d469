//! Response serialization

use bytes::{BufMut, Bytes, BytesMut};

/// Status codes this server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NoContent,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NoContent => 204,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NoContent => "No Content",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// A complete, non-streaming response. Always sent with `Connection: close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: Status, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type.into())],
            body: body.into(),
        }
    }

    pub fn json(status: Status, body: impl Into<String>) -> Self {
        Self::new(status, "application/json", body.into())
    }

    pub fn not_found() -> Self {
        Self::new(Status::NotFound, "text/plain", "Not Found")
    }

    /// CORS preflight answer (empty body, no `Content-Length`)
    pub fn preflight() -> Self {
        Self {
            status: Status::NoContent,
            headers: vec![
                ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".to_string()),
                ("Access-Control-Allow-Headers", "Content-Type".to_string()),
            ],
            body: Bytes::new(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(256 + self.body.len());
        out.put_slice(format!("HTTP/1.1 {} {}\r\n", self.status.code(), self.status.reason()).as_bytes());
        out.put_slice(b"Access-Control-Allow-Origin: *\r\n");

        for (name, value) in &self.headers {
            out.put_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        if self.status != Status::NoContent {
            out.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        out.put_slice(b"Connection: close\r\n\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}

/// Response head that opens a `multipart/x-mixed-replace` stream
pub fn stream_headers(boundary: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 200 OK\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={boundary}\r\n\
         Cache-Control: no-cache\r\n\
         Connection: keep-alive\r\n\r\n"
    ))
}
