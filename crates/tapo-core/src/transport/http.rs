//! Minimal HTTP/1.1 client used to reach devices.
//!
//! # Note on HTTP Implementation
//!
//! This uses raw TCP sockets instead of an HTTP client library because Tapo
//! devices run a non-compliant HTTP server that rejects requests with
//! lowercase headers. Modern HTTP libraries (reqwest, hyper, ureq) lowercase
//! all headers following HTTP/2 conventions, but the devices only accept
//! HTTP/1.1 with title-case headers (e.g. "Content-Type", not
//! "content-type").
//!
//! The engines only see the [`HttpClient`] trait, so tests substitute an
//! in-memory device for [`TcpHttpClient`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, TransportError};

/// Content type of the raw KLAP handshake and request bodies.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Content type of SecurePassthrough envelopes.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A single POST to a device.
#[derive(Clone)]
pub struct HttpRequest {
    /// Device hostname or IP address.
    pub host: String,
    /// Device HTTP port.
    pub port: u16,
    /// Path and query, e.g. `/app/request?seq=5`.
    pub path: String,
    /// Raw request body.
    pub body: Vec<u8>,
    /// Value of the `Content-Type` header.
    pub content_type: &'static str,
    /// Full `Cookie` header value, e.g. `TP_SESSIONID=abc`.
    pub cookie: Option<String>,
    /// Limit on each of connect, write and read.
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("body_len", &self.body.len())
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The device's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Value of the first `Set-Cookie` header, if any.
    pub set_cookie: Option<String>,
}

impl HttpResponse {
    /// Turns a non-2xx status into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, Error> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(TransportError::Status(self.status).into())
        }
    }
}

/// Capability to POST a request to a device.
///
/// Implementations must not retry: a failed exchange surfaces as an error
/// and the caller decides what to do.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// [`HttpClient`] writing HTTP/1.1 directly over a [`TcpStream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpHttpClient;

impl TcpHttpClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HttpClient for TcpHttpClient {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let io_timeout = request.timeout;

        // Title-case headers; see module docs
        let mut head = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}:{}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Accept: */*\r\n",
            request.path,
            request.host,
            request.port,
            request.content_type,
            request.body.len()
        );

        if let Some(cookie) = &request.cookie {
            head.push_str(&format!("Cookie: {}\r\n", cookie));
        }

        head.push_str("\r\n");

        let addr = format!("{}:{}", request.host, request.port);
        let mut stream = timeout(io_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Timeout(format!("connecting to {}", addr)))?
            .map_err(|e| TransportError::Connect(format!("{}: {}", addr, e)))?;

        let mut full_request = head.into_bytes();
        full_request.extend_from_slice(&request.body);

        timeout(io_timeout, stream.write_all(&full_request))
            .await
            .map_err(|_| TransportError::Timeout("writing request".into()))??;

        let mut response = Vec::with_capacity(1024);
        let mut buf = [0u8; 4096];

        // Read until the headers are complete
        let header_end = loop {
            if let Some(end) = find_header_end(&response) {
                break end;
            }
            let n = read_chunk(&mut stream, &mut buf, io_timeout).await?;
            if n == 0 {
                return Err(TransportError::InvalidResponse(
                    "connection closed before headers were complete".into(),
                )
                .into());
            }
            response.extend_from_slice(&buf[..n]);
        };

        let headers = String::from_utf8_lossy(&response[..header_end]).into_owned();
        let body_start = header_end + 4;

        let status = parse_status_code(&headers)
            .ok_or_else(|| TransportError::InvalidResponse("no status code".into()))?;

        match parse_content_length(&headers) {
            Some(expected_len) => {
                while response.len() - body_start < expected_len {
                    let n = read_chunk(&mut stream, &mut buf, io_timeout).await?;
                    if n == 0 {
                        return Err(TransportError::InvalidResponse(format!(
                            "body truncated: got {} of {} bytes",
                            response.len() - body_start,
                            expected_len
                        ))
                        .into());
                    }
                    response.extend_from_slice(&buf[..n]);
                }
                response.truncate(body_start + expected_len);
            }
            None => loop {
                let n = read_chunk(&mut stream, &mut buf, io_timeout).await?;
                if n == 0 {
                    break;
                }
                response.extend_from_slice(&buf[..n]);
            },
        }

        debug!(
            host = %request.host,
            port = request.port,
            path = %request.path,
            status,
            body_len = response.len() - body_start,
            "HTTP exchange completed"
        );

        Ok(HttpResponse {
            status,
            body: response[body_start..].to_vec(),
            set_cookie: parse_set_cookie_header(&headers),
        })
    }
}

async fn read_chunk(
    stream: &mut TcpStream,
    buf: &mut [u8],
    io_timeout: Duration,
) -> Result<usize, Error> {
    let n = timeout(io_timeout, stream.read(buf))
        .await
        .map_err(|_| TransportError::Timeout("reading response".into()))??;
    Ok(n)
}

/// Find the position of "\r\n\r\n" in the response (end of headers).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the HTTP status code from the response headers.
fn parse_status_code(headers: &str) -> Option<u16> {
    // First line should be "HTTP/1.1 200 OK" or similar
    let first_line = headers.lines().next()?;
    let mut parts = first_line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Parse the Content-Length header value.
fn parse_content_length(headers: &str) -> Option<usize> {
    header_value(headers, "content-length")?.parse().ok()
}

/// Returns the raw value of the first Set-Cookie header.
fn parse_set_cookie_header(headers: &str) -> Option<String> {
    header_value(headers, "set-cookie").map(str::to_string)
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}
