// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::errors::HttpError;
use crate::headers::Headers;
use crate::method::HttpMethod;
use crate::request::Request;
use crate::response::{Response, ResponseBody};

const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Terminal link of the interceptor chain: performs the actual network
/// exchange. One request maps to one connection attempt.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &Request) -> Result<Response, HttpError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
            user_agent: concat!("yuzu/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Blocking plain-HTTP transport over `std::net::TcpStream`. Writes the
/// body with a known length or chunked framing, reads the full response,
/// and maps every I/O failure into the typed taxonomy. The connection is
/// shut down on every exit path.
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn connect(&self, url: &Url, display_url: &str) -> Result<TcpStream, HttpError> {
        let addrs = url
            .socket_addrs(|| None)
            .map_err(|source| HttpError::Connect {
                url: display_url.to_string(),
                source,
            })?;
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let mut last_error: Option<std::io::Error> = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, url = display_url, "connected");
                    return Ok(stream);
                }
                Err(error) => last_error = Some(error),
            }
        }
        let source = last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        });
        if source.kind() == std::io::ErrorKind::TimedOut {
            return Err(HttpError::TimeOut {
                url: display_url.to_string(),
            });
        }
        Err(HttpError::Connect {
            url: display_url.to_string(),
            source,
        })
    }

    fn write_request(
        &self,
        stream: &mut TcpStream,
        url: &Url,
        request: &Request,
    ) -> Result<(), std::io::Error> {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut headers = request.headers().clone();
        if !headers.contains("User-Agent") {
            headers.set("User-Agent", self.config.user_agent.clone());
        }
        if !headers.contains("Host") {
            let mut host = url.host_str().unwrap_or_default().to_string();
            if let Some(port) = url.port() {
                host.push(':');
                host.push_str(&port.to_string());
            }
            headers.set("Host", host);
        }
        if !headers.contains("Connection") {
            headers.set("Connection", "Keep-Alive");
        }
        let body = request.body();
        let mut chunked = false;
        if let Some(body) = body {
            if !headers.contains("Content-Type") {
                if let Some(content_type) = body.content_type() {
                    headers.set("Content-Type", content_type.value());
                }
            }
            match body.content_length() {
                Some(len) => headers.set("Content-Length", len.to_string()),
                None => {
                    headers.set("Transfer-Encoding", "chunked");
                    chunked = true;
                }
            }
        }

        let mut head = format!("{} {} HTTP/1.1\r\n", request.verb(), target);
        for (name, value) in headers.iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        stream.write_all(head.as_bytes())?;

        if let Some(body) = body {
            if chunked {
                let mut writer = ChunkedWriter { inner: stream };
                body.write_to(&mut writer)?;
                writer.finish()?;
            } else {
                body.write_to(stream)?;
            }
        }
        stream.flush()
    }

    fn read_response(
        &self,
        stream: &mut TcpStream,
        request: &Request,
    ) -> Result<Response, std::io::Error> {
        let mut head = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            if let Some(pos) = find(&head, b"\r\n\r\n") {
                break pos;
            }
            if head.len() > MAX_HEADER_BYTES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "response header block too large",
                ));
            }
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before response headers",
                ));
            }
            head.extend_from_slice(&chunk[..n]);
        };

        let mut header_storage = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Response::new(&mut header_storage);
        let body_start = match parsed.parse(&head).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "incomplete response header block",
                ));
            }
        };
        let code = parsed.code.unwrap_or(0);
        let message = parsed.reason.unwrap_or_default().to_string();
        let mut headers = Headers::new();
        for header in parsed.headers.iter() {
            headers.add(
                header.name.to_string(),
                String::from_utf8_lossy(header.value).into_owned(),
            );
        }

        debug!(code, url = request.url(), "read response head");

        let mut reader = WireReader {
            stream,
            buf: head[body_start..].to_vec(),
            pos: 0,
        };
        let body_bytes = if request.verb() == HttpMethod::Head || code == 204 || code == 205 {
            Vec::new()
        } else if headers
            .get("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
        {
            reader.read_chunked()?
        } else if let Some(value) = headers.get("Content-Length") {
            let len = value.trim().parse::<usize>().map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "bad content-length")
            })?;
            reader.read_exact_vec(len)?
        } else {
            reader.read_to_end_vec()?
        };

        let content_type = headers.content_type().cloned();
        Ok(Response::builder(request.clone(), code)
            .message(message)
            .headers(headers)
            .body(ResponseBody::new(content_type, body_bytes))
            .build())
    }
}

impl Transport for TcpTransport {
    fn execute(&self, request: &Request) -> Result<Response, HttpError> {
        let display_url = request.url().to_string();
        let url = Url::parse(&display_url).map_err(|source| HttpError::UrlParse {
            url: display_url.clone(),
            source,
        })?;
        if url.scheme() != "http" {
            return Err(HttpError::OpenConnect {
                url: display_url,
                message: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let mut stream = self.connect(&url, &display_url)?;
        let result = self.exchange(&mut stream, &url, request, &display_url);
        let _ = stream.shutdown(Shutdown::Both);
        result
    }
}

impl TcpTransport {
    fn exchange(
        &self,
        stream: &mut TcpStream,
        url: &Url,
        request: &Request,
        display_url: &str,
    ) -> Result<Response, HttpError> {
        let _ = stream.set_write_timeout(Some(Duration::from_millis(
            self.config.write_timeout_ms,
        )));
        let _ = stream.set_read_timeout(Some(Duration::from_millis(self.config.read_timeout_ms)));

        self.write_request(stream, url, request)
            .map_err(|source| map_io(display_url, source, Phase::Write))?;
        self.read_response(stream, request)
            .map_err(|source| map_io(display_url, source, Phase::Read))
    }
}

enum Phase {
    Write,
    Read,
}

fn map_io(url: &str, source: std::io::Error, phase: Phase) -> HttpError {
    if matches!(
        source.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) {
        return HttpError::TimeOut {
            url: url.to_string(),
        };
    }
    match phase {
        Phase::Write => HttpError::Write {
            url: url.to_string(),
            source,
        },
        Phase::Read => HttpError::Read {
            url: url.to_string(),
            source,
        },
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Frames each `write` call as one chunk; `finish` emits the terminator.
struct ChunkedWriter<'a, W: Write> {
    inner: &'a mut W,
}

impl<W: Write> ChunkedWriter<'_, W> {
    fn finish(self) -> std::io::Result<()> {
        self.inner.write_all(b"0\r\n\r\n")
    }
}

impl<W: Write> Write for ChunkedWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        write!(self.inner, "{:X}\r\n", buf.len())?;
        self.inner.write_all(buf)?;
        self.inner.write_all(b"\r\n")?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Buffered reader over the socket that starts from the bytes already
/// consumed while locating the header terminator.
struct WireReader<'a, S: Read> {
    stream: &'a mut S,
    buf: Vec<u8>,
    pos: usize,
}

impl<S: Read> WireReader<'_, S> {
    fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = [0u8; 4096];
        let n = self.stream.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn read_line(&mut self) -> std::io::Result<String> {
        loop {
            if let Some(offset) = find(&self.buf[self.pos..], b"\r\n") {
                let line = String::from_utf8_lossy(&self.buf[self.pos..self.pos + offset])
                    .into_owned();
                self.pos += offset + 2;
                return Ok(line);
            }
            if self.fill()? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-line",
                ));
            }
        }
    }

    fn read_exact_vec(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        while self.buf.len() - self.pos < len {
            if self.fill()? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-body",
                ));
            }
        }
        let out = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }

    fn read_to_end_vec(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        self.stream.read_to_end(&mut out)?;
        Ok(out)
    }

    fn read_chunked(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let line = self.read_line()?;
            let size_text = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_text, 16).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "bad chunk size")
            })?;
            if size == 0 {
                // consume optional trailers up to the empty line
                while !self.read_line()?.is_empty() {}
                return Ok(out);
            }
            out.extend_from_slice(&self.read_exact_vec(size)?);
            self.read_exact_vec(2)?;
        }
    }
}
