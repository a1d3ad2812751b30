//! HTTP/1.1 framing over a TCP stream.
//!
//! The request engine owns its sockets, so the HTTP layer is framed by hand
//! the same way the rest of the wire work is: an incremental read buffer,
//! explicit head parsing, and Content-Length / chunked body decoding.

use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{ClientError, TransportError};

/// Parsed response status line and headers.
#[derive(Debug, Clone)]
pub(crate) struct ResponseHead {
    pub status: u16,
    pub headers: Headers,
}

/// Response headers with case-insensitive lookup.
#[derive(Debug, Clone, Default)]
pub(crate) struct Headers(Vec<(String, String)>);

impl Headers {
    /// First value of a header, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// How the response body is delimited.
#[derive(Debug)]
pub(crate) enum BodyFraming {
    /// `Content-Length` bytes remain.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked(ChunkState),
    /// No delimiter; the body runs to connection close.
    UntilClose,
}

#[derive(Debug)]
pub(crate) enum ChunkState {
    /// Expecting a chunk-size line.
    Size,
    /// Inside a chunk, this many data bytes left.
    Data(u64),
    /// Expecting the CRLF that closes a chunk.
    DataEnd,
    /// Last chunk seen; consuming trailers until the blank line.
    Trailers,
    /// Body complete.
    Done,
}

impl BodyFraming {
    /// Chooses the framing from the response headers.
    pub fn from_headers(headers: &Headers) -> Result<BodyFraming, ClientError> {
        if let Some(te) = headers.get("Transfer-Encoding") {
            if te.eq_ignore_ascii_case("chunked") {
                return Ok(BodyFraming::Chunked(ChunkState::Size));
            }
            return Err(ClientError::MalformedResponse(format!(
                "unsupported transfer encoding {:?}",
                te
            )));
        }
        if let Some(len) = headers.get("Content-Length") {
            let len: u64 = len.parse().map_err(|_| {
                ClientError::MalformedResponse(format!("bad content length {:?}", len))
            })?;
            return Ok(BodyFraming::Length(len));
        }
        Ok(BodyFraming::UntilClose)
    }

    /// True once the body is fully consumed without needing a close.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            BodyFraming::Length(0) | BodyFraming::Chunked(ChunkState::Done)
        )
    }
}

/// One TCP connection with its read buffer and age bookkeeping.
#[derive(Debug)]
pub(crate) struct Connection {
    stream: TcpStream,
    buf: BytesMut,
    created_at: Instant,
    last_used: Instant,
}

impl Connection {
    /// Dials the endpoint, bounded by the connect timeout.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Connection, TransportError> {
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(addr.clone()))??;
        stream.set_nodelay(true)?;
        let now = Instant::now();
        Ok(Connection {
            stream,
            buf: BytesMut::with_capacity(8 * 1024),
            created_at: now,
            last_used: now,
        })
    }

    /// Age since the socket was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection last carried a request.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Marks the connection as just used.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Writes the request head and body.
    pub async fn send_request(
        &mut self,
        head: &[u8],
        body: &[u8],
        socket_timeout: Duration,
    ) -> Result<(), TransportError> {
        self.touch();
        let write = async {
            self.stream.write_all(head).await?;
            if !body.is_empty() {
                self.stream.write_all(body).await?;
            }
            self.stream.flush().await
        };
        match tokio::time::timeout(socket_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(classify_io(e)),
            Err(_) => Err(TransportError::SocketTimeout(socket_timeout.as_millis() as u64)),
        }
    }

    /// Reads and parses the status line and headers.
    pub async fn read_head(&mut self, socket_timeout: Duration) -> Result<ResponseHead, ClientError> {
        loop {
            if let Some(end) = find_head_end(&self.buf) {
                let head = self.buf.split_to(end + 4);
                return parse_head(&head[..end]);
            }
            if self.fill(socket_timeout).await? == 0 {
                // The server went away before producing a full response.
                return Err(ClientError::Transport(if self.buf.is_empty() {
                    TransportError::NoResponse
                } else {
                    TransportError::ConnectionReset
                }));
            }
        }
    }

    /// Yields the next chunk of body bytes, or `None` at end of body.
    pub async fn read_body_chunk(
        &mut self,
        framing: &mut BodyFraming,
        socket_timeout: Duration,
    ) -> Result<Option<Bytes>, ClientError> {
        loop {
            match framing {
                BodyFraming::Length(0) => return Ok(None),
                BodyFraming::Length(remaining) => {
                    if self.buf.is_empty() && self.fill(socket_timeout).await? == 0 {
                        return Err(ClientError::Transport(TransportError::ConnectionReset));
                    }
                    let take = (self.buf.len() as u64).min(*remaining) as usize;
                    if take == 0 {
                        continue;
                    }
                    *remaining -= take as u64;
                    return Ok(Some(self.buf.split_to(take).freeze()));
                }
                BodyFraming::UntilClose => {
                    if !self.buf.is_empty() {
                        let len = self.buf.len();
                        return Ok(Some(self.buf.split_to(len).freeze()));
                    }
                    if self.fill(socket_timeout).await? == 0 {
                        return Ok(None);
                    }
                }
                BodyFraming::Chunked(state) => match state {
                    ChunkState::Done => return Ok(None),
                    ChunkState::Size => {
                        let Some(line) = self.take_line(socket_timeout).await? else {
                            continue;
                        };
                        let size = parse_chunk_size(&line)?;
                        *state = if size == 0 {
                            ChunkState::Trailers
                        } else {
                            ChunkState::Data(size)
                        };
                    }
                    ChunkState::Data(remaining) => {
                        if self.buf.is_empty() && self.fill(socket_timeout).await? == 0 {
                            return Err(ClientError::Transport(TransportError::ConnectionReset));
                        }
                        let take = (self.buf.len() as u64).min(*remaining) as usize;
                        if take == 0 {
                            continue;
                        }
                        *remaining -= take as u64;
                        let data = self.buf.split_to(take).freeze();
                        if *remaining == 0 {
                            *state = ChunkState::DataEnd;
                        }
                        return Ok(Some(data));
                    }
                    ChunkState::DataEnd => {
                        let Some(line) = self.take_line(socket_timeout).await? else {
                            continue;
                        };
                        if !line.is_empty() {
                            return Err(ClientError::MalformedResponse(
                                "missing chunk terminator".to_string(),
                            ));
                        }
                        *state = ChunkState::Size;
                    }
                    ChunkState::Trailers => {
                        let Some(line) = self.take_line(socket_timeout).await? else {
                            continue;
                        };
                        if line.is_empty() {
                            *state = ChunkState::Done;
                            return Ok(None);
                        }
                    }
                },
            }
        }
    }

    /// Extracts one CRLF-terminated line from the buffer, filling as needed.
    /// Returns `None` when more input is required.
    async fn take_line(&mut self, socket_timeout: Duration) -> Result<Option<Vec<u8>>, ClientError> {
        if let Some(pos) = find_crlf(&self.buf) {
            let line = self.buf.split_to(pos).to_vec();
            self.buf.advance(2);
            return Ok(Some(line));
        }
        if self.fill(socket_timeout).await? == 0 {
            return Err(ClientError::Transport(TransportError::ConnectionReset));
        }
        Ok(None)
    }

    async fn fill(&mut self, socket_timeout: Duration) -> Result<usize, ClientError> {
        match tokio::time::timeout(socket_timeout, self.stream.read_buf(&mut self.buf)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(ClientError::Transport(classify_io(e))),
            Err(_) => Err(ClientError::Transport(TransportError::SocketTimeout(
                socket_timeout.as_millis() as u64,
            ))),
        }
    }

    /// True when residual buffered bytes would corrupt the next exchange.
    pub fn has_residue(&self) -> bool {
        !self.buf.is_empty()
    }
}

fn classify_io(error: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match error.kind() {
        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => TransportError::ConnectionReset,
        ErrorKind::UnexpectedEof => TransportError::NoResponse,
        ErrorKind::TimedOut => TransportError::SocketTimeout(0),
        _ => TransportError::Io(error),
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_head(head: &[u8]) -> Result<ResponseHead, ClientError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ClientError::MalformedResponse("non-utf8 response head".to_string()))?;
    let mut lines = text.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| ClientError::MalformedResponse("empty response head".to_string()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(ClientError::MalformedResponse(format!(
            "unexpected status line {:?}",
            status_line
        )));
    }
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ClientError::MalformedResponse(format!("bad status line {:?}", status_line)))?;
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ClientError::MalformedResponse(format!("bad header line {:?}", line))
        })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(ResponseHead {
        status,
        headers: Headers(headers),
    })
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ClientError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| ClientError::MalformedResponse("non-utf8 chunk size".to_string()))?;
    // Chunk extensions after ';' are ignored.
    let size = text.split(';').next().unwrap_or_default().trim();
    u64::from_str_radix(size, 16)
        .map_err(|_| ClientError::MalformedResponse(format!("bad chunk size {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_head() {
        let head = parse_head(
            b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\nX-ClickHouse-Query-Id: abc",
        )
        .unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.headers.get("content-length"), Some("12"));
        assert_eq!(head.headers.get("X-CLICKHOUSE-QUERY-ID"), Some("abc"));
        assert_eq!(head.headers.get("missing"), None);
    }

    #[test]
    fn test_parse_head_rejects_garbage() {
        assert!(parse_head(b"ICMP nope").is_err());
        assert!(parse_head(b"HTTP/1.1 abc OK").is_err());
    }

    #[test]
    fn test_multiple_header_values() {
        let head = parse_head(
            b"HTTP/1.1 200 OK\r\nX-ClickHouse-Progress: {\"read_rows\":\"1\"}\r\nX-ClickHouse-Progress: {\"read_rows\":\"2\"}",
        )
        .unwrap();
        let all: Vec<&str> = head.headers.get_all("X-ClickHouse-Progress").collect();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_chunk_size_line() {
        assert_eq!(parse_chunk_size(b"1a").unwrap(), 26);
        assert_eq!(parse_chunk_size(b"0").unwrap(), 0);
        assert_eq!(parse_chunk_size(b"ff;ext=1").unwrap(), 255);
        assert!(parse_chunk_size(b"zz").is_err());
    }

    #[test]
    fn test_body_framing_selection() {
        let head = parse_head(b"HTTP/1.1 200 OK\r\nContent-Length: 3").unwrap();
        assert!(matches!(
            BodyFraming::from_headers(&head.headers).unwrap(),
            BodyFraming::Length(3)
        ));

        let head = parse_head(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked").unwrap();
        assert!(matches!(
            BodyFraming::from_headers(&head.headers).unwrap(),
            BodyFraming::Chunked(ChunkState::Size)
        ));

        let head = parse_head(b"HTTP/1.1 200 OK").unwrap();
        assert!(matches!(
            BodyFraming::from_headers(&head.headers).unwrap(),
            BodyFraming::UntilClose
        ));
    }
}
