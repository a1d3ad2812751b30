//! In-process HTTP server for transport tests.
//!
//! Serves scripted responses over keep-alive connections and counts socket
//! opens, which is how the connection-reuse scenarios observe pooling.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub chunked: bool,
    pub delay: Option<Duration>,
    /// Close the socket without writing anything, like a server that died.
    pub empty_response: bool,
}

impl MockResponse {
    pub fn ok() -> MockResponse {
        MockResponse {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            chunked: false,
            delay: None,
            empty_response: false,
        }
    }

    pub fn empty_fault() -> MockResponse {
        MockResponse {
            empty_response: true,
            ..MockResponse::ok()
        }
    }

    pub fn status(mut self, status: u16) -> MockResponse {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> MockResponse {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> MockResponse {
        self.body = body.into();
        self
    }

    pub fn chunked(mut self) -> MockResponse {
        self.chunked = true;
        self
    }

    pub fn delay(mut self, delay: Duration) -> MockResponse {
        self.delay = Some(delay);
        self
    }

    pub fn summary(self, json: &str) -> MockResponse {
        self.header("X-ClickHouse-Summary", json)
    }
}

/// A captured request.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Scripted HTTP server.
pub struct MockServer {
    addr: SocketAddr,
    opened: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockServer {
    /// Starts the server with a response script; when the script runs dry
    /// every further request gets a plain 200.
    pub async fn start(script: Vec<MockResponse>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = MockServer {
            addr,
            opened: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            responses: Arc::new(Mutex::new(script.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let opened = Arc::clone(&server.opened);
        let active = Arc::clone(&server.active);
        let max_active = Arc::clone(&server.max_active);
        let responses = Arc::clone(&server.responses);
        let requests = Arc::clone(&server.requests);
        tokio::spawn(async move {
            loop {
                let Ok((sock, _)) = listener.accept().await else {
                    return;
                };
                opened.fetch_add(1, Ordering::SeqCst);
                let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(current, Ordering::SeqCst);
                let active = Arc::clone(&active);
                let responses = Arc::clone(&responses);
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    let _ = serve_connection(sock, responses, requests).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
        server
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Sockets accepted so far.
    pub fn opened_sockets(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Peak simultaneous sockets.
    pub fn max_concurrent_sockets(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose body contains the given text.
    pub fn requests_containing(&self, text: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.body_text().contains(text) || r.target.contains(text))
            .count()
    }

    pub fn push_response(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }
}

async fn serve_connection(
    mut sock: TcpStream,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        // Read one request: head, then Content-Length bytes of body.
        let head_end = loop {
            if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                break pos;
            }
            let mut chunk = [0u8; 4096];
            let n = sock.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        buf.drain(..head_end + 4);

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let target = request_line.split(' ').nth(1).unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
            .collect();
        let content_length: usize = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        while buf.len() < content_length {
            let mut chunk = [0u8; 4096];
            let n = sock.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body: Vec<u8> = buf.drain(..content_length).collect();

        requests.lock().push(CapturedRequest {
            target,
            headers,
            body,
        });

        let response = responses.lock().pop_front().unwrap_or_else(MockResponse::ok);
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        if response.empty_response {
            return Ok(());
        }

        let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
        for (name, value) in &response.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if response.chunked {
            out.push_str("Transfer-Encoding: chunked\r\n\r\n");
            sock.write_all(out.as_bytes()).await?;
            // Split the body into two chunks to exercise reassembly.
            let mid = response.body.len() / 2;
            for part in [&response.body[..mid], &response.body[mid..]] {
                if part.is_empty() {
                    continue;
                }
                sock.write_all(format!("{:x}\r\n", part.len()).as_bytes()).await?;
                sock.write_all(part).await?;
                sock.write_all(b"\r\n").await?;
            }
            sock.write_all(b"0\r\n\r\n").await?;
        } else {
            out.push_str(&format!("Content-Length: {}\r\n\r\n", response.body.len()));
            sock.write_all(out.as_bytes()).await?;
            sock.write_all(&response.body).await?;
        }
        sock.flush().await?;
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Encodes a `RowBinaryWithNamesAndTypes` body for scripted query results.
pub fn rows_body(columns: &[(&str, &str)], rows: &[Vec<rowhouse_data::Value>]) -> Vec<u8> {
    use bytes::{BufMut, BytesMut};
    use rowhouse_data::{encode_value, parse_column_type, write_leb128};

    let mut buf = BytesMut::new();
    write_leb128(&mut buf, columns.len() as u64);
    for (name, _) in columns {
        write_leb128(&mut buf, name.len() as u64);
        buf.put_slice(name.as_bytes());
    }
    for (_, type_name) in columns {
        write_leb128(&mut buf, type_name.len() as u64);
        buf.put_slice(type_name.as_bytes());
    }
    let parsed: Vec<_> = columns
        .iter()
        .map(|(_, t)| parse_column_type(t).unwrap())
        .collect();
    for row in rows {
        for (column, value) in parsed.iter().zip(row) {
            encode_value(&mut buf, column, value).unwrap();
        }
    }
    buf.to_vec()
}

/// A `DESCRIBE TABLE … FORMAT JSONEachRow` response body.
pub fn describe_body(columns: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut out = String::new();
    for (name, type_name, default_type) in columns {
        out.push_str(&format!(
            "{{\"name\":\"{}\",\"type\":\"{}\",\"default_type\":\"{}\",\"default_expression\":\"\"}}\n",
            name, type_name, default_type
        ));
    }
    out.into_bytes()
}
