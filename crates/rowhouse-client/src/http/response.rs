//! Response handling: summary counters, streaming body, error extraction.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::error::{ClientError, ClientResult, AUTHENTICATION_FAILED};

use super::pool::PooledConn;
use super::wire::{BodyFraming, Headers, ResponseHead};

/// Protocol header carrying an error code even on a 200 response.
pub(crate) const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";
/// Protocol header with the eager progress/summary counters.
pub(crate) const SUMMARY_HEADER: &str = "X-ClickHouse-Summary";
/// Protocol header echoing the query id.
pub(crate) const QUERY_ID_HEADER: &str = "X-ClickHouse-Query-Id";
/// Streaming progress header, sent when progress reporting is on.
pub(crate) const PROGRESS_HEADER: &str = "X-ClickHouse-Progress";

/// Counters the server reports in summary and progress headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Rows read server-side.
    pub read_rows: u64,
    /// Bytes read server-side.
    pub read_bytes: u64,
    /// Rows written by an insert.
    pub written_rows: u64,
    /// Bytes written by an insert.
    pub written_bytes: u64,
    /// Total rows the server expects to read.
    pub total_rows_to_read: u64,
    /// Rows in the result set.
    pub result_rows: u64,
    /// Bytes in the result set.
    pub result_bytes: u64,
}

impl Summary {
    /// Folds one summary/progress JSON object into the counters.
    ///
    /// Counter values arrive as JSON strings; later reports replace earlier
    /// ones field by field.
    pub(crate) fn merge_json(&mut self, text: &str) {
        let parsed: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "unparseable summary header");
                return;
            }
        };
        let Some(object) = parsed.as_object() else {
            return;
        };
        for (key, value) in object {
            let number = value
                .as_str()
                .and_then(|s| s.parse::<u64>().ok())
                .or_else(|| value.as_u64());
            let Some(number) = number else { continue };
            match key.as_str() {
                "read_rows" => self.read_rows = number,
                "read_bytes" => self.read_bytes = number,
                "written_rows" => self.written_rows = number,
                "written_bytes" => self.written_bytes = number,
                "total_rows_to_read" => self.total_rows_to_read = number,
                "result_rows" => self.result_rows = number,
                "result_bytes" => self.result_bytes = number,
                _ => {}
            }
        }
    }
}

/// A streamed response that owns its pooled connection.
///
/// The connection goes back to the pool the moment the body is fully
/// drained; dropping the response earlier closes the socket instead, since
/// a half-read stream cannot be reused.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    conn: Option<PooledConn>,
    framing: BodyFraming,
    socket_timeout: Duration,
    status: u16,
    headers: Headers,
    summary: Summary,
    query_id: Option<String>,
}

impl HttpResponse {
    pub fn new(
        conn: PooledConn,
        head: ResponseHead,
        socket_timeout: Duration,
    ) -> ClientResult<HttpResponse> {
        let framing = BodyFraming::from_headers(&head.headers)?;
        let mut summary = Summary::default();
        if let Some(text) = head.headers.get(SUMMARY_HEADER) {
            summary.merge_json(text);
        }
        for text in head.headers.get_all(PROGRESS_HEADER) {
            summary.merge_json(text);
        }
        let query_id = head.headers.get(QUERY_ID_HEADER).map(str::to_string);
        let mut response = HttpResponse {
            conn: Some(conn),
            framing,
            socket_timeout,
            status: head.status,
            headers: head.headers,
            summary,
            query_id,
        };
        response.release_if_complete();
        Ok(response)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// The server error code when the response carries one.
    pub fn exception_code(&self) -> Option<i32> {
        self.headers
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.parse().ok())
    }

    /// Next chunk of body bytes; `None` once the body is complete.
    pub async fn next_chunk(&mut self) -> ClientResult<Option<Bytes>> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(None);
        };
        match conn.read_body_chunk(&mut self.framing, self.socket_timeout).await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.release_if_complete();
                // A to-close body ends with the connection itself.
                if let Some(conn) = self.conn.take() {
                    conn.close();
                }
                Ok(None)
            }
            Err(e) => {
                // The stream is corrupt; the socket must not be reused.
                if let Some(conn) = self.conn.take() {
                    conn.close();
                }
                Err(e)
            }
        }
    }

    /// Reads the remainder of the body into one buffer.
    pub async fn read_to_end(&mut self) -> ClientResult<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Drains the body and releases the connection.
    pub async fn close(mut self) -> ClientResult<()> {
        while self.next_chunk().await?.is_some() {}
        Ok(())
    }

    /// Turns an error-bearing response into the client error, consuming the
    /// body as the message.
    pub async fn into_server_error(mut self) -> ClientError {
        let code = self.exception_code().unwrap_or(0);
        let body = match self.read_to_end().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        };
        let message = fold_error_message(&body);
        let code = if code != 0 { code } else { code_from_message(&message) };
        if code == AUTHENTICATION_FAILED {
            ClientError::Auth { message }
        } else {
            ClientError::Server { code, message }
        }
    }

    fn release_if_complete(&mut self) {
        if self.framing.is_complete() {
            if let Some(mut conn) = self.conn.take() {
                conn.mark_reusable();
                drop(conn);
            }
        }
    }
}

/// Folds a server error body to one line for compact reporting.
pub(crate) fn fold_error_message(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the numeric code from a `Code: NNN. …` message.
fn code_from_message(message: &str) -> i32 {
    message
        .strip_prefix("Code: ")
        .and_then(|rest| rest.split('.').next())
        .and_then(|digits| digits.trim().parse().ok())
        .unwrap_or(0)
}
