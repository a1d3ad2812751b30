//! Query responses and the streaming row cursor.

use std::sync::Arc;

use bytes::{Buf, BytesMut};

use rowhouse_data::{
    parse_column_type, read_leb128, DecodeError, Record, RowDecoder, TableSchema,
};

use crate::error::{ClientError, ClientResult};
use crate::http::response::HttpResponse;
use crate::http::Summary;

/// A streamed query response.
///
/// The response owns its pooled connection; iterate it with
/// [`QueryResponse::rows`] or discard it with [`QueryResponse::close`].
#[derive(Debug)]
pub struct QueryResponse {
    pub(crate) response: HttpResponse,
}

impl QueryResponse {
    /// Counters reported by the server so far.
    pub fn summary(&self) -> Summary {
        self.response.summary()
    }

    /// The query id echoed by the server.
    pub fn query_id(&self) -> Option<&str> {
        self.response.query_id()
    }

    /// Turns the response into a row cursor over the
    /// `RowBinaryWithNamesAndTypes` stream.
    pub fn rows(self) -> RowCursor {
        RowCursor {
            response: self.response,
            buf: BytesMut::new(),
            decoder: None,
            record: None,
            at_end: false,
        }
    }

    /// Drains and releases the response.
    pub async fn close(self) -> ClientResult<()> {
        self.response.close().await
    }
}

/// Streaming cursor decoding rows in value-reuse mode.
///
/// [`RowCursor::next`] yields a borrow of one record that is overwritten on
/// the following call; clone the [`Record`] to keep it.
#[derive(Debug)]
pub struct RowCursor {
    response: HttpResponse,
    buf: BytesMut,
    decoder: Option<RowDecoder>,
    record: Option<Record>,
    at_end: bool,
}

impl RowCursor {
    /// The result schema, available once the stream header was read.
    pub fn schema(&self) -> Option<&Arc<TableSchema>> {
        self.decoder.as_ref().map(|d| d.schema())
    }

    /// Counters reported by the server.
    pub fn summary(&self) -> Summary {
        self.response.summary()
    }

    /// Decodes the next row, or `None` at end of stream.
    pub async fn next(&mut self) -> ClientResult<Option<&Record>> {
        if self.decoder.is_none() && !self.read_header().await? {
            return Ok(None);
        }
        // The borrow checker ties the returned record to `&mut self`, which
        // is exactly the reuse contract: the slot is rewritten on the next
        // call.
        let has_row = self.read_one().await?;
        if !has_row {
            return Ok(None);
        }
        Ok(self.record.as_ref())
    }

    /// Materializes all remaining rows as owned records.
    pub async fn collect_rows(mut self) -> ClientResult<Vec<Record>> {
        let mut rows = Vec::new();
        while let Some(record) = self.next().await? {
            rows.push(record.clone());
        }
        Ok(rows)
    }

    /// Reads the in-stream names/types header. Returns false for an empty
    /// body (a result-less statement).
    async fn read_header(&mut self) -> ClientResult<bool> {
        loop {
            if self.buf.is_empty() && self.at_end {
                return Ok(false);
            }
            let mut slice = &self.buf[..];
            match try_parse_header(&mut slice) {
                Ok(schema) => {
                    let consumed = self.buf.len() - slice.len();
                    self.buf.advance(consumed);
                    let decoder = RowDecoder::new(Arc::new(schema));
                    self.record = Some(decoder.empty_record());
                    self.decoder = Some(decoder);
                    return Ok(true);
                }
                Err(HeaderParse::NeedMore) => {
                    if !self.fill().await? {
                        if self.buf.is_empty() {
                            return Ok(false);
                        }
                        return Err(DecodeError::UnexpectedEof("stream header").into());
                    }
                }
                Err(HeaderParse::Failed(e)) => return Err(e),
            }
        }
    }

    async fn read_one(&mut self) -> ClientResult<bool> {
        let decoder = self
            .decoder
            .clone()
            .ok_or(DecodeError::UnexpectedEof("stream header"))?;
        loop {
            if self.buf.is_empty() {
                if self.at_end {
                    return Ok(false);
                }
                self.fill().await?;
                continue;
            }
            let mut slice = &self.buf[..];
            let record = self
                .record
                .as_mut()
                .ok_or(DecodeError::UnexpectedEof("record slot"))?;
            match decoder.read_row_into(&mut slice, record) {
                Ok(()) => {
                    let consumed = self.buf.len() - slice.len();
                    self.buf.advance(consumed);
                    return Ok(true);
                }
                Err(DecodeError::UnexpectedEof(what)) => {
                    if !self.fill().await? {
                        return Err(DecodeError::UnexpectedEof(what).into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Pulls one more chunk into the buffer; false at end of body.
    async fn fill(&mut self) -> ClientResult<bool> {
        if self.at_end {
            return Ok(false);
        }
        match self.response.next_chunk().await? {
            Some(chunk) => {
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            None => {
                self.at_end = true;
                Ok(false)
            }
        }
    }
}

enum HeaderParse {
    NeedMore,
    Failed(ClientError),
}

/// Attempts to parse the `RowBinaryWithNamesAndTypes` header from the
/// buffered prefix: a column count, the names, then the type strings.
fn try_parse_header(slice: &mut &[u8]) -> Result<TableSchema, HeaderParse> {
    let count = read_prefix_int(slice)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(read_prefix_string(slice)?);
    }
    let mut columns = Vec::with_capacity(count);
    for name in names {
        let type_name = read_prefix_string(slice)?;
        let column = parse_column_type(&type_name)
            .map_err(|e| HeaderParse::Failed(e.into()))?
            .with_name(name);
        columns.push(column);
    }
    Ok(TableSchema::new(columns))
}

fn read_prefix_int(slice: &mut &[u8]) -> Result<usize, HeaderParse> {
    match read_leb128(slice) {
        Ok(value) => Ok(value as usize),
        Err(DecodeError::UnexpectedEof(_)) => Err(HeaderParse::NeedMore),
        Err(e) => Err(HeaderParse::Failed(e.into())),
    }
}

fn read_prefix_string(slice: &mut &[u8]) -> Result<String, HeaderParse> {
    let len = read_prefix_int(slice)?;
    if slice.len() < len {
        return Err(HeaderParse::NeedMore);
    }
    let bytes = &slice[..len];
    let text = std::str::from_utf8(bytes)
        .map_err(|_| HeaderParse::Failed(DecodeError::InvalidUtf8.into()))?
        .to_string();
    slice.advance(len);
    Ok(text)
}
