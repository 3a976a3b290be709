//! Lazy NDJSON record streaming over HTTP
//!
//! The GET for a resource is only issued once the returned [`RecordStream`]
//! is first polled, and the body is decoded chunk by chunk so at most one
//! partial line is held between reads. That line is capped at
//! [`MAX_LINE_BYTES`] unless overridden.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Response;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::app::client::{parse_url, HttpHandler};
use crate::app::signals::CancelGuard;
use crate::constants::catalog::{MAX_LINE_BYTES, PROGRESS_INTERVAL};
use crate::errors::{FetchError, ResourceError, ResourceResult};

/// Body chunks feeding a [`RecordStream`]
pub type ChunkStream = BoxStream<'static, ResourceResult<Bytes>>;

/// Opens record streams for entity resources
#[derive(Debug, Clone)]
pub struct ResourceStreamer {
    http: Arc<HttpHandler>,
    guard: CancelGuard,
}

impl ResourceStreamer {
    /// Create a streamer that fetches through `http`
    pub fn new(http: Arc<HttpHandler>) -> Self {
        Self {
            http,
            guard: CancelGuard::none(),
        }
    }

    /// Apply cancellation and a deadline to every fetch and body read
    pub fn with_guard(mut self, guard: CancelGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Stream the records at `url` on behalf of dataset `foreign_id`
    ///
    /// Nothing is fetched until the stream is polled. A failed fetch or a
    /// non-success status is logged as `fetch_failed` and produces an empty
    /// stream; a cancelled or expired run surfaces as
    /// [`ResourceError::Transport`].
    pub fn stream(&self, url: &str, foreign_id: &str) -> RecordStream {
        let open = open_body(
            Arc::clone(&self.http),
            self.guard.clone(),
            url.to_string(),
            foreign_id.to_string(),
        );

        let chunks = stream::once(open)
            .map(|opened| match opened {
                Ok(Some(body)) => body,
                Ok(None) => stream::empty().boxed(),
                Err(e) => stream::once(future::ready(Err(e))).boxed(),
            })
            .flatten()
            .boxed();

        RecordStream::from_chunks(foreign_id, chunks)
    }
}

/// Issue the GET and hand back the body as a chunk stream, or `None` when the
/// resource could not be fetched
async fn open_body(
    http: Arc<HttpHandler>,
    guard: CancelGuard,
    url: String,
    foreign_id: String,
) -> ResourceResult<Option<ChunkStream>> {
    let parsed = match parse_url(&url) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(dataset = %foreign_id, event = "fetch_failed", "Invalid resource URL: {}", e);
            return Ok(None);
        }
    };

    debug!(dataset = %foreign_id, "Opening resource {}", url);
    let response = match guard.run(http.get_stream(&parsed)).await {
        Ok(response) => response,
        Err(e) if e.is_interrupt() => return Err(e.into()),
        Err(e) => {
            match e.status() {
                Some(status) => error!(
                    dataset = %foreign_id,
                    event = "fetch_failed",
                    status,
                    "Resource fetch failed for {}: {}", url, e
                ),
                None => error!(
                    dataset = %foreign_id,
                    event = "fetch_failed",
                    "Resource fetch failed for {}: {}", url, e
                ),
            }
            return Ok(None);
        }
    };

    let status = response.status();
    if !status.is_success() {
        error!(
            dataset = %foreign_id,
            event = "fetch_failed",
            status = status.as_u16(),
            "Resource fetch returned HTTP {} for {}",
            status.as_u16(),
            url
        );
        return Ok(None);
    }

    Ok(Some(body_chunks(response, guard)))
}

fn body_chunks(response: Response, guard: CancelGuard) -> ChunkStream {
    stream::try_unfold((response, guard), |(mut response, guard)| async move {
        let chunk = guard
            .run(async { response.chunk().await.map_err(FetchError::Http) })
            .await?;
        Ok(chunk.map(|bytes| (bytes, (response, guard))))
    })
    .boxed()
}

/// Splits a byte stream into lines without holding more than the current
/// partial line
///
/// Consumed lines are only marked off; the buffer is compacted once per
/// pushed chunk, and each byte is searched for a newline once.
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
    /// Offset of the first unconsumed byte
    start: usize,
    /// Offset up to which the buffer holds no newline
    scanned: usize,
    line: usize,
}

impl LineDecoder {
    fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line and its 1-based number
    fn next_line(&mut self) -> Option<(usize, Vec<u8>)> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        let line = trim_cr(&self.buffer[self.start..end]).to_vec();
        self.start = end + 1;
        self.scanned = self.start;
        self.line += 1;
        Some((self.line, line))
    }

    /// Bytes of the partial line held so far
    fn pending_len(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Number the partial line will get once complete
    fn pending_line(&self) -> usize {
        self.line + 1
    }

    /// Trailing data after the last newline, once the body has ended
    fn finish(&mut self) -> Option<(usize, Vec<u8>)> {
        if self.pending_len() == 0 {
            return None;
        }
        let line = trim_cr(&self.buffer[self.start..]).to_vec();
        self.buffer.clear();
        self.start = 0;
        self.scanned = 0;
        self.line += 1;
        Some((self.line, line))
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Lazy sequence of JSON records read from one resource body
///
/// Blank lines are skipped. The first malformed line ends the stream with
/// [`ResourceError::Parse`] after every earlier record has been yielded, and
/// a line longer than the limit ends it with [`ResourceError::LineTooLong`].
/// The stream yields nothing further after any error.
pub struct RecordStream {
    foreign_id: String,
    chunks: ChunkStream,
    decoder: LineDecoder,
    max_line: usize,
    records: usize,
    body_done: bool,
    finished: bool,
}

impl RecordStream {
    /// Decode records from an arbitrary chunk stream
    pub fn from_chunks(foreign_id: &str, chunks: ChunkStream) -> Self {
        Self {
            foreign_id: foreign_id.to_string(),
            chunks,
            decoder: LineDecoder::default(),
            max_line: MAX_LINE_BYTES,
            records: 0,
            body_done: false,
            finished: false,
        }
    }

    /// Fail the stream once a partial line grows past `limit` bytes
    pub fn with_max_line_length(mut self, limit: usize) -> Self {
        self.max_line = limit;
        self
    }

    /// Foreign identifier of the dataset this stream belongs to
    pub fn foreign_id(&self) -> &str {
        &self.foreign_id
    }

    /// Records yielded so far
    pub fn records_read(&self) -> usize {
        self.records
    }

    fn decode(&mut self, line_no: usize, line: &[u8]) -> Option<ResourceResult<Value>> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        match serde_json::from_slice(line) {
            Ok(value) => {
                self.records += 1;
                if self.records % PROGRESS_INTERVAL == 0 {
                    info!(
                        dataset = %self.foreign_id,
                        event = "progress",
                        count = self.records,
                        "Streamed {} records",
                        self.records
                    );
                }
                Some(Ok(value))
            }
            Err(source) => {
                self.finished = true;
                error!(
                    dataset = %self.foreign_id,
                    "Invalid JSON on line {} after {} records: {}",
                    line_no,
                    self.records,
                    source
                );
                Some(Err(ResourceError::Parse {
                    line: line_no,
                    source,
                }))
            }
        }
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("foreign_id", &self.foreign_id)
            .field("records", &self.records)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Stream for RecordStream {
    type Item = ResourceResult<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some((line_no, line)) = this.decoder.next_line() {
                match this.decode(line_no, &line) {
                    Some(item) => return Poll::Ready(Some(item)),
                    None => continue,
                }
            }

            if this.decoder.pending_len() > this.max_line {
                this.finished = true;
                let line = this.decoder.pending_line();
                error!(
                    dataset = %this.foreign_id,
                    "Line {} exceeds {} bytes after {} records",
                    line,
                    this.max_line,
                    this.records
                );
                return Poll::Ready(Some(Err(ResourceError::LineTooLong {
                    line,
                    limit: this.max_line,
                })));
            }

            if this.body_done {
                if let Some((line_no, line)) = this.decoder.finish() {
                    if let Some(item) = this.decode(line_no, &line) {
                        return Poll::Ready(Some(item));
                    }
                }
                this.finished = true;
                debug!(
                    dataset = %this.foreign_id,
                    "Resource stream finished after {} records",
                    this.records
                );
                return Poll::Ready(None);
            }

            match this.chunks.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.decoder.push(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => this.body_done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
