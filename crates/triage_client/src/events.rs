use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use triage_logging::{triage_debug, triage_info, triage_warn};

use crate::handoff::{cancellable, deliver};
use crate::{ApiRequest, ClientError, RequestExecutor, Sample};

/// Snapshots in flight between the network reader and the consumer.
pub const EVENT_BUFFER: usize = 1;

/// Which samples to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    Sample(String),
    /// Every sample owned by the caller.
    AllSamples,
}

impl EventScope {
    pub(crate) fn request(&self) -> ApiRequest {
        match self {
            EventScope::Sample(sample_id) => {
                ApiRequest::get(format!("/v0/samples/{sample_id}/events"))
            }
            EventScope::AllSamples => ApiRequest::get("/v0/samples/events"),
        }
    }
}

/// Lazily pulled sequence of sample snapshots read from a long-lived NDJSON
/// response.
///
/// Ends cleanly when the server closes the body. A failed request, a read
/// error or a malformed value yields exactly one `Err` and ends the stream.
/// Dropping the stream closes the connection.
pub struct EventStream {
    rx: mpsc::Receiver<Result<Sample, ClientError>>,
    cancel: CancellationToken,
}

impl EventStream {
    /// Opens the subscription. Must be called from within a tokio runtime.
    pub fn subscribe(
        executor: Arc<dyn RequestExecutor>,
        scope: EventScope,
        cancel: &CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(run_events(executor, scope, tx, cancel.clone()));
        Self { rx, cancel }
    }

    pub async fn next(&mut self) -> Option<Result<Sample, ClientError>> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for EventStream {
    type Item = Result<Sample, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_events(
    executor: Arc<dyn RequestExecutor>,
    scope: EventScope,
    tx: mpsc::Sender<Result<Sample, ClientError>>,
    cancel: CancellationToken,
) {
    let mut body = match cancellable(&cancel, executor.open_stream(scope.request())).await {
        Ok(body) => body,
        Err(ClientError::Cancelled) => return,
        Err(err) => {
            triage_warn!("event stream {:?} failed to open: {}", scope, err);
            deliver(&tx, &cancel, Err(err)).await;
            return;
        }
    };
    triage_info!("event stream {:?} opened", scope);

    let mut decoder = NdjsonDecoder::default();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                triage_debug!("event stream {:?} abandoned", scope);
                return;
            }
            chunk = body.next() => chunk,
        };
        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                triage_warn!("event stream {:?} read failed: {}", scope, err);
                deliver(&tx, &cancel, Err(err)).await;
                return;
            }
            None => {
                if let Err(err) = decoder.finish() {
                    triage_warn!("event stream {:?} ended mid-value: {}", scope, err);
                    deliver(&tx, &cancel, Err(err)).await;
                } else {
                    triage_debug!("event stream {:?} closed by server", scope);
                }
                return;
            }
        };

        decoder.push(&bytes);
        loop {
            match decoder.next_value::<Sample>() {
                Ok(Some(sample)) => {
                    if !deliver(&tx, &cancel, Ok(sample)).await {
                        return;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    triage_warn!("event stream {:?} decode failed: {}", scope, err);
                    deliver(&tx, &cancel, Err(err)).await;
                    return;
                }
            }
        }
    }
}

/// Splits a byte stream into consecutive JSON values separated by optional
/// whitespace. Values may straddle chunk boundaries.
///
/// Each byte is scanned once to find where the leading value ends, so a value
/// is only parsed when it is complete.
#[derive(Debug, Default)]
pub(crate) struct NdjsonDecoder {
    buf: Vec<u8>,
    boundary: Boundary,
    /// Buffer length at the last parse that ran out of input.
    attempted: usize,
}

impl NdjsonDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete value, or `None` when more input is needed.
    pub(crate) fn next_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ClientError> {
        if !self.boundary.advance(&self.buf) {
            if !self.boundary.started {
                self.reset(self.buf.len());
            }
            return Ok(None);
        }
        if self.buf.len() == self.attempted {
            return Ok(None);
        }
        let (next, consumed) = {
            let mut values = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
            let next = values.next();
            (next, values.byte_offset())
        };
        match next {
            Some(Ok(value)) => {
                self.reset(consumed);
                Ok(Some(value))
            }
            Some(Err(err)) if err.is_eof() => {
                self.attempted = self.buf.len();
                Ok(None)
            }
            Some(Err(err)) => Err(ClientError::Decode(err.to_string())),
            None => {
                self.reset(self.buf.len());
                Ok(None)
            }
        }
    }

    fn reset(&mut self, consumed: usize) {
        self.buf.drain(..consumed);
        self.boundary = Boundary::default();
        self.attempted = 0;
    }

    /// Fails when the input ended in the middle of a value.
    pub(crate) fn finish(&self) -> Result<(), ClientError> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(ClientError::Decode(format!(
                "stream ended inside a value ({} trailing bytes)",
                self.buf.len()
            )))
        }
    }
}

/// Tracks where the leading value of a buffer ends without parsing it.
#[derive(Debug, Default)]
struct Boundary {
    scanned: usize,
    depth: u32,
    in_string: bool,
    escaped: bool,
    started: bool,
    found: bool,
}

impl Boundary {
    /// Scans the bytes added since the last call. Returns `true` once the
    /// leading value looks complete. Scalars and stray bytes at the top level
    /// count as complete and are left to the parser.
    fn advance(&mut self, buf: &[u8]) -> bool {
        while !self.found && self.scanned < buf.len() {
            let byte = buf[self.scanned];
            self.scanned += 1;
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => {
                        self.in_string = false;
                        self.found = self.depth == 0;
                    }
                    _ => {}
                }
                continue;
            }
            if byte.is_ascii_whitespace() {
                continue;
            }
            self.started = true;
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.found = self.depth == 0;
                }
                _ => self.found = self.depth == 0,
            }
        }
        self.found
    }
}
