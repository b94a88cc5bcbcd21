//! Streaming response body and drain support.
//!
//! # Responsibilities
//! - Forward upstream frames to the client one at a time (pull-driven)
//! - Count forwarded bytes for the access log
//! - On upstream error or client disconnect, drain what is left upstream
//!   in the background, then log the original failure
//!
//! # Design Decisions
//! - The client pulls frames; a slow client throttles upstream reads
//! - Nothing is written after a failure; the client sees a truncated body
//! - Drains are bounded by a timeout so a stalled upstream cannot pin a task
//! - Draining keeps only a length and a SHA-256 digest for diagnostics

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes};
use http_body_util::BodyExt;
use hyper::body::{Body, Frame, SizeHint};
use sha2::{Digest, Sha256};

use crate::observability::{metrics, AccessRecord};

/// What a drain consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainSummary {
    pub length: u64,
    /// Hex SHA-256 of the discarded bytes.
    pub digest: String,
    /// Set when the body itself failed while draining.
    pub error: Option<String>,
}

/// Consume and discard the rest of `body`.
pub async fn drain<B>(mut body: B) -> DrainSummary
where
    B: Body + Unpin,
    B::Error: fmt::Display,
{
    let mut hasher = Sha256::new();
    let mut length = 0u64;
    let mut error = None;

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(mut data) = frame.into_data() {
                    while data.has_remaining() {
                        let chunk = data.chunk();
                        let n = chunk.len();
                        hasher.update(chunk);
                        length += n as u64;
                        data.advance(n);
                    }
                }
            }
            Err(err) => {
                error = Some(err.to_string());
                break;
            }
        }
    }

    DrainSummary {
        length,
        digest: hex::encode(hasher.finalize()),
        error,
    }
}

/// Terminal bookkeeping for one proxied response.
#[derive(Debug)]
pub struct StreamLog {
    pub access: AccessRecord,
    pub upstream: String,
    pub drain_timeout: Duration,
}

impl StreamLog {
    fn complete(self, forwarded: u64) {
        tracing::debug!(upstream = %self.upstream, bytes = forwarded, "Upstream response forwarded");
        self.access.emit(None);
    }

    /// Drain `body` in the background, then log `reason`.
    fn abort<B>(self, body: Option<B>, forwarded: u64, kind: &'static str, reason: String)
    where
        B: Body + Unpin + Send + 'static,
        B::Data: Send,
        B::Error: fmt::Display + Send,
    {
        metrics::record_upstream_error(kind);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(upstream = %self.upstream, error = %reason, "Response stream failed outside a runtime");
            self.access.emit(Some(reason.as_str()));
            return;
        };

        runtime.spawn(async move {
            let drained = match body {
                Some(body) => tokio::time::timeout(self.drain_timeout, drain(body)).await.ok(),
                None => Some(DrainSummary {
                    length: 0,
                    digest: hex::encode(Sha256::digest(b"")),
                    error: None,
                }),
            };

            match drained {
                Some(summary) => tracing::warn!(
                    upstream = %self.upstream,
                    forwarded,
                    drained = summary.length,
                    digest = %summary.digest,
                    error = %reason,
                    "Response stream failed, upstream drained"
                ),
                None => tracing::warn!(
                    upstream = %self.upstream,
                    forwarded,
                    timeout = ?self.drain_timeout,
                    error = %reason,
                    "Response stream failed, upstream drain timed out"
                ),
            }
            self.access.emit(Some(reason.as_str()));
        });
    }
}

/// Upstream response body as sent to the client.
pub struct ProxyBody<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: fmt::Display + Send,
{
    inner: Option<B>,
    forwarded: u64,
    log: Option<StreamLog>,
}

impl<B> ProxyBody<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: fmt::Display + Send,
{
    pub fn new(inner: B, log: StreamLog) -> Self {
        Self {
            inner: Some(inner),
            forwarded: 0,
            log: Some(log),
        }
    }
}

impl<B> Body for ProxyBody<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: fmt::Display + Send,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.forwarded += data.len() as u64;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                let body = this.inner.take();
                if let Some(log) = this.log.take() {
                    log.abort(body, this.forwarded, "stream", err.to_string());
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                if let Some(log) = this.log.take() {
                    log.complete(this.forwarded);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.as_ref().map_or(true, Body::is_end_stream)
    }

    fn size_hint(&self) -> SizeHint {
        self.inner
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), Body::size_hint)
    }
}

impl<B> Drop for ProxyBody<B>
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: fmt::Display + Send,
{
    fn drop(&mut self) {
        let Some(log) = self.log.take() else {
            return;
        };
        match self.inner.take() {
            Some(body) if !body.is_end_stream() => {
                log.abort(
                    Some(body),
                    self.forwarded,
                    "aborted",
                    "client disconnected before the response completed".to_string(),
                );
            }
            _ => log.complete(self.forwarded),
        }
    }
}
