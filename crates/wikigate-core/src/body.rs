//! Streaming body type
//!
//! Requests and responses travel through the gateway without being collected
//! into memory. Every layer speaks [`Body`], a boxed body that can wrap a
//! hyper `Incoming` stream, an upstream response, or a small static payload.

use bytes::Bytes;
use http_body::{Body as _, Frame, SizeHint};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Boxed error type carried by body streams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type used across the gateway
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Body with a fixed in-memory payload
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body with no payload
pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Box any streaming body whose error converts into [`BoxError`]
pub fn boxed<B>(body: B) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// How a response body stream finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOutcome {
    /// Every frame was produced
    Complete,
    /// The stream yielded an error
    Failed,
    /// The body was dropped before its end, e.g. the client went away
    Aborted,
}

type CompletionFn = Box<dyn FnOnce(BodyOutcome) + Send>;

/// Body wrapper that reports once, when the inner stream finishes
pub struct OnComplete {
    inner: Body,
    callback: Option<CompletionFn>,
}

impl OnComplete {
    fn finish(&mut self, outcome: BodyOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl fmt::Debug for OnComplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnComplete")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

impl http_body::Body for OnComplete {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => self.finish(BodyOutcome::Complete),
            Poll::Ready(Some(Err(_))) => self.finish(BodyOutcome::Failed),
            // hyper stops polling once `is_end_stream` holds.
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => {
                self.finish(BodyOutcome::Complete)
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for OnComplete {
    fn drop(&mut self) {
        let outcome = if self.inner.is_end_stream() {
            BodyOutcome::Complete
        } else {
            BodyOutcome::Aborted
        };
        self.finish(outcome);
    }
}

/// Wrap `body` so `callback` runs exactly once when the stream ends, fails
/// or is dropped
pub fn on_complete<F>(body: Body, callback: F) -> Body
where
    F: FnOnce(BodyOutcome) + Send + 'static,
{
    OnComplete {
        inner: body,
        callback: Some(Box::new(callback)),
    }
    .boxed_unsync()
}
