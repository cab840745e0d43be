use crate::compressor::TruncatingCompressor;
use bytes::{Buf, Bytes};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::BoxError;

pin_project! {
    /// The response body produced by the limiter.
    ///
    /// Depending on the handling mode the inner body is forwarded as is,
    /// dropped entirely, or gzipped and truncated.
    #[project = LimiterBodyProj]
    #[allow(missing_docs)]
    pub enum LimiterBody<B> {
        /// Body forwarded unchanged.
        Passthrough {
            #[pin]
            inner: B,
        },
        /// Empty body of a suppressed response.
        Suppressed,
        /// Gzipped body capped at a number of compressed bytes.
        Limited {
            #[pin]
            inner: B,
            state: LimitedBody,
        },
    }
}

/// State of an actively compressed and capped body.
pub struct LimitedBody {
    compressor: TruncatingCompressor,
    state: LimitState,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for the capped stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LimitState {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finalizing the gzip stream after the inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// The stream is complete.
    Done,
}

impl LimitedBody {
    fn new(compressor: TruncatingCompressor) -> Self {
        Self {
            compressor,
            state: LimitState::Reading,
            pending_trailers: None,
        }
    }

    /// Returns the compressor driving this body.
    pub fn compressor(&self) -> &TruncatingCompressor {
        &self.compressor
    }

    pub(crate) fn state(&self) -> LimitState {
        self.state
    }

    fn after_finish(&self) -> LimitState {
        if self.pending_trailers.is_some() {
            LimitState::Trailers
        } else {
            LimitState::Done
        }
    }

    /// Polls the inner body, compressing and capping its data.
    ///
    /// Inner data keeps being consumed after the cap is hit so the encoder
    /// runs to completion; nothing past the cap is ever emitted.
    fn poll_limited<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        loop {
            match self.state {
                LimitState::Done => return Poll::Ready(None),

                LimitState::Trailers => {
                    self.state = LimitState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                }

                LimitState::Finishing => {
                    let data = match self.compressor.finish() {
                        Ok(data) => data,
                        Err(e) => return Poll::Ready(Some(Err(e.into()))),
                    };
                    self.state = self.after_finish();
                    if !data.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(data))));
                    }
                }

                LimitState::Reading => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = LimitState::Finishing;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        return Poll::Ready(Some(Err(e.into())));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => {
                            let chunk = data.copy_to_bytes(data.remaining());
                            match self.compressor.write(&chunk) {
                                Ok(out) if out.is_empty() => {}
                                Ok(out) => return Poll::Ready(Some(Ok(Frame::data(out)))),
                                Err(e) => return Poll::Ready(Some(Err(e.into()))),
                            }
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Buffer trailers and finish compression first
                                self.pending_trailers = Some(trailers);
                                self.state = LimitState::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }
}

impl std::fmt::Debug for LimitedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedBody")
            .field("compressor", &self.compressor)
            .field("state", &self.state)
            .finish()
    }
}

impl<B: std::fmt::Debug> std::fmt::Debug for LimiterBody<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimiterBody::Passthrough { inner } => {
                f.debug_struct("Passthrough").field("inner", inner).finish()
            }
            LimiterBody::Suppressed => f.write_str("Suppressed"),
            LimiterBody::Limited { inner, state } => f
                .debug_struct("Limited")
                .field("inner", inner)
                .field("state", state)
                .finish(),
        }
    }
}

impl<B> LimiterBody<B> {
    /// Creates a body that forwards `inner` unchanged.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }

    /// Creates an empty body.
    pub fn suppressed() -> Self {
        Self::Suppressed
    }

    /// Creates a body that compresses `inner` through `compressor`.
    pub fn limited(inner: B, compressor: TruncatingCompressor) -> Self {
        Self::Limited {
            inner,
            state: LimitedBody::new(compressor),
        }
    }
}

impl<B> Body for LimiterBody<B>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            LimiterBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e.into()))),
            },
            LimiterBodyProj::Suppressed => Poll::Ready(None),
            LimiterBodyProj::Limited { inner, state } => state.poll_limited(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            LimiterBody::Passthrough { inner } => inner.is_end_stream(),
            LimiterBody::Suppressed => true,
            LimiterBody::Limited { state, .. } => state.state() == LimitState::Done,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            LimiterBody::Passthrough { inner } => inner.size_hint(),
            LimiterBody::Suppressed => SizeHint::with_exact(0),
            // Compressed size is unknown
            LimiterBody::Limited { .. } => SizeHint::default(),
        }
    }
}
