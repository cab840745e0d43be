use crate::body::LimiterBody;
use crate::codec::CONTENT_ENCODING;
use crate::compressor::TruncatingCompressor;
use crate::error::InvalidHeaderError;
use crate::gate::{ControlHeaders, HandlingMode};
use flate2::Compression;
use http::{HeaderMap, Response, StatusCode, header};
use pin_project_lite::pin_project;
use std::future::{self, Future, Ready};
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tower::BoxError;

pin_project! {
    /// Future for package limiter service responses.
    ///
    /// Like any future, it must not be polled again once it has returned
    /// `Poll::Ready`.
    #[project = ResponseFutureProj]
    #[allow(missing_docs)]
    pub enum ResponseFuture<F> {
        /// The request was rejected before reaching the inner service.
        Rejected {
            #[pin]
            error: Ready<InvalidHeaderError>,
        },
        /// Waiting on the inner service.
        Inner {
            #[pin]
            inner: F,
            control: ControlHeaders,
            limit: NonZeroUsize,
            level: Compression,
        },
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn rejected(error: InvalidHeaderError) -> Self {
        Self::Rejected {
            error: future::ready(error),
        }
    }

    pub(crate) fn new(
        inner: F,
        control: ControlHeaders,
        limit: NonZeroUsize,
        level: Compression,
    ) -> Self {
        Self::Inner {
            inner,
            control,
            limit,
            level,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
    E: Into<BoxError>,
{
    type Output = Result<Response<LimiterBody<B>>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Rejected { error } => error.poll(cx).map(|e| Err(e.into())),
            ResponseFutureProj::Inner {
                inner,
                control,
                limit,
                level,
            } => match inner.poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
                Poll::Ready(Ok(response)) => {
                    let mode = control.classify(response.headers().get(header::CONTENT_TYPE));
                    tracing::debug!(?mode, limit = limit.get(), "package limiter applied");
                    let response = limit_response_with_level(response, mode, limit.get(), *level);
                    Poll::Ready(Ok(response))
                }
            },
        }
    }
}

/// Applies a handling mode to a response.
///
/// - [`HandlingMode::PassThrough`] returns the response unchanged.
/// - [`HandlingMode::Suppress`] returns `204 No Content` with no headers
///   and an empty body.
/// - [`HandlingMode::Rewrite`] keeps the status, sets
///   `Content-Encoding: gzip`, drops `Content-Length`, and caps the
///   gzipped body at `limit` bytes. The gzip modification time is taken
///   from `Last-Modified` when it parses, otherwise the current time.
pub fn limit_response<B>(
    response: Response<B>,
    mode: HandlingMode,
    limit: usize,
) -> Response<LimiterBody<B>> {
    limit_response_with_level(response, mode, limit, Compression::default())
}

fn limit_response_with_level<B>(
    response: Response<B>,
    mode: HandlingMode,
    limit: usize,
    level: Compression,
) -> Response<LimiterBody<B>> {
    match mode {
        HandlingMode::PassThrough => response.map(LimiterBody::passthrough),
        HandlingMode::Suppress => {
            let mut suppressed = Response::new(LimiterBody::suppressed());
            *suppressed.status_mut() = StatusCode::NO_CONTENT;
            suppressed
        }
        HandlingMode::Rewrite => {
            let (mut parts, body) = response.into_parts();

            let mtime = last_modified(&parts.headers).unwrap_or_else(SystemTime::now);

            parts.headers.insert(
                header::CONTENT_ENCODING,
                header::HeaderValue::from_static(CONTENT_ENCODING),
            );

            // Truncation makes the final length unpredictable
            parts.headers.remove(header::CONTENT_LENGTH);

            let compressor = TruncatingCompressor::with_level(mtime, limit, level);
            Response::from_parts(parts, LimiterBody::limited(body, compressor))
        }
    }
}

/// Parses the `Last-Modified` header as an HTTP-date.
fn last_modified(headers: &HeaderMap) -> Option<SystemTime> {
    let value = headers.get(header::LAST_MODIFIED)?;
    let parsed = value
        .to_str()
        .ok()
        .and_then(|v| httpdate::parse_http_date(v).ok());
    if parsed.is_none() {
        tracing::debug!(?value, "ignoring unparseable Last-Modified header");
    }
    parsed
}
