use crate::future::ResponseFuture;
use crate::gate::LimiterConfig;
use http::Request;
use std::task::{Context, Poll};
use tower::{BoxError, Service};

/// A Tower service that applies the package limiter to responses.
#[derive(Debug, Clone)]
pub struct PackageLimiterService<S> {
    inner: S,
    config: LimiterConfig,
}

impl<S> PackageLimiterService<S> {
    /// Creates a new limiter service wrapping the given inner service.
    pub fn new(inner: S, config: LimiterConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the configuration of this service.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for PackageLimiterService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: Into<BoxError>,
{
    type Response = http::Response<crate::body::LimiterBody<ResBody>>;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Malformed control headers never reach the inner service
        let control = match self.config.validate(req.headers()) {
            Ok(control) => control,
            Err(error) => {
                tracing::warn!(header = %error.header(), %error, "rejecting request");
                return ResponseFuture::rejected(error);
            }
        };

        let limit = self.config.effective_limit(&control);
        let inner = self.inner.call(req);

        ResponseFuture::new(inner, control, limit, self.config.level)
    }
}
