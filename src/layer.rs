use crate::gate::LimiterConfig;
use crate::service::PackageLimiterService;
use flate2::Compression;
use http::HeaderName;
use std::num::NonZeroUsize;
use tower::Layer;

/// A Tower layer that gzips and truncates HTML responses on request.
///
/// Each request opts in through the enable header and may pick its own
/// byte limit through the limit header.
#[derive(Debug, Clone, Default)]
pub struct PackageLimiterLayer {
    config: LimiterConfig,
}

impl PackageLimiterLayer {
    /// Creates a new limiter layer with default settings.
    ///
    /// The default limit is 14000 compressed bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the header that enables the limiter.
    pub fn enable_header(mut self, name: HeaderName) -> Self {
        self.config.enable_header = name;
        self
    }

    /// Sets the name of the header that carries the byte limit.
    pub fn limit_header(mut self, name: HeaderName) -> Self {
        self.config.limit_header = name;
        self
    }

    /// Sets the limit used when a request carries no limit header.
    pub fn default_limit(mut self, limit: NonZeroUsize) -> Self {
        self.config.default_limit = limit;
        self
    }

    /// Sets the gzip compression level.
    pub fn level(mut self, level: Compression) -> Self {
        self.config.level = level;
        self
    }

    /// Returns the configuration services built by this layer will use.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }
}

impl<S> Layer<S> for PackageLimiterLayer {
    type Service = PackageLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PackageLimiterService::new(inner, self.config.clone())
    }
}
