use crate::error::InvalidHeaderError;
use flate2::Compression;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::num::NonZeroUsize;

/// Default name of the header that switches the limiter on.
pub const DEFAULT_ENABLE_HEADER: HeaderName = HeaderName::from_static("x-agouti-enable");

/// Default name of the header that carries the byte limit.
pub const DEFAULT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-agouti-limit");

/// Default cap on compressed bytes, roughly the initial TCP congestion window.
pub const DEFAULT_LIMIT: NonZeroUsize = match NonZeroUsize::new(14_000) {
    Some(limit) => limit,
    None => unreachable!(),
};

/// How a response is treated once the inner service has produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingMode {
    /// The response is returned untouched.
    PassThrough,
    /// The response is replaced by an empty `204 No Content`.
    Suppress,
    /// The body is gzipped and truncated to the effective limit.
    Rewrite,
}

/// The validated pair of control headers read from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlHeaders {
    enabled: bool,
    limit: Option<NonZeroUsize>,
}

impl ControlHeaders {
    /// Returns whether the enable flag was set to `1`.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the byte limit sent by the client, if any.
    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    /// Returns the client's byte limit, or `default` when none was sent.
    pub fn effective_limit(&self, default: NonZeroUsize) -> NonZeroUsize {
        self.limit.unwrap_or(default)
    }

    /// Decides how to treat a response with the given `Content-Type`.
    ///
    /// Only a content type of exactly `text/html` is rewritten; anything
    /// else, including a missing header, is suppressed while enabled.
    pub fn classify(&self, content_type: Option<&HeaderValue>) -> HandlingMode {
        if !self.enabled {
            return HandlingMode::PassThrough;
        }

        match content_type {
            Some(ct) if ct.as_bytes() == b"text/html" => HandlingMode::Rewrite,
            _ => HandlingMode::Suppress,
        }
    }
}

/// Settings shared by the layer and every service it builds.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub(crate) enable_header: HeaderName,
    pub(crate) limit_header: HeaderName,
    pub(crate) default_limit: NonZeroUsize,
    pub(crate) level: Compression,
}

impl LimiterConfig {
    /// Returns the name of the enable flag header.
    pub fn enable_header(&self) -> &HeaderName {
        &self.enable_header
    }

    /// Returns the name of the byte limit header.
    pub fn limit_header(&self) -> &HeaderName {
        &self.limit_header
    }

    /// Returns the limit applied when a request carries no limit header.
    pub fn default_limit(&self) -> NonZeroUsize {
        self.default_limit
    }

    /// Returns the compression level used for rewritten bodies.
    pub fn level(&self) -> Compression {
        self.level
    }

    /// Validates the control headers of a request.
    ///
    /// Both headers may be absent. When present, the enable flag must be
    /// exactly `0` or `1` and the limit must be a positive decimal integer.
    pub fn validate(&self, headers: &HeaderMap) -> Result<ControlHeaders, InvalidHeaderError> {
        let enabled = match headers.get(&self.enable_header) {
            None => false,
            Some(value) => match value.as_bytes() {
                b"0" => false,
                b"1" => true,
                _ => {
                    return Err(InvalidHeaderError::Enable {
                        header: self.enable_header.clone(),
                        value: lossy(value),
                    });
                }
            },
        };

        let limit = match headers.get(&self.limit_header) {
            None => None,
            Some(value) => Some(parse_limit(value).ok_or_else(|| InvalidHeaderError::Limit {
                header: self.limit_header.clone(),
                value: lossy(value),
            })?),
        };

        Ok(ControlHeaders { enabled, limit })
    }

    /// Returns the cap for a validated request.
    pub fn effective_limit(&self, control: &ControlHeaders) -> NonZeroUsize {
        control.effective_limit(self.default_limit)
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enable_header: DEFAULT_ENABLE_HEADER,
            limit_header: DEFAULT_LIMIT_HEADER,
            default_limit: DEFAULT_LIMIT,
            level: Compression::default(),
        }
    }
}

/// Parses a strictly positive decimal integer made of ASCII digits only.
fn parse_limit(value: &HeaderValue) -> Option<NonZeroUsize> {
    let bytes = value.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }

    // Digits only, so this is valid UTF-8 and carries no sign.
    std::str::from_utf8(bytes).ok()?.parse::<NonZeroUsize>().ok()
}

fn lossy(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}
