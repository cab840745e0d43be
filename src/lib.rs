//! HTTP response package limiter middleware for Tower.
//!
//! This crate provides a Tower layer that, on request, gzips HTML responses
//! and truncates the compressed stream to a fixed number of bytes. It lets
//! you see how a page behaves when only its first few kilobytes arrive,
//! e.g. to check that the critical rendering path fits in the initial TCP
//! congestion window, without touching the application.
//!
//! # Example
//!
//! ```ignore
//! use http_package_limiter::PackageLimiterLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(PackageLimiterLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Control Headers
//!
//! - `X-Agouti-Enable`: absent or `0` leaves the response untouched,
//!   `1` turns the limiter on.
//! - `X-Agouti-Limit`: a positive integer capping the compressed body.
//!   Defaults to 14000 when absent.
//!
//! Any other value for either header rejects the request with
//! [`InvalidHeaderError`] before the inner service is called.
//!
//! # Response Modifications
//!
//! When the limiter is on:
//! - A response whose `Content-Type` is not exactly `text/html` is replaced
//!   by `204 No Content` with no headers and an empty body
//! - Otherwise `Content-Encoding` is set to `gzip`, `Content-Length` is
//!   removed, and the body is gzipped and cut off once the limit is reached
//! - The gzip header carries the `Last-Modified` time, or the current time

#![deny(missing_docs)]

mod body;
mod codec;
mod compressor;
mod error;
mod future;
mod gate;
mod layer;
mod service;

pub use body::{LimitedBody, LimiterBody};
pub use compressor::TruncatingCompressor;
pub use error::InvalidHeaderError;
pub use future::{ResponseFuture, limit_response};
pub use gate::{
    ControlHeaders, DEFAULT_ENABLE_HEADER, DEFAULT_LIMIT, DEFAULT_LIMIT_HEADER, HandlingMode,
    LimiterConfig,
};
pub use layer::PackageLimiterLayer;
pub use service::PackageLimiterService;
