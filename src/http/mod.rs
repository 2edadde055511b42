//! HTTP client module
//!
//! Provides the HTTP client every connector talks through.
//!
//! # Features
//!
//! - **Transport Retries**: exponential backoff for 5xx, timeouts, connect errors
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Throttle Signalling**: 429 surfaces as `Error::RateLimited`

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestBody, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
