//! # Host Bridge Traits
//!
//! Capabilities the mirror core needs from its host but does not implement
//! itself.
//!
//! ## Overview
//!
//! The synchronization engine downloads artwork over HTTP and writes it under
//! an asset root on disk. Both operations go through the traits in this crate
//! so the engine can be driven by the desktop adapters in `bridge-desktop`, by
//! a host application's own stack, or by mocks in tests.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests with retry policy
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Asset tree writes, removal and sizing
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::Error;
//!
//! let http_client = config.http_client.clone().ok_or_else(|| Error::CapabilityMissing {
//!     capability: "HttpClient".to_string(),
//!     message: "No HTTP client provided. Enable 'desktop-shims' or inject one.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! Implementations convert their native errors and keep the offending URL or
//! path in the message.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so a single adapter can be shared between
//! the request path and the background sync worker through `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
