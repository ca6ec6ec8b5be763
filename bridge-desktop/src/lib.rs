//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry and exponential backoff
//! - `FileSystemAccess` using `tokio::fs`
//!
//! `core-runtime` injects these automatically when its `desktop-shims`
//! feature is enabled and the host did not provide its own adapters.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::new(Duration::from_secs(30))?;
//! let fs = TokioFileSystem::new();
//! ```

mod filesystem;
mod http;

pub use filesystem::{default_data_dir, TokioFileSystem};
pub use http::ReqwestHttpClient;
