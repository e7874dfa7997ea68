//! `webqueue` schedules HTTP requests against rate-limited web services.
//!
//! Requests are queued per destination (`host:port`) and per priority
//! tier. A single scheduler task starts at most one request per
//! destination and pass, keeping a minimum interval between requests
//! to the same destination. Redirects are resolved by the scheduler
//! itself, so redirected requests are paced too and redirect loops are
//! caught. Response bodies are decoded by pluggable parsers.
//!
//! ```no_run
//! use webqueue_lib::{Document, Result, ServiceBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = ServiceBuilder::default().start()?;
//!     let response = service
//!         .get("musicbrainz.org", 443, "/ws/2/release")
//!         .query("query", "release:Homogenic")
//!         .submit()
//!         .await?;
//!     if let Document::Json(json) = response.document {
//!         println!("{json:#}");
//!     }
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
mod test_utils;

mod auth;
mod builder;
mod config;
mod scheduler;
mod service;
mod tracker;
mod types;
mod utils;

pub mod parser;
pub mod ratelimit;
pub mod transport;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use builder::RequestDescriptor;
pub use config::{
    DEFAULT_COUNT_PENDING_INTERVAL, DEFAULT_SERVER_HOST, DEFAULT_TOKEN_ENDPOINT, ProxyConfig,
    ServiceConfig, default_user_agent,
};
pub use scheduler::{ShutdownSummary, TaskHandle, TaskId};
pub use service::{Call, Pending, ServiceBuilder, WebService};
pub use transport::{ErrorCode, Reply, Transport, TransportError};
pub use types::*;
