#![allow(unreachable_pub)]

mod cache;
mod destination;
mod error;
mod priority;
mod request;
mod response;

pub use cache::CacheLoadControl;
pub use destination::{DestinationKey, HTTP_PORT, HTTPS_PORT, url_port};
pub use error::ErrorKind;
pub use priority::Priority;
pub use request::Request;
pub use response::{Document, Response};

/// The webqueue `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
