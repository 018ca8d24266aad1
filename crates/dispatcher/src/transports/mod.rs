//! Transport implementations
//!
//! Contains HttpBeaconTransport and LogTransport.

mod http;
mod log;

pub use self::http::HttpBeaconTransport;
pub use self::log::LogTransport;
