//! # Contracts
//!
//! Frozen interface contracts between the tracker runtime and its host.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Host Model
//! - The host (page runtime) supplies navigation, cookies, capability detection
//!   and click target resolution through the traits in [`host`]
//! - Tracking backends only compute beacon URLs; they never perform I/O
//! - Transports perform the beacon request and report nothing but "settled"

mod backend;
mod config;
mod error;
mod event;
pub mod host;
mod transport;
mod version;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use host::{
    BrowserIdentity, CapabilityProbe, CookieJar, HostCapabilities, Navigator, TargetResolver,
};
pub use transport::{BeaconTransport, LocalBeaconTransport};
pub use version::DottedVersion;
