//! StampTrail Core Library
//!
//! Client engine for a location-based stamp rally hosted inside a messaging
//! platform. Provides the session store, the backend gateway client, the
//! identity bootstrap, the check-in workflow state machine, and the stamp
//! board / ranking rendering.

pub mod api;
pub mod checkin;
pub mod config;
pub mod display;
pub mod location;
pub mod retry;
pub mod sdk;
pub mod session;
pub mod spots;

pub use api::client::ApiClient;
pub use checkin::{CheckinEngine, CheckinPhase, VerifyOutcome};
pub use config::AppConfig;
pub use location::{FixRequest, LocationProvider, PositionFix};
pub use sdk::{BootstrapOutcome, HostSdk, IdentityBootstrap};
pub use session::SessionStore;
pub use spots::{Spot, SpotCatalog};

use thiserror::Error;

/// Result type for stamp-rally client operations
pub type Result<T> = std::result::Result<T, StampTrailError>;

/// General error type for stamp-rally client operations
#[derive(Error, Debug)]
pub enum StampTrailError {
    /// Required configuration is missing or invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a backend response (DNS, refused, timeout).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The backend reported a failure, either via HTTP status or via a
    /// `statusCode` field in the payload.
    #[error("{message}")]
    Application {
        message: String,
        status: u16,
        /// Decoded payload kept for diagnostics.
        payload: serde_json::Value,
    },

    /// A required platform capability (host SDK, geolocation) is absent.
    #[error("Capability error: {0}")]
    Capability(String),

    /// The action was blocked before any network call was issued.
    #[error("{0}")]
    Validation(String),

    /// The device could not produce a position fix.
    #[error("Location error: {0}")]
    Location(#[from] location::LocationError),
}

impl StampTrailError {
    /// Application error from a message and the payload it arrived in.
    pub fn application(message: impl Into<String>, status: u16, payload: serde_json::Value) -> Self {
        Self::Application {
            message: message.into(),
            status,
            payload,
        }
    }
}
