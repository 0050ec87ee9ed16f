//! Device geolocation seam.
//!
//! The host platform owns the actual positioning hardware; the engine only
//! ever asks for a single fresh fix through this trait.

use std::time::Duration;

use async_trait::async_trait;

/// A single position fix from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    /// Estimated error radius in meters.
    pub accuracy_m: f64,
}

/// Parameters for one fix request.
#[derive(Debug, Clone, Copy)]
pub struct FixRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Maximum age of an acceptable cached fix. Zero means a fresh fix only.
    pub max_age: Duration,
}

impl FixRequest {
    /// High-accuracy single fix, bounded by the given timeout, no cached
    /// position accepted.
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            max_age: Duration::ZERO,
        }
    }
}

/// Why a fix could not be produced. Mirrors the platform error classes and
/// is surfaced to the user verbatim; the engine never retries silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    PermissionDenied,
    PositionUnavailable,
    TimedOut,
    Unsupported,
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "location permission denied"),
            Self::PositionUnavailable => write!(f, "position unavailable"),
            Self::TimedOut => write!(f, "position request timed out"),
            Self::Unsupported => write!(f, "geolocation is not available on this device"),
        }
    }
}

impl std::error::Error for LocationError {}

/// Source of device position fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, request: &FixRequest) -> Result<PositionFix, LocationError>;
}

/// Provider that always returns the same coordinates. Used by the CLI
/// frontend and by tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub PositionFix);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self, _request: &FixRequest) -> Result<PositionFix, LocationError> {
        Ok(self.0)
    }
}
