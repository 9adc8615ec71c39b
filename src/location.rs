//! Coordinate provider seam.
//!
//! The device GPS and its permission dialog live in the platform front-end;
//! the pipeline only sees this trait. Implementations wrap the platform
//! location API (fused provider, CoreLocation, ...); tests use scripted
//! fakes.

use crate::model::Coordinates;
use async_trait::async_trait;

/// Runtime location-permission state as last observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Never asked, or the platform could not report a status.
    Unknown,
    Granted,
    Denied,
}

/// Supplies the device position, gated by a runtime permission grant.
///
/// `current_coordinates` returning `None` means the provider answered but
/// had no fix (GPS off, no last-known location); the pipeline treats both
/// that and provider failure as "location unavailable".
#[async_trait]
pub trait CoordinateProvider: Send + Sync {
    /// Current permission state, without prompting the user.
    async fn permission_status(&self) -> PermissionStatus;

    /// Shows the platform permission prompt and reports the resulting state.
    async fn request_permission(&self) -> PermissionStatus;

    /// Last-known or current device coordinates, if a fix is available.
    async fn current_coordinates(&self) -> Option<Coordinates>;
}

// ---------------------------------------------------------------------------
// Scripted provider (test support)
// ---------------------------------------------------------------------------

/// A deterministic provider for tests and development: a fixed permission
/// script and an optional fixed position. Kept in the library (not behind
/// `cfg(test)`) so integration tests and host demo builds can use it.
pub struct ScriptedProvider {
    initial: PermissionStatus,
    after_request: PermissionStatus,
    coordinates: Option<Coordinates>,
}

impl ScriptedProvider {
    /// Provider with permission already granted and a fix available.
    pub fn granted(coordinates: Coordinates) -> Self {
        Self {
            initial: PermissionStatus::Granted,
            after_request: PermissionStatus::Granted,
            coordinates: Some(coordinates),
        }
    }

    /// Provider that starts `Unknown` and resolves to `after_request` when
    /// prompted.
    pub fn prompting(after_request: PermissionStatus, coordinates: Option<Coordinates>) -> Self {
        Self {
            initial: PermissionStatus::Unknown,
            after_request,
            coordinates,
        }
    }

    /// Granted permission but no position fix.
    pub fn granted_without_fix() -> Self {
        Self {
            initial: PermissionStatus::Granted,
            after_request: PermissionStatus::Granted,
            coordinates: None,
        }
    }
}

#[async_trait]
impl CoordinateProvider for ScriptedProvider {
    async fn permission_status(&self) -> PermissionStatus {
        self.initial
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.after_request
    }

    async fn current_coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_follows_its_script() {
        let provider = ScriptedProvider::prompting(
            PermissionStatus::Granted,
            Some(Coordinates {
                latitude: -23.5505,
                longitude: -46.6333,
            }),
        );
        assert_eq!(provider.permission_status().await, PermissionStatus::Unknown);
        assert_eq!(provider.request_permission().await, PermissionStatus::Granted);
        assert!(provider.current_coordinates().await.is_some());
    }

    #[tokio::test]
    async fn test_granted_without_fix_reports_no_coordinates() {
        let provider = ScriptedProvider::granted_without_fix();
        assert_eq!(provider.permission_status().await, PermissionStatus::Granted);
        assert!(provider.current_coordinates().await.is_none());
    }
}
