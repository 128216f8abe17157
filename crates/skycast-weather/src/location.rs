//! Device location and permission handling.
//!
//! Platform callbacks are reduced to two things: a [`LocationSource`] that
//! can be queried and told to start/stop, and the pure [`location_action`]
//! rule that decides what to do when the permission state changes.

use parking_lot::Mutex;
use skycast_core::LocationConfig;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::Coordinate;

/// Location permission as reported by the platform.
/// "Restricted" platforms report `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

/// What to do with the location stream after a permission change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAction {
    StartUpdates,
    StopUpdates,
    RequestPermission,
}

/// Transition rule for permission changes. Never implies a weather fetch.
pub fn location_action(state: PermissionState) -> LocationAction {
    match state {
        PermissionState::Granted => LocationAction::StartUpdates,
        PermissionState::Undetermined => LocationAction::RequestPermission,
        PermissionState::Denied => LocationAction::StopUpdates,
    }
}

/// A device position provider.
pub trait LocationSource: Send + Sync {
    fn permission(&self) -> PermissionState;

    /// Ask the user for access. The answer arrives out of band.
    fn request_permission(&self);

    fn start_updates(&self);

    fn stop_updates(&self);

    /// Most recent fix, if the device has one yet
    fn last_known(&self) -> Option<Coordinate>;
}

/// Location source backed by a pinned coordinate from config.
///
/// Permission starts as `Denied` when location is disabled, `Granted` when
/// a coordinate is pinned and `Undetermined` otherwise. A permission request
/// resolves immediately: granted if a coordinate is pinned, denied if not.
#[derive(Debug)]
pub struct StaticLocationSource {
    permission: Mutex<PermissionState>,
    pinned: Option<Coordinate>,
    updating: AtomicBool,
}

impl StaticLocationSource {
    pub fn new(permission: PermissionState, pinned: Option<Coordinate>) -> Self {
        Self {
            permission: Mutex::new(permission),
            pinned,
            updating: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        let pinned = config
            .pinned()
            .map(|(latitude, longitude)| Coordinate::new(latitude, longitude));

        let permission = if !config.enabled {
            PermissionState::Denied
        } else if pinned.is_some() {
            PermissionState::Granted
        } else {
            PermissionState::Undetermined
        };

        Self::new(permission, pinned)
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }
}

impl LocationSource for StaticLocationSource {
    fn permission(&self) -> PermissionState {
        *self.permission.lock()
    }

    fn request_permission(&self) {
        let mut permission = self.permission.lock();
        if *permission == PermissionState::Undetermined {
            *permission = if self.pinned.is_some() {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            tracing::info!("Location permission resolved to {:?}", *permission);
        }
    }

    fn start_updates(&self) {
        self.updating.store(true, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.updating.store(false, Ordering::SeqCst);
    }

    fn last_known(&self) -> Option<Coordinate> {
        self.pinned
    }
}
