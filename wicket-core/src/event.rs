// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Mode-aware driver event routing
//!
//! The same driver events mean different things depending on whether the
//! portal is open.  Rather than two separately-registered handler sets,
//! [`route`] is a single dispatch table keyed by the current
//! [`PortalMode`]; the controller executes whatever [`Action`] falls out.

use crate::mode::PortalMode;

/// Driver events the portal lifecycle cares about.  Everything else the
/// underlying stack emits is noise to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// The station interface came up.
    StaStarted,

    /// The station lost (or failed to establish) its association.
    StaDisconnected,

    /// The station acquired an IP address on the target network.
    StaGotIp,

    /// The access point radio came up.
    ApStarted,
}

/// What the controller should do in response to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Initiate a station connection attempt.
    ConnectStation,

    /// Open the portal (auto-restart after a disconnect).
    OpenPortal,

    /// Raise the connectivity signal and, after the grace delay, tear the
    /// portal down.
    NotifyProvisioned,

    /// Nothing to do beyond logging.
    Ignore,
}

/// Routes a driver event against the current mode.
///
/// Station-only mode: a fresh station interface connects immediately; a
/// disconnect re-opens the portal if `auto_start` is set; address
/// acquisition is the terminal success case and needs no action.
///
/// Portal-active mode: only address acquisition matters - the device
/// reached the target network while the portal was open, so the portal has
/// done its job and self-terminates.
pub fn route(mode: PortalMode, auto_start: bool, event: DriverEvent) -> Action {
    match (mode, event) {
        (PortalMode::StationOnly, DriverEvent::StaStarted) => Action::ConnectStation,
        (PortalMode::StationOnly, DriverEvent::StaDisconnected) => {
            if auto_start {
                Action::OpenPortal
            } else {
                Action::Ignore
            }
        }
        (PortalMode::StationOnly, _) => Action::Ignore,
        (PortalMode::PortalActive, DriverEvent::StaGotIp) => Action::NotifyProvisioned,
        (PortalMode::PortalActive, _) => Action::Ignore,
    }
}
