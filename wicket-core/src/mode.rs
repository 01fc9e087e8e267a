// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Portal mode flag

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// The two lifecycle states of the device.
///
/// Exactly one value holds at any time.  Transitions happen only inside
/// [`crate::PortalController`]; everything else (the event routers, the
/// HTTP handlers) only reads the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortalMode {
    /// Plain WiFi client.  The portal, its access point and its
    /// collaborators are all down.
    StationOnly = 0,

    /// Combined AP+station mode with the HTTP and DNS collaborators
    /// running.
    PortalActive = 1,
}

impl fmt::Display for PortalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalMode::StationOnly => write!(f, "station-only"),
            PortalMode::PortalActive => write!(f, "portal-active"),
        }
    }
}

/// Atomic holder for the current [`PortalMode`].
///
/// Loads use acquire ordering and stores release ordering, so an event
/// arriving just after a transition is routed against the new mode, never
/// the stale one.
pub struct ModeFlag(AtomicU8);

impl ModeFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(PortalMode::StationOnly as u8))
    }

    pub fn load(&self) -> PortalMode {
        match self.0.load(Ordering::Acquire) {
            0 => PortalMode::StationOnly,
            _ => PortalMode::PortalActive,
        }
    }

    pub(crate) fn store(&self, mode: PortalMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

impl Default for ModeFlag {
    fn default() -> Self {
        Self::new()
    }
}
