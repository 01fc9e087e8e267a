// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Error types

use alloc::string::String;
use core::fmt;

/// Error type for portal lifecycle operations.
///
/// The first three variants are usage errors: the call was simply rejected
/// and nothing changed.  The remaining variants are driver or collaborator
/// faults; the controller has already unwound any partially-started
/// resources before returning one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `start()` was called while the portal was already active.
    AlreadyRunning,

    /// `stop()` was called while the portal was already down.
    NotRunning,

    /// A lifecycle operation was called before `init()`.
    NotInitialized,

    /// The WiFi driver rejected an interface, mode or configuration call.
    Driver(String),

    /// The HTTP collaborator failed to start.
    HttpStart(String),

    /// The DNS collaborator failed to start.
    DnsStart(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyRunning => write!(f, "portal already running"),
            Error::NotRunning => write!(f, "portal not running"),
            Error::NotInitialized => write!(f, "portal not initialized"),
            Error::Driver(msg) => write!(f, "WiFi driver error: {msg}"),
            Error::HttpStart(msg) => write!(f, "HTTP server failed to start: {msg}"),
            Error::DnsStart(msg) => write!(f, "DNS server failed to start: {msg}"),
        }
    }
}
