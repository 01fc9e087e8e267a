// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Driver and collaborator surface
//!
//! Everything the lifecycle controller asks of the outside world goes
//! through this trait: the WiFi/IP driver, the HTTP server and the DNS
//! responder.  The firmware implements it on top of `esp-wifi` and
//! `embassy`; tests implement it with fakes that record call order.

use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

use crate::config::AccessPointSettings;
use crate::creds::StationCredentials;
use crate::error::Error;

/// The portal's view of the WiFi driver and its two collaborators.
///
/// Concurrency contract: the controller serializes the driver methods,
/// so the driver never sees two overlapping calls.  The collaborator
/// start/stop methods are only invoked from lifecycle transitions, which
/// are themselves serialized - but a stop handshake can overlap an
/// in-flight driver call and must be able to wait that call out.
/// Methods that can fail must leave the driver in the state it was in
/// before the call.
#[allow(async_fn_in_trait)]
pub trait PortalServices {
    /// Creates the station interface (first call only), writes `creds` to
    /// the driver and starts it in station mode.
    async fn station_init(&self, creds: &StationCredentials) -> Result<(), Error>;

    /// Switches the driver to combined AP+station mode and brings up the
    /// access point interface with `ap`.  Must not double-create an
    /// already-present AP interface.
    async fn enter_portal_mode(&self, ap: &AccessPointSettings) -> Result<(), Error>;

    /// Restores pure station mode and destroys the access point
    /// interface.
    async fn leave_portal_mode(&self) -> Result<(), Error>;

    /// Initiates a station connection attempt with the credentials the
    /// driver currently holds.  Returns once the attempt is underway;
    /// completion is reported through driver events.
    async fn connect_station(&self) -> Result<(), Error>;

    /// Disconnects any existing association, writes `creds` to the driver
    /// and initiates a fresh connection attempt.
    async fn apply_credentials(&self, creds: &StationCredentials) -> Result<(), Error>;

    /// Scans for nearby networks, returning at most `max` SSIDs.  May
    /// include empty SSIDs (hidden networks); the controller filters.
    async fn scan_ssids(&self, max: usize) -> Result<Vec<String>, Error>;

    /// Stops the driver and releases every interface.  Called from
    /// `deinit()` only.
    async fn shutdown_driver(&self) -> Result<(), Error>;

    /// Starts the HTTP collaborator on the access point interface.
    async fn start_http(&self) -> Result<(), Error>;

    /// Stops the HTTP collaborator, waiting until it is down.  The
    /// collaborator may be mid-request; the handler must be able to
    /// complete (including its driver access) while this waits.
    async fn stop_http(&self);

    /// Starts the DNS collaborator, answering every query with the access
    /// point's own address.
    async fn start_dns(&self) -> Result<(), Error>;

    /// Stops the DNS collaborator, waiting until it is down.
    async fn stop_dns(&self);

    /// Sleeps for `delay`.  Abstracted so the auto-teardown grace period
    /// is observable in host tests.
    async fn grace_delay(&self, delay: Duration);
}
