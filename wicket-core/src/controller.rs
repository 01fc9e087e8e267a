// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Portal lifecycle controller
//!
//! Owns the single source of truth for "is the portal running" and
//! sequences every transition between station-only and portal mode.  Four
//! facts co-vary and must only ever change as a unit: the mode flag, the
//! access point interface, the DNS responder and the HTTP server.  All
//! four are mutated exclusively inside [`PortalController::start`] and
//! [`PortalController::stop`], which are serialized by the lifecycle
//! mutex; the mode flag itself is atomic so the event routers can read it
//! without taking that lock.
//!
//! Locking discipline: the lifecycle mutex serializes transitions, the
//! driver mutex serializes individual driver calls, and neither is ever
//! held across a collaborator start/stop handshake or a signal wait.
//! This matters for `stop()`: the web server cannot acknowledge a disable
//! until its in-flight request finishes, and that request may itself need
//! driver access through [`PortalController::scan`] or
//! [`PortalController::submit_credentials`].  Holding a lock those take
//! while waiting for the acknowledgement would wedge both sides.

use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::PortalConfig;
use crate::creds::StationCredentials;
use crate::error::Error;
use crate::event::{Action, DriverEvent, route};
use crate::mode::{ModeFlag, PortalMode};
use crate::services::PortalServices;
use crate::signal::ConnectivitySignal;

/// Portal lifecycle controller.  See the crate docs for the overall flow.
///
/// `S` is the driver/collaborator surface, `N` the connectivity signal.
/// The controller is designed to live in a `'static` and be shared by
/// reference between the event router task, the HTTP handlers and
/// whatever application code drives the lifecycle.
pub struct PortalController<S: PortalServices, N: ConnectivitySignal> {
    services: S,

    // Serializes init/start/stop/deinit against each other.
    lifecycle: Mutex<CriticalSectionRawMutex, ()>,

    // Held across each individual driver call, so the driver never sees
    // two at once.  Never held across a collaborator handshake or a
    // signal wait.
    driver: Mutex<CriticalSectionRawMutex, ()>,

    initialized: AtomicBool,
    mode: ModeFlag,
    auto_start: AtomicBool,
    signal: N,
    config: PortalConfig,
}

impl<S: PortalServices, N: ConnectivitySignal> PortalController<S, N> {
    pub fn new(services: S, signal: N, config: PortalConfig) -> Self {
        let auto_start = config.auto_start;
        Self {
            services,
            lifecycle: Mutex::new(()),
            driver: Mutex::new(()),
            initialized: AtomicBool::new(false),
            mode: ModeFlag::new(),
            auto_start: AtomicBool::new(auto_start),
            signal,
            config,
        }
    }

    /// Current lifecycle mode.  Lock-free; safe from any context.
    pub fn mode(&self) -> PortalMode {
        self.mode.load()
    }

    /// Whether a station-mode disconnect re-opens the portal.
    pub fn auto_start(&self) -> bool {
        self.auto_start.load(Ordering::Relaxed)
    }

    /// Pure setter; takes effect on the next disconnect event.
    pub fn set_auto_start(&self, auto_start: bool) {
        self.auto_start.store(auto_start, Ordering::Relaxed);
    }

    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Brings up the WiFi driver in station mode and installs the station
    /// interface.  A second call is accepted and does nothing.
    ///
    /// If no station SSID is configured, a placeholder is written so the
    /// driver's reconnect logic has something to retry against - the
    /// resulting disconnect is what auto-starts the portal.
    pub async fn init(&self) -> Result<(), Error> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.initialized() {
            debug!("portal: init called twice, ignoring");
            return Ok(());
        }

        let creds = if self.config.station.ssid.is_empty() {
            warn!(
                "portal: no station SSID configured, using placeholder '{}'",
                crate::creds::PLACEHOLDER_SSID
            );
            StationCredentials::placeholder()
        } else {
            self.config.station.clone()
        };

        {
            let _driver = self.driver.lock().await;
            self.services.station_init(&creds).await?;
        }
        self.initialized.store(true, Ordering::Release);
        info!("portal: initialized, station SSID '{}'", creds.ssid);
        Ok(())
    }

    /// Opens the portal: AP+station mode, HTTP, then DNS.
    ///
    /// Fails with [`Error::AlreadyRunning`] if the portal is already up.
    /// On a collaborator failure every already-started resource is
    /// unwound before the error is returned, so the four co-varying facts
    /// never diverge.  The mode flag flips to `PortalActive` last.
    pub async fn start(&self) -> Result<(), Error> {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.initialized() {
            return Err(Error::NotInitialized);
        }
        if self.mode.load() == PortalMode::PortalActive {
            info!("portal: start called while already running");
            return Err(Error::AlreadyRunning);
        }

        info!("portal: starting");
        {
            let _driver = self.driver.lock().await;
            self.services
                .enter_portal_mode(&self.config.access_point)
                .await?;
        }

        // Fresh episode - no residue from a previous one may satisfy a
        // credential-exchange wait.
        self.signal.reset();

        if let Err(e) = self.services.start_http().await {
            error!("portal: HTTP server failed to start: {e}");
            let _driver = self.driver.lock().await;
            let _ = self.services.leave_portal_mode().await;
            return Err(e);
        }

        if let Err(e) = self.services.start_dns().await {
            error!("portal: DNS server failed to start: {e}");
            self.services.stop_http().await;
            let _driver = self.driver.lock().await;
            let _ = self.services.leave_portal_mode().await;
            return Err(e);
        }

        self.mode.store(PortalMode::PortalActive);
        info!("portal: running");
        Ok(())
    }

    /// Closes the portal: DNS and HTTP down first, then the access point.
    ///
    /// Fails with [`Error::NotRunning`] if the portal is already down.
    /// The mode flag flips to `StationOnly` before anything is torn down,
    /// so concurrently-arriving driver events are immediately routed as
    /// station events.
    ///
    /// The disable handshakes run without the driver lock held: an
    /// in-flight request handler mid scan or credential write gets to
    /// finish, which is exactly what the web server waits for before
    /// acknowledging the disable.
    pub async fn stop(&self) -> Result<(), Error> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.mode.load() != PortalMode::PortalActive {
            info!("portal: stop called while not running");
            return Err(Error::NotRunning);
        }
        self.mode.store(PortalMode::StationOnly);

        info!("portal: stopping");
        self.services.stop_dns().await;
        self.services.stop_http().await;

        // An already-blocked credential-exchange waiter keeps its borrow
        // of the signal and runs to its own timeout; resetting here only
        // clears the latch for the next episode.
        self.signal.reset();

        {
            let _driver = self.driver.lock().await;
            self.services.leave_portal_mode().await?;
        }
        info!("portal: stopped");
        Ok(())
    }

    /// Unwinds everything: stops the portal if running, shuts the driver
    /// down, releases the interfaces.  Safe to call repeatedly, including
    /// when `init` was never called.
    pub async fn deinit(&self) -> Result<(), Error> {
        if self.mode.load() == PortalMode::PortalActive {
            match self.stop().await {
                Ok(()) | Err(Error::NotRunning) => {}
                Err(e) => return Err(e),
            }
        }

        let _lifecycle = self.lifecycle.lock().await;
        if !self.initialized() {
            debug!("portal: deinit with nothing to do");
            return Ok(());
        }
        {
            let _driver = self.driver.lock().await;
            self.services.shutdown_driver().await?;
        }
        self.initialized.store(false, Ordering::Release);
        self.signal.reset();
        info!("portal: deinitialized");
        Ok(())
    }

    /// Routes one driver event against the current mode and executes the
    /// resulting action.  Called from the event router task.
    pub async fn handle_event(&self, event: DriverEvent) -> Result<(), Error> {
        let action = route(self.mode.load(), self.auto_start(), event);
        trace!("portal: event {event:?} -> {action:?}");

        match action {
            Action::ConnectStation => {
                let _driver = self.driver.lock().await;
                self.services.connect_station().await
            }
            Action::OpenPortal => {
                info!("portal: station disconnected, auto-starting portal");
                match self.start().await {
                    // Lost a benign race with an explicit start
                    Err(Error::AlreadyRunning) => Ok(()),
                    other => other,
                }
            }
            Action::NotifyProvisioned => {
                info!("portal: station reached the network, scheduling teardown");
                self.signal.raise();

                // Let the in-flight HTTP response go out before the
                // interface underneath it disappears.
                self.services.grace_delay(self.config.teardown_grace).await;

                match self.stop().await {
                    // An explicit stop got there first
                    Err(Error::NotRunning) => Ok(()),
                    other => other,
                }
            }
            Action::Ignore => {
                debug!("portal: ignoring event {event:?}");
                Ok(())
            }
        }
    }

    /// Credential exchange, driven by the portal web server's connect
    /// endpoint.
    ///
    /// Disconnects, writes the new station configuration, initiates a
    /// connection attempt and blocks the calling context on the
    /// connectivity signal for the configured bound.  Returns `Ok(true)`
    /// if the device reached the network within the bound, `Ok(false)` on
    /// timeout - the attempt may still succeed later, in which case
    /// auto-teardown fires asynchronously.
    ///
    /// The signal is reset before the connection attempt starts, so only
    /// a signal raised strictly after this submission can satisfy the
    /// wait.  The driver lock is released before waiting: `stop()` and
    /// `deinit()` are never blocked behind the exchange.
    pub async fn submit_credentials(
        &self,
        creds: &StationCredentials,
    ) -> Result<bool, Error> {
        if !self.initialized() {
            return Err(Error::NotInitialized);
        }

        info!("portal: credentials submitted for SSID '{}'", creds.ssid);
        self.signal.reset();
        {
            let _driver = self.driver.lock().await;
            self.services.apply_credentials(creds).await?;
        }

        let connected = self.signal.wait_raised(self.config.connect_timeout).await;
        if connected {
            info!("portal: connected to '{}'", creds.ssid);
        } else {
            warn!("portal: connection to '{}' timed out", creds.ssid);
        }
        Ok(connected)
    }

    /// Scans for nearby networks.  Hidden (empty) SSIDs are dropped; at
    /// most `max_scan_results` entries are returned.
    pub async fn scan(&self) -> Result<Vec<String>, Error> {
        if !self.initialized() {
            return Err(Error::NotInitialized);
        }
        let max = self.config.max_scan_results;
        let ssids = {
            let _driver = self.driver.lock().await;
            self.services.scan_ssids(max).await?
        };
        Ok(ssids
            .into_iter()
            .filter(|ssid| !ssid.is_empty())
            .take(max)
            .collect())
    }

    /// The connectivity signal, for driver glue that raises it directly.
    pub fn signal(&self) -> &N {
        &self.signal
    }

    /// The portal configuration this controller was built with.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}
