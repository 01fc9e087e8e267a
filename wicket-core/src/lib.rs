// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Wicket provisions headless WiFi devices through a temporary captive
//! portal.
//!
//! wicket-core - Portal lifecycle state machine and the event/credential
//! synchronization around it.
//!
//! The device is normally a plain WiFi station.  When it cannot join a
//! network (or when asked explicitly), the [`PortalController`] switches the
//! driver into combined AP+station mode, brings up the HTTP and DNS
//! collaborators, and collects credentials from a browser.  A successful
//! join tears the portal down again.
//!
//! The controller is generic over [`PortalServices`] (the WiFi driver and
//! the two collaborators) and [`ConnectivitySignal`] (the one-shot "network
//! became reachable" event), so the lifecycle rules can be exercised on the
//! host with fakes.  The `wicket` firmware crate provides the
//! `esp-wifi`/`embassy` implementations.
//!
//! This library is `no_std` compatible, and requires an `alloc`
//! implementation.

#![no_std]

extern crate alloc;

pub mod config;
pub mod controller;
pub mod creds;
pub mod error;
pub mod event;
pub mod mode;
pub mod services;
pub mod signal;

pub use config::{AccessPointSettings, ApAddressing, ApAuth, PortalConfig};
pub use controller::PortalController;
pub use creds::StationCredentials;
pub use error::Error;
pub use event::{Action, DriverEvent};
pub use mode::PortalMode;
pub use services::PortalServices;
pub use signal::ConnectivitySignal;
