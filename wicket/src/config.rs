// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - compile time configuration
//!
//! Most knobs are plain constants.  The ones a builder is likely to want to
//! change without editing source can be set via environment variables at
//! build time, e.g.:
//!
//! ```sh
//! WICKET_AP_SSID=my-device cargo build --release
//! ```

use core::net::Ipv4Addr;
use core::time::Duration;

use alloc::string::ToString;

use wicket_core::{
    AccessPointSettings, ApAddressing, ApAuth, PortalConfig, StationCredentials,
};

/// SSID the provisioning access point advertises.
pub const AP_SSID: &str = match option_env!("WICKET_AP_SSID") {
    Some(ssid) => ssid,
    None => "wicket-setup",
};

/// Access point password.  Empty means an open network, regardless of
/// [`AP_AUTH`].
pub const AP_PASSWORD: &str = match option_env!("WICKET_AP_PASSWORD") {
    Some(password) => password,
    None => "",
};

/// Auth mode for the access point when a password is set.
pub const AP_AUTH: ApAuth = ApAuth::Wpa2Personal;

/// Maximum simultaneous clients on the provisioning access point.  One
/// phone at a time is enough for provisioning.
pub const AP_MAX_CLIENTS: u16 = 1;

/// Station credentials baked into the firmware.  Usually left empty, in
/// which case the portal opens on first boot.
pub const STA_SSID: &str = match option_env!("WICKET_STA_SSID") {
    Some(ssid) => ssid,
    None => "",
};
pub const STA_PASSWORD: &str = match option_env!("WICKET_STA_PASSWORD") {
    Some(password) => password,
    None => "",
};

/// When set, the access point claims 8.8.8.8 so clients that probe a
/// well-known public resolver get captured too.  Breaks coexistence with
/// upstream networks that actually route there, so off by default.
pub const ENHANCED_CAPTIVE: bool = false;

/// Access point addressing when [`ENHANCED_CAPTIVE`] is off.
pub const AP_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const AP_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// DHCP pool handed out to portal clients, within the AP's own /24.
pub fn dhcp_pool() -> (Ipv4Addr, Ipv4Addr) {
    let ip = ap_addressing().ip().octets();
    (
        Ipv4Addr::new(ip[0], ip[1], ip[2], 100),
        Ipv4Addr::new(ip[0], ip[1], ip[2], 200),
    )
}

/// How many times the driver retries a failed station connection before
/// the failure is reported upwards.
pub const STA_RETRY_COUNT: u32 = 3;

/// Cap on SSIDs returned by a scan.
pub const MAX_SCAN_RESULTS: usize = 15;

/// How long a credential submission waits for the station to get an
/// address before reporting failure.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between a successful connection and portal teardown, so the
/// final HTTP response reaches the client before the AP disappears.
pub const TEARDOWN_GRACE: Duration = Duration::from_millis(100);

/// Re-open the portal automatically when the station loses its network.
pub const AUTO_START: bool = true;

/// Duration DNS answers from the captive resolver are valid for.
pub const DNS_TTL_SECS: u64 = 300;

pub fn ap_addressing() -> ApAddressing {
    if ENHANCED_CAPTIVE {
        ApAddressing::EnhancedCapture
    } else {
        ApAddressing::Fixed {
            ip: AP_IP,
            netmask: AP_NETMASK,
            gateway: AP_IP,
        }
    }
}

/// Assembles the full portal configuration from the constants above.
pub fn portal_config() -> PortalConfig {
    PortalConfig {
        access_point: AccessPointSettings {
            ssid: AP_SSID.to_string(),
            password: AP_PASSWORD.to_string(),
            auth: AP_AUTH,
            max_clients: AP_MAX_CLIENTS,
            addressing: ap_addressing(),
        },
        // May be empty, in which case the portal layer substitutes its
        // placeholder at init time.
        station: StationCredentials {
            ssid: STA_SSID.to_string(),
            password: STA_PASSWORD.to_string(),
        },
        connect_timeout: CONNECT_TIMEOUT,
        teardown_grace: TEARDOWN_GRACE,
        max_scan_results: MAX_SCAN_RESULTS,
        auto_start: AUTO_START,
    }
}
