// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Portal configuration
//!
//! Read once at the relevant call time, never re-validated afterwards.

use alloc::string::String;
use core::net::Ipv4Addr;
use core::time::Duration;

use crate::creds::StationCredentials;

/// Address some OS captive-portal detectors probe.  Squatting on it makes
/// their probe land on the portal itself.
pub const CAPTURE_ADDR: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// IP profile for the access point interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApAddressing {
    /// Ordinary private-subnet profile.
    Fixed {
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
    },

    /// "Enhanced capture": the AP claims a well-known public DNS address
    /// so captive-portal probes resolve to the portal even on clients
    /// with hardcoded DNS.
    EnhancedCapture,
}

impl ApAddressing {
    pub fn ip(&self) -> Ipv4Addr {
        match self {
            ApAddressing::Fixed { ip, .. } => *ip,
            ApAddressing::EnhancedCapture => CAPTURE_ADDR,
        }
    }

    pub fn netmask(&self) -> Ipv4Addr {
        match self {
            ApAddressing::Fixed { netmask, .. } => *netmask,
            ApAddressing::EnhancedCapture => Ipv4Addr::new(255, 255, 255, 0),
        }
    }

    pub fn gateway(&self) -> Ipv4Addr {
        match self {
            ApAddressing::Fixed { gateway, .. } => *gateway,
            ApAddressing::EnhancedCapture => CAPTURE_ADDR,
        }
    }

    /// Netmask as a CIDR prefix length.
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.netmask()).count_ones() as u8
    }
}

/// Authentication for the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApAuth {
    Open,
    Wpa2Personal,
    Wpa3Personal,
}

/// Configuration for the portal's access point interface.
#[derive(Debug, Clone)]
pub struct AccessPointSettings {
    pub ssid: String,
    pub password: String,
    pub auth: ApAuth,
    pub addressing: ApAddressing,

    /// One connection slot - the portal serves one client at a time.
    pub max_clients: u16,
}

impl AccessPointSettings {
    /// The auth mode actually applied.  An empty password degrades to an
    /// open network, whatever was configured.
    pub fn effective_auth(&self) -> ApAuth {
        if self.password.is_empty() {
            ApAuth::Open
        } else {
            self.auth
        }
    }
}

/// Everything the [`crate::PortalController`] needs to know, assembled by
/// the embedding application.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub access_point: AccessPointSettings,

    /// Credentials written to the driver at init time.  An empty SSID is
    /// replaced with [`crate::creds::PLACEHOLDER_SSID`].
    pub station: StationCredentials,

    /// Bound on the credential-exchange wait.
    pub connect_timeout: Duration,

    /// Pause between signalling a successful join and tearing the portal
    /// down, so the in-flight HTTP response can be flushed.
    pub teardown_grace: Duration,

    /// Cap on the number of SSIDs a scan returns.
    pub max_scan_results: usize,

    /// Whether a station-mode disconnect re-opens the portal.
    pub auto_start: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn settings(password: &str, auth: ApAuth) -> AccessPointSettings {
        AccessPointSettings {
            ssid: "wicket".to_string(),
            password: password.to_string(),
            auth,
            addressing: ApAddressing::EnhancedCapture,
            max_clients: 1,
        }
    }

    #[test]
    fn empty_password_degrades_to_open() {
        assert_eq!(settings("", ApAuth::Wpa3Personal).effective_auth(), ApAuth::Open);
        assert_eq!(settings("", ApAuth::Wpa2Personal).effective_auth(), ApAuth::Open);
    }

    #[test]
    fn password_keeps_configured_auth() {
        assert_eq!(
            settings("secretpw", ApAuth::Wpa2Personal).effective_auth(),
            ApAuth::Wpa2Personal
        );
    }

    #[test]
    fn enhanced_capture_squats_on_public_dns() {
        let addressing = ApAddressing::EnhancedCapture;
        assert_eq!(addressing.ip(), Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(addressing.gateway(), Ipv4Addr::new(8, 8, 8, 8));
        assert_eq!(addressing.prefix_len(), 24);
    }

    #[test]
    fn fixed_profile_reports_its_own_addresses() {
        let addressing = ApAddressing::Fixed {
            ip: Ipv4Addr::new(192, 168, 4, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 4, 1),
        };
        assert_eq!(addressing.ip(), Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(addressing.prefix_len(), 24);
    }
}
