// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket-core - Station credentials

use alloc::string::String;
use core::fmt;

/// Maximum SSID length in bytes, per 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA passphrase length in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;

/// SSID substituted when no station SSID is configured, so the driver's
/// reconnect logic has something to retry (and fail) against.
pub const PLACEHOLDER_SSID: &str = "ap";

/// Reasons a credential submission is rejected before it reaches the
/// driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    EmptySsid,
    SsidTooLong,
    PasswordTooLong,
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::EmptySsid => write!(f, "SSID is empty"),
            CredentialsError::SsidTooLong => {
                write!(f, "SSID longer than {MAX_SSID_LEN} bytes")
            }
            CredentialsError::PasswordTooLong => {
                write!(f, "password longer than {MAX_PASSWORD_LEN} bytes")
            }
        }
    }
}

/// Credentials for joining a network in station mode.
#[derive(Clone, PartialEq, Eq)]
pub struct StationCredentials {
    pub ssid: String,
    pub password: String,
}

impl StationCredentials {
    /// Validates and builds credentials from an external source (the HTTP
    /// body).  Length limits are byte counts - the driver truncates
    /// nothing on our behalf.
    pub fn new(ssid: String, password: String) -> Result<Self, CredentialsError> {
        if ssid.is_empty() {
            return Err(CredentialsError::EmptySsid);
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(CredentialsError::SsidTooLong);
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooLong);
        }
        Ok(Self { ssid, password })
    }

    /// The placeholder used at init time when no SSID is configured.
    pub fn placeholder() -> Self {
        Self {
            ssid: String::from(PLACEHOLDER_SSID),
            password: String::new(),
        }
    }
}

// Do not derive Debug - credentials end up in logs far too easily.
// Password is elided.
impl fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn accepts_ordinary_credentials() {
        let creds =
            StationCredentials::new("HomeNet".to_string(), "hunter22".to_string()).unwrap();
        assert_eq!(creds.ssid, "HomeNet");
        assert_eq!(creds.password, "hunter22");
    }

    #[test]
    fn rejects_empty_ssid() {
        let err = StationCredentials::new(String::new(), "pw".to_string()).unwrap_err();
        assert_eq!(err, CredentialsError::EmptySsid);
    }

    #[test]
    fn rejects_overlong_fields() {
        let long_ssid = "s".repeat(MAX_SSID_LEN + 1);
        assert_eq!(
            StationCredentials::new(long_ssid, String::new()).unwrap_err(),
            CredentialsError::SsidTooLong
        );

        let long_pw = "p".repeat(MAX_PASSWORD_LEN + 1);
        assert_eq!(
            StationCredentials::new("net".to_string(), long_pw).unwrap_err(),
            CredentialsError::PasswordTooLong
        );
    }

    #[test]
    fn boundary_lengths_are_accepted() {
        let ssid = "s".repeat(MAX_SSID_LEN);
        let pw = "p".repeat(MAX_PASSWORD_LEN);
        assert!(StationCredentials::new(ssid, pw).is_ok());
    }

    #[test]
    fn placeholder_is_non_empty() {
        let creds = StationCredentials::placeholder();
        assert!(!creds.ssid.is_empty());
        assert!(creds.password.is_empty());
    }

    #[test]
    fn debug_elides_password() {
        let creds =
            StationCredentials::new("net".to_string(), "secret".to_string()).unwrap();
        let out = alloc::format!("{creds:?}");
        assert!(!out.contains("secret"));
    }
}
