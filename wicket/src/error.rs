// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Firmware error types

use core::fmt;

use crate::http::StatusCode;

/// Firmware-side error type, mostly the portal web server's view of what
/// went wrong with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WicketError {
    /// The portal layer rejected or failed the operation.
    Portal(wicket_core::Error),

    /// The TCP connection died under us.  Not reportable to the client,
    /// by definition.
    Network,
}

impl fmt::Display for WicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WicketError::Portal(e) => write!(f, "{e}"),
            WicketError::Network => write!(f, "network error"),
        }
    }
}

impl From<wicket_core::Error> for WicketError {
    fn from(e: wicket_core::Error) -> Self {
        WicketError::Portal(e)
    }
}

impl From<embassy_net::tcp::Error> for WicketError {
    fn from(_: embassy_net::tcp::Error) -> Self {
        WicketError::Network
    }
}

impl WicketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WicketError::Portal(wicket_core::Error::NotInitialized) => {
                StatusCode::ServiceUnavailable
            }
            WicketError::Portal(_) => StatusCode::InternalServerError,
            WicketError::Network => StatusCode::InternalServerError,
        }
    }
}
