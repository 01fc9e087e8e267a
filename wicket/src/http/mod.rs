// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Portal web server objects and routines
//!
//! A deliberately small HTTP/1.1 server: one task, one connection at a
//! time, three routes.  Captive-portal detection probes are funnelled to
//! the root page by the catch-all redirect.
//!
//! The task is spawned once at boot and gated by a control/status signal
//! pair, so the portal lifecycle can bring it up and down without killing
//! the task.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_io_async::Write;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use wicket_core::Error;

pub(crate) mod assets;
pub(crate) mod server;

pub(crate) use server::http_task;

// Port for the HTTP server
pub(crate) const HTTPD_PORT: u16 = 80;

// Buffer sizes.  The provisioning UI is tiny; requests are tinier.
pub(crate) const HTTPD_TCP_RX_BUF_SIZE: usize = 2048;
pub(crate) const HTTPD_TCP_TX_BUF_SIZE: usize = 2048;
pub(crate) const HTTPD_HEADER_BUF_SIZE: usize = 1024;
pub(crate) const HTTPD_BODY_BUF_SIZE: usize = 512;
pub(crate) const HTTPD_MAX_HEADERS: usize = 24;

/// Lifecycle commands for the server task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Enable,
    Disable,
}

/// Acknowledgements from the server task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Enabled,
    Disabled,
}

pub(crate) static CONTROL: Signal<CriticalSectionRawMutex, Control> = Signal::new();
pub(crate) static STATUS: Signal<CriticalSectionRawMutex, Status> = Signal::new();

/// Brings the server up and waits for its acknowledgement.
pub(crate) async fn enable() -> Result<(), Error> {
    CONTROL.signal(Control::Enable);
    match STATUS.wait().await {
        Status::Enabled => Ok(()),
        Status::Disabled => Err(Error::HttpStart(String::from(
            "server task refused to come up",
        ))),
    }
}

/// Takes the server down, waiting until any in-flight request has been
/// answered.
pub(crate) async fn disable() {
    CONTROL.signal(Control::Disable);
    loop {
        if STATUS.wait().await == Status::Disabled {
            return;
        }
    }
}

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
}

impl Method {
    pub fn from_str(method: &str) -> Option<Method> {
        match method {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ContentType {
    Html,
    Json,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Json => "application/json",
            Self::Text => "text/plain",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum StatusCode {
    Ok = 200,
    Found = 302,
    BadRequest = 400,
    NotFound = 404,
    TooLarge = 413,
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "200 OK",
            Self::Found => "302 Found",
            Self::BadRequest => "400 Bad Request",
            Self::NotFound => "404 Not Found",
            Self::TooLarge => "413 Payload Too Large",
            Self::InternalServerError => "500 Internal Server Error",
            Self::ServiceUnavailable => "503 Service Unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub name: &'static str,
    pub value: &'static str,
}

#[derive(Debug, Clone)]
pub(crate) enum ResponseContent {
    Owned(String),
    Borrowed(&'static [u8]),
}

#[derive(Debug, Clone)]
pub(crate) struct Response {
    pub path: Option<String>,
    pub status_code: StatusCode,
    pub content: Option<ResponseContent>,
    pub content_type: Option<ContentType>,
    pub headers: Option<Vec<Header>>,
}

impl Response {
    pub fn html_ok(path: &str, content: &'static str) -> Self {
        Self {
            path: Some(path.to_string()),
            status_code: StatusCode::Ok,
            content: Some(ResponseContent::Borrowed(content.as_bytes())),
            content_type: Some(ContentType::Html),
            headers: None,
        }
    }

    pub fn json<T: serde::Serialize>(path: &str, data: &T, status_code: StatusCode) -> Self {
        let content = serde_json::to_string(data)
            .unwrap_or_else(|_| "{\"error\":\"Failed to serialize\"}".to_string());
        Self {
            path: Some(path.to_string()),
            status_code,
            content: Some(ResponseContent::Owned(content)),
            content_type: Some(ContentType::Json),
            headers: None,
        }
    }

    pub fn status_code(path: Option<&str>, status_code: StatusCode) -> Self {
        Self {
            path: path.map(String::from),
            status_code,
            content: None,
            content_type: None,
            headers: None,
        }
    }

    /// The catch-all for unknown paths, which is most of what a captive
    /// portal serves.  A 302 to the root with a non-empty body: some
    /// clients (iOS in particular) want content before they surface the
    /// portal sheet.
    pub fn captive_redirect(path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            status_code: StatusCode::Found,
            content: Some(ResponseContent::Borrowed(
                b"Redirect to the captive portal",
            )),
            content_type: Some(ContentType::Text),
            headers: Some(vec![Header {
                name: "Location",
                value: "/",
            }]),
        }
    }

    pub fn no_cache(mut self) -> Self {
        let mut cache_headers = vec![
            Header {
                name: "Cache-Control",
                value: "no-cache, no-store, must-revalidate",
            },
            Header {
                name: "Pragma",
                value: "no-cache",
            },
        ];

        match self.headers {
            Some(mut existing) => {
                existing.append(&mut cache_headers);
                self.headers = Some(existing);
            }
            None => self.headers = Some(cache_headers),
        }

        self
    }

    pub async fn write_to(
        &self,
        socket: &mut embassy_net::tcp::TcpSocket<'_>,
    ) -> Result<(), embassy_net::tcp::Error> {
        let content_len = match &self.content {
            Some(ResponseContent::Owned(s)) => s.len(),
            Some(ResponseContent::Borrowed(b)) => b.len(),
            None => 0,
        };

        let header_str = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n",
            self.status_code.as_str(),
            content_len,
            self.content_type
                .as_ref()
                .map_or("text/plain", |ct| ct.as_str())
        );
        socket.write_all(header_str.as_bytes()).await?;

        if let Some(ref headers) = self.headers {
            for header in headers {
                let header_line = format!("{}: {}\r\n", header.name, header.value);
                socket.write_all(header_line.as_bytes()).await?;
            }
        }
        socket.write_all(b"\r\n").await?;

        match &self.content {
            Some(ResponseContent::Owned(s)) => socket.write_all(s.as_bytes()).await?,
            Some(ResponseContent::Borrowed(b)) => socket.write_all(b).await?,
            None => {}
        }

        Ok(())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{path} {}", self.status_code)
        } else {
            write!(f, "No path {}", self.status_code)
        }
    }
}
