// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Portal web server implementation
//!
//! Serves exactly three things: the provisioning page, a network scan and
//! the credential submission endpoint.  Anything else gets the captive
//! redirect.  One request per connection - captive portal clients are
//! short-lived and teardown must not wait on an idle keep-alive socket.

use alloc::format;
use alloc::string::String;
use embassy_futures::select::{Either, select};
use embassy_net::{Stack, tcp::TcpSocket};
use embassy_time::Duration;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use wicket_core::StationCredentials;

use crate::error::WicketError;
use crate::http::{
    CONTROL, Control, HTTPD_BODY_BUF_SIZE, HTTPD_HEADER_BUF_SIZE, HTTPD_MAX_HEADERS, HTTPD_PORT,
    HTTPD_TCP_RX_BUF_SIZE, HTTPD_TCP_TX_BUF_SIZE, Method, Response, STATUS, Status, StatusCode,
    assets,
};
use crate::wifi::Portal;

// Idle sockets are cut after this, so a wedged client cannot hold the
// single connection slot.
const SOCKET_TIMEOUT_SECS: u64 = 10;

// Reported to the browser when the station does not come up within the
// connect timeout.
const MSG_CONNECT_FAILED: &str = "Failed to connect to the network";

#[derive(Deserialize)]
struct ConnectRequest {
    ssid: String,
    password: String,
}

#[derive(Serialize)]
struct ConnectResponse {
    success: bool,
    message: String,
}

impl ConnectResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

struct Server {
    portal: &'static Portal,
    header_buf: [u8; HTTPD_HEADER_BUF_SIZE],
    body_buf: [u8; HTTPD_BODY_BUF_SIZE],
}

impl Server {
    fn new(portal: &'static Portal) -> Self {
        Self {
            portal,
            header_buf: [0; HTTPD_HEADER_BUF_SIZE],
            body_buf: [0; HTTPD_BODY_BUF_SIZE],
        }
    }

    async fn handle_request(
        &mut self,
        socket: &mut TcpSocket<'_>,
    ) -> Result<Response, WicketError> {
        // Read headers until we find \r\n\r\n
        let header_end;
        let mut total_read = 0;
        loop {
            if total_read >= HTTPD_HEADER_BUF_SIZE {
                info!("httpd: header buffer overflow, request too large");
                return Ok(Response::status_code(None, StatusCode::TooLarge));
            }

            let n = socket.read(&mut self.header_buf[total_read..]).await?;
            if n == 0 {
                debug!("httpd: connection closed while reading headers");
                return Err(WicketError::Network);
            }
            total_read += n;

            if let Some(pos) = self.header_buf[..total_read]
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
            {
                header_end = pos + 4;
                break;
            }
        }

        // Parse headers
        let mut headers = [httparse::EMPTY_HEADER; HTTPD_MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        if let Err(e) = req.parse(&self.header_buf[..header_end]) {
            info!("httpd: failed to parse HTTP request: {e}");
            return Ok(Response::status_code(None, StatusCode::BadRequest));
        }

        let (method, path) = match (req.method, req.path) {
            (Some(method_str), Some(path)) => match Method::from_str(method_str) {
                Some(method) => (method, path),
                None => {
                    info!("httpd: unsupported method {method_str}");
                    return Ok(Response::status_code(Some(path), StatusCode::BadRequest));
                }
            },
            _ => {
                info!("httpd: failed to parse request line");
                return Ok(Response::status_code(None, StatusCode::BadRequest));
            }
        };

        // Find Content-Length if present
        let content_length = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-length"))
            .and_then(|h| core::str::from_utf8(h.value).ok())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        if content_length > HTTPD_BODY_BUF_SIZE {
            info!("httpd: body too large ({content_length} bytes)");
            return Ok(Response::status_code(Some(path), StatusCode::TooLarge));
        }

        // Read body if present
        let body = if content_length > 0 {
            // May already have some body bytes after the headers
            let already_read = (total_read - header_end).min(content_length);
            self.body_buf[..already_read]
                .copy_from_slice(&self.header_buf[header_end..header_end + already_read]);

            let mut body_read = already_read;
            while body_read < content_length {
                let n = socket.read(&mut self.body_buf[body_read..content_length]).await?;
                if n == 0 {
                    info!("httpd: connection closed before body was fully read");
                    return Err(WicketError::Network);
                }
                body_read += n;
            }

            match core::str::from_utf8(&self.body_buf[..content_length]) {
                Ok(body) => Some(body),
                Err(_) => {
                    info!("httpd: request body is not UTF-8");
                    return Ok(Response::status_code(Some(path), StatusCode::BadRequest));
                }
            }
        } else {
            None
        };

        Ok(self.route_request(method, path, body).await)
    }

    async fn route_request(&self, method: Method, path: &str, body: Option<&str>) -> Response {
        trace!("httpd: handle {method} {path}");

        match (method, path) {
            (Method::Get, "/") => Response::html_ok(path, assets::ROOT_PAGE).no_cache(),
            (Method::Get, "/scan") => self.handle_scan(path).await,
            (Method::Post, "/connect") => self.handle_connect(path, body).await,
            _ => Response::captive_redirect(path),
        }
    }

    async fn handle_scan(&self, path: &str) -> Response {
        match self.portal.scan().await {
            Ok(ssids) => Response::json(path, &ssids, StatusCode::Ok).no_cache(),
            Err(e) => {
                error!("httpd: scan failed: {e}");
                Response::status_code(Some(path), WicketError::from(e).status_code())
            }
        }
    }

    async fn handle_connect(&self, path: &str, body: Option<&str>) -> Response {
        let Some(body) = body else {
            debug!("httpd: /connect with no body");
            return Response::status_code(Some(path), StatusCode::BadRequest);
        };

        let request: ConnectRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(e) => {
                debug!("httpd: /connect body is not valid JSON: {e}");
                return Response::status_code(Some(path), StatusCode::BadRequest);
            }
        };

        let creds = match StationCredentials::new(request.ssid, request.password) {
            Ok(creds) => creds,
            Err(e) => {
                info!("httpd: rejected credentials: {e}");
                return Response::json(
                    path,
                    &ConnectResponse::failed(format!("{e}")),
                    StatusCode::BadRequest,
                );
            }
        };

        match self.portal.submit_credentials(&creds).await {
            Ok(true) => Response::json(path, &ConnectResponse::ok(), StatusCode::Ok),
            Ok(false) => Response::json(
                path,
                &ConnectResponse::failed(String::from(MSG_CONNECT_FAILED)),
                StatusCode::Ok,
            ),
            Err(e) => {
                error!("httpd: credential submission failed: {e}");
                let status = WicketError::from(e.clone()).status_code();
                Response::json(path, &ConnectResponse::failed(format!("{e}")), status)
            }
        }
    }
}

/// The portal web server task.  Spawned once; sits idle until enabled,
/// serves until disabled, acknowledging each transition on the status
/// signal.
#[embassy_executor::task]
pub(crate) async fn http_task(stack: Stack<'static>, portal: &'static Portal) -> ! {
    let mut server = Server::new(portal);
    let mut rx_buffer = [0; HTTPD_TCP_RX_BUF_SIZE];
    let mut tx_buffer = [0; HTTPD_TCP_TX_BUF_SIZE];

    loop {
        // Parked until the portal opens
        while CONTROL.wait().await != Control::Enable {
            STATUS.signal(Status::Disabled);
        }
        STATUS.signal(Status::Enabled);
        info!("httpd: serving on port {HTTPD_PORT}");

        'serving: loop {
            let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
            socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

            let accepted = select(CONTROL.wait(), socket.accept(HTTPD_PORT)).await;
            match accepted {
                Either::First(Control::Disable) => break 'serving,
                Either::First(Control::Enable) => {
                    // Redundant enable; acknowledge and keep serving
                    STATUS.signal(Status::Enabled);
                    continue 'serving;
                }
                Either::Second(Err(e)) => {
                    warn!("httpd: accept error: {e:?}");
                    continue 'serving;
                }
                Either::Second(Ok(())) => {}
            }

            if let Some(endpoint) = socket.remote_endpoint().as_ref() {
                debug!("httpd: connection from {}", endpoint.addr);
            }

            // One request per connection; the response carries
            // Connection: close.
            match server.handle_request(&mut socket).await {
                Ok(response) => {
                    trace!("httpd: response {response}");
                    if let Err(e) = response.write_to(&mut socket).await {
                        debug!("httpd: failed to write response: {e:?}");
                    }
                }
                Err(e) => debug!("httpd: request aborted: {e}"),
            }
            socket.close();

            // A disable that arrived mid-request is latched in the control
            // signal and picked up by the next select.
        }

        info!("httpd: stopped");
        STATUS.signal(Status::Disabled);
    }
}
