//! Loopback listener that receives the OAuth redirect.
//!
//! Routes:
//! - `GET /`: extract `code`, redirect to `/success` or `/failed`
//! - `GET /success`, `GET /failed`: static confirmation pages
//!
//! The listener keeps serving for [`GRACE_PERIOD`] after the first request so
//! the browser can follow the redirect, then shuts itself down.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, trace, warn};

use crate::error::AuthError;
use crate::schedule::CancelToken;

pub const GRACE_PERIOD: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>SongCredits</title></head>\
<body><h2>Authorization complete</h2><p>You can close this window.</p></body></html>";
const FAILED_PAGE: &str = "<!DOCTYPE html><html><head><title>SongCredits</title></head>\
<body><h2>Authorization failed</h2><p>Please try again from SongCredits.</p></body></html>";

type Outcome = std::result::Result<String, AuthError>;

pub struct CallbackListener {
    port: u16,
    outcome: Receiver<Outcome>,
    stop: Arc<CancelToken>,
}

impl CallbackListener {
    /// Bind `127.0.0.1:port` and start serving. Port 0 picks a free port.
    pub fn bind(port: u16) -> Result<Self, AuthError> {
        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| AuthError::Listener(format!("bind 127.0.0.1:{}: {}", port, e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);

        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(CancelToken::new());
        let thread_stop = Arc::clone(&stop);

        thread::Builder::new()
            .name("auth-callback".to_string())
            .spawn(move || serve(server, port, tx, &thread_stop))
            .map_err(|e| AuthError::Listener(e.to_string()))?;

        debug!("Callback listener on 127.0.0.1:{}", port);
        Ok(Self {
            port,
            outcome: rx,
            stop,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        redirect_uri(self.port)
    }

    /// Block until the browser hits the callback or `timeout` elapses
    pub fn wait_for_code(&self, timeout: Duration) -> Result<String, AuthError> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AuthError::Timeout(timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(AuthError::Listener("listener stopped".to_string()))
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        // Only stops a listener that never saw a request; otherwise the
        // grace period runs out on its own.
        self.stop.cancel();
    }
}

pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/", port)
}

fn serve(server: Server, port: u16, outcome: Sender<Outcome>, stop: &CancelToken) {
    let mut first_request: Option<Instant> = None;

    loop {
        match first_request {
            Some(at) if at.elapsed() >= GRACE_PERIOD => break,
            None if stop.is_cancelled() => break,
            _ => {}
        }

        let request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                warn!("Callback listener error: {}", e);
                let _ = outcome.send(Err(AuthError::Listener(e.to_string())));
                break;
            }
        };

        first_request.get_or_insert_with(Instant::now);
        handle(request, port, &outcome);
    }

    debug!("Callback listener stopped");
}

fn handle(request: Request, port: u16, outcome: &Sender<Outcome>) {
    let url = request.url().to_string();
    trace!("Callback request: {}", url);

    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let response = match path {
        "/" => {
            let result = match (query_param(query, "code"), query_param(query, "error")) {
                (Some(code), _) if !code.is_empty() => Ok(code),
                (_, Some(error)) => {
                    warn!("Authorization denied: {}", error);
                    Err(AuthError::MissingCode)
                }
                _ => Err(AuthError::MissingCode),
            };
            let page = if result.is_ok() { "success" } else { "failed" };
            // A second hit on "/" after the first outcome has nowhere to go
            let _ = outcome.send(result);
            redirect(&format!("{}{}", redirect_uri(port), page))
        }
        "/success" => html(SUCCESS_PAGE),
        "/failed" => html(FAILED_PAGE),
        _ => Response::from_string("Not Found").with_status_code(404),
    };

    if let Err(e) = request.respond(response) {
        debug!("Failed to answer callback request: {}", e);
    }
}

fn redirect(location: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string("").with_status_code(302);
    match Header::from_bytes(&b"Location"[..], location.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

fn html(page: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(page);
    match Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Decoded value of `name` in a query string
pub(crate) fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}
