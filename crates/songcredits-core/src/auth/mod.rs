//! Spotify authorization supervisor.
//!
//! Owns the single live [`Credential`] of a Spotify adapter and keeps it
//! fresh for unattended runs:
//!
//! ```text
//! NoCredential -> AwaitingUserLogin -> Authorized -> Refreshing -> Authorized
//!                                                              \-> Failed
//! ```
//!
//! A persisted refresh token skips the browser login. A persisted access token
//! that is still valid is reused without any request. One refresh timer is
//! live at a time; it fires [`SAFETY_MARGIN`] before expiry and, after a
//! failure, retries every [`RETRY_DELAY`] until a refresh succeeds.

mod callback;

pub use callback::{CallbackListener, GRACE_PERIOD, redirect_uri};

use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::error::{AuthError, Result};
use crate::provider::http::{agent, excerpt};
use crate::schedule::{TimerSlot, spawn_once};

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SCOPES: &str = "user-modify-playback-state user-read-currently-playing";

/// Refresh this long before the access token expires
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5);
/// Delay between refresh attempts after a failure
pub const RETRY_DELAY: Duration = Duration::from_secs(5);
/// How long `login` waits for the browser redirect
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum AuthState {
    NoCredential,
    AwaitingUserLogin,
    Authorized,
    Refreshing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Whether the access token is usable past the safety margin at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        refresh_delay_raw(self.expires_at, now).is_some()
    }
}

/// Delay from `now` until the refresh for a token expiring at `expires_at`.
///
/// The refresh is due [`SAFETY_MARGIN`] before expiry; tokens already inside
/// the margin are refreshed after a short minimum delay.
pub fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    refresh_delay_raw(expires_at, now)
        .unwrap_or(Duration::ZERO)
        .max(MIN_REFRESH_DELAY)
}

fn refresh_delay_raw(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let margin = TimeDelta::from_std(SAFETY_MARGIN).unwrap_or(TimeDelta::zero());
    (expires_at - now - margin)
        .to_std()
        .ok()
        .filter(|delay| !delay.is_zero())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Token endpoints, overridable for tests
#[derive(Debug, Clone)]
struct Endpoints {
    authorize: String,
    token: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZE_URL.to_string(),
            token: TOKEN_URL.to_string(),
        }
    }
}

pub struct AuthSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ConfigStore>,
    client_id: String,
    basic_auth: String,
    callback_port: u16,
    endpoints: Endpoints,
    agent: ureq::Agent,
    state: RwLock<AuthState>,
    credential: RwLock<Option<Credential>>,
    refresh_timer: TimerSlot,
    login_timeout: Duration,
}

impl AuthSupervisor {
    pub fn new(store: Arc<ConfigStore>) -> std::result::Result<Self, AuthError> {
        Self::with_endpoints(store, Endpoints::default())
    }

    fn with_endpoints(
        store: Arc<ConfigStore>,
        endpoints: Endpoints,
    ) -> std::result::Result<Self, AuthError> {
        let spotify = store.snapshot().sources.spotify;
        let (Some(client_id), Some(client_secret)) = (spotify.client_id, spotify.client_secret)
        else {
            return Err(AuthError::MissingClientCredentials);
        };
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(AuthError::MissingClientCredentials);
        }

        let basic_auth = format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", client_id, client_secret))
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                client_id,
                basic_auth,
                callback_port: spotify.callback_port,
                endpoints,
                agent: agent(REQUEST_TIMEOUT),
                state: RwLock::new(AuthState::NoCredential),
                credential: RwLock::new(None),
                refresh_timer: TimerSlot::new(),
                login_timeout: LOGIN_TIMEOUT,
            }),
        })
    }

    pub fn state(&self) -> AuthState {
        self.inner.state()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.credential()
    }

    /// Current access token, stale or not
    pub fn access_token(&self) -> Option<String> {
        self.inner.credential().map(|c| c.access_token)
    }

    /// URL the user opens to grant access
    pub fn authorize_url(&self) -> String {
        self.inner.authorize_url(&redirect_uri(self.inner.callback_port))
    }

    /// Login-or-resume. Idempotent while a fresh credential is held.
    pub fn authorize(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.credential().is_some_and(|c| c.is_fresh(Utc::now())) {
            return Ok(());
        }

        if inner.resume_persisted() {
            return Ok(());
        }

        let has_refresh_token = inner
            .store
            .snapshot()
            .sources
            .spotify
            .refresh_token
            .is_some_and(|token| !token.is_empty());
        if has_refresh_token {
            return Inner::refresh(inner).map_err(Into::into);
        }

        self.login()
    }

    /// Run the browser login flow and store the resulting credential
    pub fn login(&self) -> Result<()> {
        let inner = &self.inner;
        inner.set_state(AuthState::AwaitingUserLogin);

        let result = (|| -> std::result::Result<Credential, AuthError> {
            let listener = CallbackListener::bind(inner.callback_port)?;
            let redirect = listener.redirect_uri();
            let url = inner.authorize_url(&redirect);

            info!("Opening browser for Spotify login");
            info!("If it does not open, visit: {}", url);
            if let Err(e) = open::that(&url) {
                warn!("{}", AuthError::Browser(e.to_string()));
            }

            let code = listener.wait_for_code(inner.login_timeout)?;
            inner.request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect.as_str()),
            ])
        })();

        match result {
            Ok(credential) => {
                info!("Spotify login complete");
                Inner::accept(inner, credential);
                Ok(())
            }
            Err(e) => {
                warn!("Spotify login failed: {}", e);
                inner.set_state(AuthState::NoCredential);
                Err(e.into())
            }
        }
    }

    /// Refresh now. A failure also schedules a retry.
    pub fn refresh(&self) -> std::result::Result<(), AuthError> {
        Inner::refresh(&self.inner)
    }

    /// Cancel the refresh timer
    pub fn close(&self) {
        if self.inner.refresh_timer.cancel() {
            debug!("Cancelled Spotify token refresh");
        }
    }

    pub fn is_refresh_scheduled(&self) -> bool {
        self.inner.refresh_timer.is_active()
    }
}

impl Drop for AuthSupervisor {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn state(&self) -> AuthState {
        self.state
            .read()
            .map(|state| *state)
            .unwrap_or(AuthState::Failed)
    }

    fn set_state(&self, state: AuthState) {
        let mut current = self.state.write().unwrap_or_else(|p| p.into_inner());
        if *current != state {
            debug!("Auth state: {} -> {}", *current, state);
            *current = state;
        }
    }

    fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn authorize_url(&self, redirect: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
            self.endpoints.authorize,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect),
            urlencoding::encode(SCOPES)
        )
    }

    /// Adopt the persisted access token if it is still fresh
    fn resume_persisted(self: &Arc<Self>) -> bool {
        let spotify = self.store.snapshot().sources.spotify;
        let (Some(access_token), Some(expire_ms)) =
            (spotify.access_token, spotify.access_token_expire)
        else {
            return false;
        };
        let Some(expires_at) = DateTime::<Utc>::from_timestamp_millis(expire_ms) else {
            return false;
        };

        let credential = Credential {
            access_token,
            expires_at,
            refresh_token: spotify.refresh_token.filter(|t| !t.is_empty()),
        };
        if !credential.is_fresh(Utc::now()) {
            return false;
        }

        info!("Reusing stored Spotify access token");
        self.store_credential(credential);
        self.set_state(AuthState::Authorized);
        self.schedule_refresh();
        true
    }

    fn refresh(self: &Arc<Self>) -> std::result::Result<(), AuthError> {
        let refresh_token = self
            .credential()
            .and_then(|c| c.refresh_token)
            .or_else(|| self.store.snapshot().sources.spotify.refresh_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NoRefreshToken)?;

        self.set_state(AuthState::Refreshing);
        match self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ]) {
            Ok(mut credential) => {
                if credential.refresh_token.is_none() {
                    credential.refresh_token = Some(refresh_token);
                }
                debug!("Refreshed Spotify access token");
                Self::accept(self, credential);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Spotify token refresh failed, retrying in {}s: {}",
                    RETRY_DELAY.as_secs(),
                    e
                );
                self.set_state(AuthState::Failed);
                self.schedule_in(RETRY_DELAY);
                Err(e)
            }
        }
    }

    /// Store a new credential, persist it and schedule its refresh
    fn accept(self: &Arc<Self>, credential: Credential) {
        self.store.update(|config| {
            let spotify = &mut config.sources.spotify;
            spotify.access_token = Some(credential.access_token.clone());
            spotify.access_token_expire = Some(credential.expires_at.timestamp_millis());
            if credential.refresh_token.is_some() {
                spotify.refresh_token = credential.refresh_token.clone();
            }
        });
        self.store.save_quietly();

        self.store_credential(credential);
        self.set_state(AuthState::Authorized);
        self.schedule_refresh();
    }

    fn store_credential(&self, credential: Credential) {
        let mut current = self.credential.write().unwrap_or_else(|p| p.into_inner());
        *current = Some(credential);
    }

    fn schedule_refresh(self: &Arc<Self>) {
        let Some(credential) = self.credential() else {
            return;
        };
        if credential.refresh_token.is_none() {
            debug!("No refresh token, token will not be renewed");
            return;
        }
        self.schedule_in(refresh_delay(credential.expires_at, Utc::now()));
    }

    fn schedule_in(self: &Arc<Self>, delay: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let result = self.refresh_timer.replace_with(|| {
            spawn_once("spotify-token-refresh", delay, move || {
                if let Some(inner) = weak.upgrade() {
                    let _ = Inner::refresh(&inner);
                }
            })
        });
        match result {
            Ok(()) => debug!("Next token refresh in {}s", delay.as_secs()),
            Err(e) => warn!("Failed to schedule token refresh: {}", e),
        }
    }

    fn request_token(&self, form: &[(&str, &str)]) -> std::result::Result<Credential, AuthError> {
        let mut response = self
            .agent
            .post(&self.endpoints.token)
            .header("Authorization", &self.basic_auth)
            .send_form(form.iter().copied())
            .map_err(|e| AuthError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| AuthError::Http(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(AuthError::Rejected {
                status,
                message: excerpt(&body),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Http(format!("malformed token response: {}", e)))?;
        Ok(Credential {
            access_token: token.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
            refresh_token: token.refresh_token,
        })
    }
}
