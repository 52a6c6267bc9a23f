//! Two-realm login state machine.
//!
//! The identity provider and the tunnel each keep their own session and may
//! expire independently, so validity is tracked per realm and each realm is
//! repaired on its own. A flag is only raised after its step fully succeeds
//! and is never rolled back because a later step failed.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::cipher;
use super::credentials::Credentials;
use crate::api::endpoints::{self, IDENTITY_HANDOFF_URLS, TUNNEL_BOOTSTRAP_COOKIES, TUNNEL_ORIGIN};
use crate::api::{ApiError, Realm, Request, Response, Transport};
use crate::cache::SessionState;
use crate::models::Profile;
use crate::scrape::parse_login_form;
use crate::scrape::portal::{datas_rows, StudentInfoRow, TermRow};

/// Default cap on teaching weeks enumerated per term. The portal has no
/// term-length field; enumeration stops at the first empty week or here.
pub const DEFAULT_MAX_WEEKS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_weeks: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_weeks: DEFAULT_MAX_WEEKS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    IdentityValid,
    TunnelValid,
    FullyAuthenticated,
}

impl AuthPhase {
    pub fn from_flags(identity_valid: bool, tunnel_valid: bool) -> Self {
        match (identity_valid, tunnel_valid) {
            (false, false) => AuthPhase::Unauthenticated,
            (true, false) => AuthPhase::IdentityValid,
            (false, true) => AuthPhase::TunnelValid,
            (true, true) => AuthPhase::FullyAuthenticated,
        }
    }
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthPhase::Unauthenticated => write!(f, "Not logged in"),
            AuthPhase::IdentityValid => write!(f, "Portal only"),
            AuthPhase::TunnelValid => write!(f, "Tunnel only"),
            AuthPhase::FullyAuthenticated => write!(f, "Logged in"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct CaptchaStatus {
    #[serde(rename = "isNeed")]
    is_need: bool,
}

/// Map a data response that bounced to the login page to `NotAuthenticated`,
/// everything else non-2xx to its status error.
pub(crate) fn check_authenticated(response: Response) -> Result<Response, ApiError> {
    if response.landed_on_login()
        || response.status == 401
        || (300..400).contains(&response.status)
    {
        debug!(url = %response.url, status = response.status, "Session expired mid-operation");
        return Err(ApiError::NotAuthenticated);
    }
    response.error_for_status()
}

/// One bound identity: transport, persisted state and (optionally) the password.
///
/// Operations take `&mut self`; a session is owned by one caller at a time.
pub struct Session<T: Transport> {
    pub(crate) transport: T,
    credentials: Option<Credentials>,
    pub(crate) state: SessionState,
    pub(crate) options: SessionOptions,
}

impl<T: Transport> Session<T> {
    /// Bind credentials to a fresh, empty state
    pub fn bind(transport: T, credentials: Credentials, options: SessionOptions) -> Self {
        let state = SessionState::new(credentials.id.clone());
        Self {
            transport,
            credentials: Some(credentials),
            state,
            options,
        }
    }

    /// Resume from a snapshot. Without credentials the session can use the
    /// restored cookies but cannot log in again once they expire.
    pub fn restore(transport: T, state: SessionState, options: SessionOptions) -> anyhow::Result<Self> {
        transport.import_cookies(Realm::Identity, &state.identity_cookies)?;
        transport.import_cookies(Realm::Tunnel, &state.tunnel_cookies)?;
        Ok(Self {
            transport,
            credentials: None,
            state,
            options,
        })
    }

    pub fn set_credentials(&mut self, credentials: Credentials) -> anyhow::Result<()> {
        if credentials.id != self.state.username {
            anyhow::bail!(
                "Credentials for {} do not belong to session {}",
                credentials.id,
                self.state.username
            );
        }
        self.credentials = Some(credentials);
        Ok(())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> AuthPhase {
        AuthPhase::from_flags(self.state.identity_valid, self.state.tunnel_valid)
    }

    /// Pull the live cookie jars into the state and return a copy to persist.
    pub fn snapshot(&mut self) -> anyhow::Result<SessionState> {
        self.state.identity_cookies = self.transport.export_cookies(Realm::Identity)?;
        self.state.tunnel_cookies = self.transport.export_cookies(Realm::Tunnel)?;
        self.state.saved_at = Some(Utc::now());
        Ok(self.state.clone())
    }

    /// Probe both realms and log in again wherever the session is gone.
    /// Nothing is retried; a network failure surfaces as-is.
    pub async fn ensure_authenticated(&mut self) -> Result<AuthPhase, ApiError> {
        self.ensure_identity().await?;
        self.ensure_tunnel().await?;
        Ok(self.phase())
    }

    pub(crate) async fn ensure_identity(&mut self) -> Result<(), ApiError> {
        if self.probe(Realm::Identity).await? {
            self.set_valid(Realm::Identity, true);
            return Ok(());
        }
        self.ready_to_login(Realm::Identity).await?;
        self.set_valid(Realm::Identity, false);

        self.login(Realm::Identity, endpoints::IDENTITY_LOGIN_URL).await?;
        for url in IDENTITY_HANDOFF_URLS {
            let response = self.transport.send(Realm::Identity, Request::get(*url)).await?;
            if response.landed_on_login() {
                warn!(url = %response.url, "Identity handoff bounced back to login");
                return Err(ApiError::malformed("identity handoff", "redirected to login after sign-in"));
            }
            response.error_for_status()?;
        }

        self.set_valid(Realm::Identity, true);
        info!(user = %self.state.username, "Identity login complete");
        Ok(())
    }

    pub(crate) async fn ensure_tunnel(&mut self) -> Result<(), ApiError> {
        if self.probe(Realm::Tunnel).await? {
            self.set_valid(Realm::Tunnel, true);
            return Ok(());
        }
        self.ready_to_login(Realm::Tunnel).await?;
        self.set_valid(Realm::Tunnel, false);

        for cookie in TUNNEL_BOOTSTRAP_COOKIES {
            self.transport
                .seed_cookie(Realm::Tunnel, TUNNEL_ORIGIN, cookie)
                .map_err(|e| ApiError::malformed("tunnel bootstrap", e.to_string()))?;
        }
        self.login(Realm::Tunnel, endpoints::TUNNEL_LOGIN_URL).await?;

        let bootstrap = self
            .transport
            .send(Realm::Tunnel, Request::get(endpoints::score_list_url()))
            .await?;
        if bootstrap.landed_on_login() {
            warn!(url = %bootstrap.url, "Tunnel bootstrap bounced back to login");
            return Err(ApiError::malformed("tunnel bootstrap", "redirected to login after sign-in"));
        }
        bootstrap.error_for_status()?;

        self.set_valid(Realm::Tunnel, true);
        info!(user = %self.state.username, "Tunnel login complete");
        Ok(())
    }

    fn set_valid(&mut self, realm: Realm, valid: bool) {
        match realm {
            Realm::Identity => self.state.identity_valid = valid,
            Realm::Tunnel => self.state.tunnel_valid = valid,
        }
    }

    /// Checks that must pass before a dead realm is touched: a password to log
    /// in with, and an account that is not held behind a captcha. A missing
    /// password still clears the flag, the realm being already gone; a locked
    /// account leaves the state exactly as it was.
    async fn ready_to_login(&mut self, realm: Realm) -> Result<(), ApiError> {
        if self.credentials.is_none() {
            debug!(%realm, "No password to log in with");
            self.set_valid(realm, false);
            return Err(ApiError::NotAuthenticated);
        }
        self.check_account_status(realm, &self.state.username).await
    }

    /// Cheap authenticated request; `true` when the realm's session is alive.
    async fn probe(&self, realm: Realm) -> Result<bool, ApiError> {
        let request = match realm {
            Realm::Identity => Request::post(endpoints::student_info_url()).no_redirect(),
            Realm::Tunnel => Request::get(endpoints::tunnel_probe_url()).no_redirect(),
        };
        let response = self.transport.send(realm, request).await?;
        if response.status >= 500 {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        let alive = response.status == 200;
        debug!(%realm, status = response.status, alive, "Session probe");
        Ok(alive)
    }

    /// Replay the identity provider's login form, with the flow starting at `entry_url`.
    async fn login(&self, realm: Realm, entry_url: &str) -> Result<(), ApiError> {
        let credentials = self.credentials.as_ref().ok_or(ApiError::NotAuthenticated)?;

        let page = self
            .transport
            .send(realm, Request::get(entry_url))
            .await?
            .error_for_status()?;

        let Some(form) = parse_login_form(&page.body)? else {
            if page.landed_on_login() {
                warn!(url = %page.url, "Login page without execution token");
                return Err(ApiError::malformed("login page", "execution token missing"));
            }
            debug!(%realm, "Single sign-on already satisfied");
            return Ok(());
        };

        let password = cipher::encrypt(credentials.secret(), &form.salt)?;
        let submit = Request::post(page.url.as_str())
            .form("username", credentials.id.as_str())
            .form("password", password)
            .form("captcha", "")
            .form("rememberMe", "true")
            .form("_eventId", "submit")
            .form("cllt", "userNameLogin")
            .form("dllt", "generalLogin")
            .form("lt", "")
            .form("execution", form.execution);

        let response = self.transport.send(realm, submit).await?;
        if response.status == 401 {
            info!(user = %credentials.id, %realm, "Login rejected");
            return Err(ApiError::InvalidCredential);
        }
        let response = response.error_for_status()?;

        if response.landed_on_login() && parse_login_form(&response.body)?.is_some() {
            warn!(%realm, "Login form shown again after submit");
            return Err(ApiError::malformed("login submit", "login form shown again"));
        }
        Ok(())
    }

    async fn check_account_status(&self, realm: Realm, username: &str) -> Result<(), ApiError> {
        let response = self
            .transport
            .send(
                realm,
                Request::get(endpoints::CAPTCHA_CHECK_URL).query("username", username),
            )
            .await?
            .error_for_status()?;
        let status: CaptchaStatus = response.json("account status")?;
        if status.is_need {
            warn!(user = %username, "Account requires captcha");
            return Err(ApiError::AccountLocked);
        }
        Ok(())
    }

    /// Send a data request; a bounce to the login page clears the realm's flag.
    pub(crate) async fn fetch(&mut self, realm: Realm, request: Request) -> Result<Response, ApiError> {
        let response = self.transport.send(realm, request).await?;
        self.note_auth_error(realm, check_authenticated(response))
    }

    pub(crate) fn note_auth_error<R>(&mut self, realm: Realm, result: Result<R, ApiError>) -> Result<R, ApiError> {
        if let Err(ApiError::NotAuthenticated) = &result {
            self.set_valid(realm, false);
        }
        result
    }

    /// Student name and department, cached in the state
    pub async fn profile(&mut self) -> Result<Profile, ApiError> {
        self.ensure_identity().await?;
        let response = self
            .fetch(Realm::Identity, Request::post(endpoints::student_info_url()))
            .await?;
        let row = datas_rows::<StudentInfoRow>(&response.body, "cxxsjbxx")?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::malformed("cxxsjbxx", "no student row"))?;

        let profile = Profile::from(row);
        self.state.display_name = profile.display_name.clone();
        self.state.department = profile.department.clone();
        Ok(profile)
    }

    /// Current term code (e.g. "2021-2022-1"), cached in the state
    pub async fn current_term(&mut self) -> Result<String, ApiError> {
        self.ensure_identity().await?;
        let response = self
            .fetch(Realm::Identity, Request::post(endpoints::current_term_url()))
            .await?;
        let term = datas_rows::<TermRow>(&response.body, "dqxnxq")?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::malformed("dqxnxq", "no current term row"))?
            .code;

        self.state.cached_term = Some(term.clone());
        Ok(term)
    }
}
