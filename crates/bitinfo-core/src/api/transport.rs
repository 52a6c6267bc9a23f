//! Transport seam between the session logic and the network.
//!
//! Each [`Realm`] owns its own cookie jar. Cookie contents never leave the
//! transport except as an opaque blob via [`Transport::export_cookies`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::endpoints::LOGIN_HOST;
use super::ApiError;

/// Authentication domain a request is issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Realm {
    /// Single-sign-on identity provider and the portal apps behind it
    Identity,
    /// Secure-tunnel proxy re-hosting the legacy academic system
    Tunnel,
}

impl std::fmt::Display for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Realm::Identity => write!(f, "identity"),
            Realm::Tunnel => write!(f, "tunnel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub follow_redirects: bool,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            follow_redirects: true,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn form(mut self, key: &str, value: impl Into<String>) -> Self {
        self.form.push((key.to_string(), value.into()));
        self
    }

    /// Return the first response as-is instead of following redirects
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Final URL after any redirects were followed
    pub url: String,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the response ended on the identity provider's login host,
    /// i.e. the realm's session is gone and the server bounced us to log in.
    pub fn landed_on_login(&self) -> bool {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(LOGIN_HOST)))
            .unwrap_or(false)
    }

    /// Turn non-2xx statuses into the matching error
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self, what: &'static str) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::warn!(url = %self.url, error = %e, body = %ApiError::truncate_body(&self.body), "Unexpected JSON shape");
            ApiError::malformed(what, e.to_string())
        })
    }
}

/// Network access for one bound identity. Not shared between sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, realm: Realm, request: Request) -> Result<Response, ApiError>;

    /// Insert a cookie (`name=value; Path=/`) into the realm's jar as if `url` had set it
    fn seed_cookie(&self, realm: Realm, url: &str, cookie: &str) -> anyhow::Result<()>;

    fn export_cookies(&self, realm: Realm) -> anyhow::Result<String>;

    /// Replace the realm's jar with a previously exported blob
    fn import_cookies(&self, realm: Realm, blob: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = Request::post("https://example.com/x")
            .form("a", "1")
            .query("b", "2")
            .no_redirect();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.form, vec![("a".to_string(), "1".to_string())]);
        assert_eq!(req.query, vec![("b".to_string(), "2".to_string())]);
        assert!(!req.follow_redirects);
    }

    #[test]
    fn test_landed_on_login() {
        let resp = Response {
            status: 200,
            url: "https://login.bit.edu.cn/authserver/login?service=x".into(),
            body: String::new(),
        };
        assert!(resp.landed_on_login());

        let resp = Response {
            status: 200,
            url: "https://webvpn.bit.edu.cn/jsxsd".into(),
            body: String::new(),
        };
        assert!(!resp.landed_on_login());
    }
}
