//! reqwest-backed [`Transport`].
//!
//! Every realm gets one cookie jar shared by two clients: one that follows
//! redirects and one that doesn't, because probes must see the raw status.

use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cookie_store::CookieStore;
use reqwest::{redirect, Client, Url};
use reqwest_cookie_store::CookieStoreMutex;
use tracing::debug;

use super::transport::{Method, Realm, Request, Response, Transport};
use super::ApiError;

/// Browser-like UA; the identity provider serves a different form to unknown agents.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

struct RealmClient {
    jar: Arc<CookieStoreMutex>,
    follow: Client,
    no_follow: Client,
}

impl RealmClient {
    fn new(timeout: Option<Duration>) -> Result<Self> {
        let jar = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let follow = Self::builder(&jar, timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let no_follow = Self::builder(&jar, timeout)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            jar,
            follow,
            no_follow,
        })
    }

    fn builder(jar: &Arc<CookieStoreMutex>, timeout: Option<Duration>) -> reqwest::ClientBuilder {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::clone(jar));
        match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        }
    }

    fn store(&self) -> Result<std::sync::MutexGuard<'_, CookieStore>> {
        self.jar
            .lock()
            .map_err(|_| anyhow::anyhow!("Cookie jar lock poisoned"))
    }
}

/// HTTP transport for one bound identity.
pub struct HttpTransport {
    identity: RealmClient,
    tunnel: RealmClient,
}

impl HttpTransport {
    /// `timeout` applies per round trip; `None` leaves timing entirely to the caller.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            identity: RealmClient::new(timeout)?,
            tunnel: RealmClient::new(timeout)?,
        })
    }

    fn realm(&self, realm: Realm) -> &RealmClient {
        match realm {
            Realm::Identity => &self.identity,
            Realm::Tunnel => &self.tunnel,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, realm: Realm, request: Request) -> Result<Response, ApiError> {
        let rc = self.realm(realm);
        let client = if request.follow_redirects {
            &rc.follow
        } else {
            &rc.no_follow
        };

        let builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url).form(&request.form),
        };

        let response = builder.query(&request.query).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        debug!(%realm, status, url = %url, "Response received");

        Ok(Response { status, url, body })
    }

    fn seed_cookie(&self, realm: Realm, url: &str, cookie: &str) -> Result<()> {
        let url = Url::parse(url).with_context(|| format!("Invalid cookie URL: {}", url))?;
        let mut store = self.realm(realm).store()?;
        store
            .parse(cookie, &url)
            .map_err(|e| anyhow::anyhow!("Failed to seed cookie: {}", e))?;
        Ok(())
    }

    fn export_cookies(&self, realm: Realm) -> Result<String> {
        let store = self.realm(realm).store()?;
        let mut buf = Vec::new();
        // Login cookies are session cookies; they must survive the snapshot.
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&store, &mut buf)
            .map_err(|e| anyhow::anyhow!("Failed to serialize cookies: {}", e))?;
        String::from_utf8(buf).context("Cookie blob is not UTF-8")
    }

    fn import_cookies(&self, realm: Realm, blob: &str) -> Result<()> {
        let loaded = if blob.trim().is_empty() {
            CookieStore::default()
        } else {
            cookie_store::serde::json::load_all(BufReader::new(blob.as_bytes()))
                .map_err(|e| anyhow::anyhow!("Failed to parse cookie blob: {}", e))?
        };
        let mut store = self.realm(realm).store()?;
        *store = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_blob_survives_export_import() {
        let transport = HttpTransport::new(None).unwrap();
        transport
            .seed_cookie(Realm::Tunnel, "https://webvpn.bit.edu.cn/", "show_vpn=0; Path=/")
            .unwrap();

        let blob = transport.export_cookies(Realm::Tunnel).unwrap();
        assert!(blob.contains("show_vpn"));
        assert!(!transport.export_cookies(Realm::Identity).unwrap().contains("show_vpn"));

        let restored = HttpTransport::new(None).unwrap();
        restored.import_cookies(Realm::Tunnel, &blob).unwrap();
        assert!(restored.export_cookies(Realm::Tunnel).unwrap().contains("show_vpn"));
    }

    #[test]
    fn test_import_empty_blob_clears_jar() {
        let transport = HttpTransport::new(None).unwrap();
        transport
            .seed_cookie(Realm::Identity, "https://login.bit.edu.cn/", "a=b; Path=/")
            .unwrap();
        transport.import_cookies(Realm::Identity, "").unwrap();
        assert!(!transport.export_cookies(Realm::Identity).unwrap().contains("a=b"));
    }
}
