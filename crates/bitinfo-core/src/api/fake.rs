//! Scripted in-memory transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::transport::{Realm, Request, Response, Transport};
use super::ApiError;

type Reply = Box<dyn Fn() -> Result<Response, ApiError> + Send + Sync>;

/// Answers requests from per-(realm, url) queues and records what was sent.
/// The last queued reply for a URL is reused once the queue drains.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<(Realm, String), VecDeque<Reply>>>,
    sent: Mutex<Vec<(Realm, Request)>>,
    cookies: Mutex<HashMap<Realm, Vec<String>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, realm: Realm, url: &str, status: u16, final_url: &str, body: &str) {
        let final_url = final_url.to_string();
        let body = body.to_string();
        self.push(
            realm,
            url,
            Box::new(move || {
                Ok(Response {
                    status,
                    url: final_url.clone(),
                    body: body.clone(),
                })
            }),
        );
    }

    pub fn ok(&self, realm: Realm, url: &str, body: &str) {
        self.reply(realm, url, 200, url, body);
    }

    pub fn fail(&self, realm: Realm, url: &str, status: u16) {
        self.push(
            realm,
            url,
            Box::new(move || {
                Err(ApiError::ServerError {
                    status,
                    body: String::new(),
                })
            }),
        );
    }

    fn push(&self, realm: Realm, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry((realm, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn sent(&self) -> Vec<(Realm, Request)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|(_, r)| r.url == url).count()
    }

    pub fn seeded(&self, realm: Realm) -> Vec<String> {
        self.cookies.lock().unwrap().get(&realm).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, realm: Realm, request: Request) -> Result<Response, ApiError> {
        let url = request.url.clone();
        self.sent.lock().unwrap().push((realm, request));

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(&(realm, url.clone()))
            .unwrap_or_else(|| panic!("no scripted reply for {} {}", realm, url));
        if queue.len() > 1 {
            let reply = queue.pop_front().unwrap();
            reply()
        } else {
            (queue.front().unwrap())()
        }
    }

    fn seed_cookie(&self, realm: Realm, _url: &str, cookie: &str) -> anyhow::Result<()> {
        self.cookies
            .lock()
            .unwrap()
            .entry(realm)
            .or_default()
            .push(cookie.to_string());
        Ok(())
    }

    fn export_cookies(&self, realm: Realm) -> anyhow::Result<String> {
        Ok(self.seeded(realm).join("\n"))
    }

    fn import_cookies(&self, realm: Realm, blob: &str) -> anyhow::Result<()> {
        let cookies = blob.lines().map(str::to_string).collect();
        self.cookies.lock().unwrap().insert(realm, cookies);
        Ok(())
    }
}
