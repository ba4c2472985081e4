//! Scripted transport for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use super::{HttpRequest, HttpResponse, Transport, TransportError};

type Reply = Result<HttpResponse, TransportError>;
type Responder = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;

/// Replays queued replies in order and records every request it sees.
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<Vec<(String, String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            cookies: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `f` instead of the queue. Each send yields
    /// once after it is recorded, so concurrent callers interleave.
    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::new()
        }
    }

    /// Queue a response with a JSON body
    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
        self
    }

    /// Queue a transport failure
    pub fn fail(self, error: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Add a cookie visible to URLs whose host ends with `domain`
    pub fn cookie(self, domain: &str, name: &str, value: &str) -> Self {
        self.cookies
            .lock()
            .unwrap()
            .push((domain.to_string(), name.to_string(), value.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of the requests seen so far
    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(responder) = &self.responder {
            let reply = responder(&request);
            tokio::task::yield_now().await;
            return reply;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Other(format!(
                    "no scripted reply for {} {}",
                    request.method, request.url
                )))
            })
    }

    fn cookies(&self, url: &Url) -> Vec<(String, String)> {
        let host = url.host_str().unwrap_or_default();
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .filter(|(domain, _, _)| host.ends_with(domain.trim_start_matches('.')))
            .map(|(_, name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn add_cookie(&self, url: &Url, name: &str, value: &str) {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut cookies = self.cookies.lock().unwrap();
        cookies.retain(|(domain, n, _)| !(domain == &host && n == name));
        cookies.push((host, name.to_string(), value.to_string()));
    }
}
