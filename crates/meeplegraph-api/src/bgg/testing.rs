//! Scripted transport for unit tests.
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::error::{BggError, BggResult};
use super::transport::{ApiRequest, LocalTransport, RawResponse, RequestSignature};

/// Replays queued responses in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<RawResponse>>,
    cached: Mutex<HashMap<RequestSignature, RawResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a live response.
    pub fn respond(self, status: u16, body: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(RawResponse::live(status, body.as_bytes().to_vec()));
        self
    }

    /// Queues a live 200 response.
    pub fn ok(self, body: &str) -> Self {
        self.respond(200, body)
    }

    /// Serves `body` from the "cache" for `signature`.
    pub fn cache(&self, signature: RequestSignature, body: &str) {
        self.cached.lock().unwrap().insert(
            signature,
            RawResponse {
                status: 200,
                body: body.as_bytes().to_vec(),
                from_cache: true,
            },
        );
    }

    /// Requests seen so far, cached ones included.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Returns the value of `key` in the `n`th request.
    pub fn param(&self, n: usize, key: &str) -> Option<String> {
        self.requests.lock().unwrap()[n].params().get(key).cloned()
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl LocalTransport for ScriptedTransport {
    async fn get(&self, request: &ApiRequest) -> BggResult<RawResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hit) = self.cached.lock().unwrap().get(&request.signature()) {
            return Ok(hit.clone());
        }
        let next = self.script.lock().unwrap().pop_front();
        next.ok_or_else(|| {
            BggError::network(
                request.url().as_str(),
                std::io::Error::other("script exhausted"),
            )
        })
    }

    fn is_cached(&self, signature: &RequestSignature) -> bool {
        self.cached.lock().unwrap().contains_key(signature)
    }
}
