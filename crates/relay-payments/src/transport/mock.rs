//! Scripted Transport
//!
//! Plays back a fixed sequence of replies and remembers every request.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{TransportResponse, WebhookTransport};
use crate::error::{PaymentError, Result};

/// One canned reply
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Respond with this status and body
    Respond(u16, String),

    /// Fail as if the connection could not be made
    Unreachable(String),
}

impl ScriptedReply {
    pub fn ok() -> Self {
        Self::Respond(200, "ok".into())
    }

    pub fn status(status: u16) -> Self {
        Self::Respond(status, String::new())
    }
}

/// Transport driven by a script; the last reply repeats once the script runs out
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<(String, serde_json::Value)>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer 200
    pub fn always_ok() -> Self {
        Self::new([ScriptedReply::ok()])
    }

    /// Every request fails at the network level
    pub fn unreachable() -> Self {
        Self::new([ScriptedReply::Unreachable("connection refused".into())])
    }

    /// Requests seen so far as `(url, body)`
    pub fn requests(&self) -> Vec<(String, serde_json::Value)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Result<ScriptedReply> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| PaymentError::Transport("script lock poisoned".into()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| PaymentError::Transport("script lock poisoned".into()))?;

        if let Some(reply) = script.pop_front() {
            *last = Some(reply);
        }

        last.clone()
            .ok_or_else(|| PaymentError::Transport("empty script".into()))
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<TransportResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((url.to_string(), body.clone()));
        }

        match self.next_reply()? {
            ScriptedReply::Respond(status, body) => Ok(TransportResponse { status, body }),
            ScriptedReply::Unreachable(message) => Err(PaymentError::Transport(message)),
        }
    }
}
