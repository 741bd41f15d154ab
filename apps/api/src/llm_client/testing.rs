//! Scripted `ChatTransport` for tests: replays canned replies in order and
//! records every request it sees.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::{ChatRequest, ChatTransport, HttpReply, LlmError};

pub enum ScriptedReply {
    Status(u16, String),
    /// Fails before any HTTP status is received.
    Unreachable,
}

impl ScriptedReply {
    pub fn ok(content: &str) -> Self {
        ScriptedReply::Status(200, chat_body(content))
    }

    pub fn status(status: u16, body: &str) -> Self {
        ScriptedReply::Status(status, body.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub api_key: String,
    pub system: String,
    pub user: String,
}

pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &ChatRequest<'_>, api_key: &str) -> Result<HttpReply, LlmError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            api_key: api_key.to_string(),
            system: request.messages[0].content.to_string(),
            user: request.messages[1].content.to_string(),
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of replies");

        match reply {
            ScriptedReply::Status(status, body) => Ok(HttpReply { status, body }),
            ScriptedReply::Unreachable => {
                // A request that fails to build is the cheapest real reqwest::Error.
                let err = reqwest::Client::new()
                    .get("http://[::1")
                    .build()
                    .expect_err("malformed URL must not build");
                Err(LlmError::Http(err))
            }
        }
    }
}

/// A 2xx chat-completions body whose first choice carries `content`.
pub fn chat_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": super::MODEL,
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
    .to_string()
}
