//! Chat model fakes for tests.

use async_trait::async_trait;
use bonsai_core::error::{BonsaiError, Result};
use bonsai_core::traits::{ChatModel, GenerateParams};
use bonsai_core::types::Message;
use std::sync::Mutex;

/// Returns a fixed reply and records the last request.
pub struct ScriptedChat {
    reply: String,
    last: Mutex<Option<(Vec<Message>, GenerateParams)>>,
    calls: Mutex<usize>,
}

impl ScriptedChat {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn last_request(&self) -> Option<(Vec<Message>, GenerateParams)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message], params: &GenerateParams) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        *self.last.lock().unwrap() = Some((messages.to_vec(), params.clone()));
        Ok(self.reply.clone())
    }
}

/// Always fails like an unreachable completion API.
pub struct FailingChat;

#[async_trait]
impl ChatModel for FailingChat {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[Message], _params: &GenerateParams) -> Result<String> {
        Err(BonsaiError::Upstream("chat completion service unreachable".into()))
    }
}
