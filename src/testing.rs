//! Scripted completion service for controller and router tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::models::{CompletionRequest, CompletionService, TextStream};

pub enum Reply {
    Text(Vec<&'static str>),
    /// Request rejected before any fragment arrives.
    Fail,
    /// Fragments arrive, then the stream breaks.
    Broken(Vec<&'static str>),
}

#[derive(Default)]
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletions {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().collect()), requests: Mutex::default() }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, req: CompletionRequest) -> Reply {
        self.requests.lock().unwrap().push(req);
        self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Text(vec!["ok"]))
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletions {
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        match self.next(req) {
            Reply::Text(parts) => Ok(parts.concat()),
            Reply::Fail | Reply::Broken(_) => anyhow::bail!("scripted failure"),
        }
    }

    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<TextStream> {
        match self.next(req) {
            Reply::Text(parts) => Ok(stream::iter(parts.into_iter().map(|p| Ok(p.to_string()))).boxed()),
            Reply::Fail => anyhow::bail!("scripted failure"),
            Reply::Broken(parts) => {
                let items = parts
                    .into_iter()
                    .map(|p| Ok(p.to_string()))
                    .chain(std::iter::once(Err(anyhow::anyhow!("connection reset"))));
                Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
            }
        }
    }
}
