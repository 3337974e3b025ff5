//! Language model collaborator
//!
//! Nodes talk to the model through [`ChatModel`]. The model to use is
//! resolved per call from the request's settings blob, so one model handle
//! serves every conversation.

use crate::error::AgentError;
use crate::models::Message;
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

pub mod router;
pub use router::ModelRouter;

/// Which configured model a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTarget {
    IntentRecognition,
    Analysis,
}

impl fmt::Display for ModelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelTarget::IntentRecognition => "intent recognition",
            ModelTarget::Analysis => "analysis",
        };
        write!(f, "{}", s)
    }
}

/// Reply of a side-channel call.
///
/// Deliberately not a [`Message`]: neither the prompt nor this reply may be
/// appended to the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilentReply {
    pub content: String,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Invoke the model; the reply is meant for the transcript.
    async fn invoke(
        &self,
        messages: &[Message],
        config: &RunConfig,
        target: ModelTarget,
    ) -> Result<Message>;

    /// Invoke the model for internal use (intent extraction, suggestions).
    async fn invoke_silent(
        &self,
        messages: &[Message],
        config: &RunConfig,
        target: ModelTarget,
    ) -> Result<SilentReply> {
        let reply = self.invoke(messages, config, target).await?;
        Ok(SilentReply {
            content: reply.text(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub target: ModelTarget,
}

/// Scripted model for development & testing
/// Replies are returned in order; running out of replies is an error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(
        &self,
        messages: &[Message],
        _config: &RunConfig,
        target: ModelTarget,
    ) -> Result<Message> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                messages: messages.to_vec(),
                target,
            });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("scripted model has no reply left".to_string()))?;

        Ok(Message::assistant(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new(["first", "second"]);
        let config = RunConfig::new();

        let a = model
            .invoke(&[Message::user("q")], &config, ModelTarget::Analysis)
            .await
            .unwrap();
        let b = model
            .invoke_silent(&[], &config, ModelTarget::IntentRecognition)
            .await
            .unwrap();

        assert_eq!(a.text(), "first");
        assert_eq!(b.content, "second");
        assert_eq!(model.call_count(), 2);
        assert_eq!(model.calls()[1].target, ModelTarget::IntentRecognition);

        let exhausted = model.invoke(&[], &config, ModelTarget::Analysis).await;
        assert!(matches!(exhausted, Err(AgentError::LlmError(_))));
    }
}
