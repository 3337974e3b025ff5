//! Fixed-prompt model node

use crate::llm::{ChatModel, ModelTarget};
use crate::models::{AgentState, Message, StateUpdate};
use crate::nodes::Node;
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Invokes the model with a message list fixed at construction and appends
/// the reply. The conversation state is not sent.
pub struct LlmNode {
    model: Arc<dyn ChatModel>,
    messages: Vec<Message>,
    target: ModelTarget,
}

impl LlmNode {
    pub fn new(model: Arc<dyn ChatModel>, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            target: ModelTarget::IntentRecognition,
        }
    }

    pub fn with_target(mut self, target: ModelTarget) -> Self {
        self.target = target;
        self
    }
}

#[async_trait]
impl Node for LlmNode {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn call(&self, _state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let reply = self.model.invoke(&self.messages, config, self.target).await?;
        Ok(StateUpdate::new().message(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::llm::ScriptedModel;

    #[tokio::test]
    async fn test_appends_model_reply() {
        let model = Arc::new(ScriptedModel::new(["Hello there"]));
        let node = LlmNode::new(model.clone(), vec![Message::system("greet"), Message::user("hi")]);

        let state = AgentState::with_messages(vec![Message::user("ignored")]);
        let update = node.call(&state, &RunConfig::new()).await.unwrap();

        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].text(), "Hello there");

        let calls = model.calls();
        assert_eq!(calls[0].messages.len(), 2);
        assert_eq!(calls[0].target, ModelTarget::IntentRecognition);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let node = LlmNode::new(Arc::new(ScriptedModel::default()), vec![])
            .with_target(ModelTarget::Analysis);
        let result = node.call(&AgentState::default(), &RunConfig::new()).await;
        assert!(matches!(result, Err(AgentError::LlmError(_))));
    }
}
