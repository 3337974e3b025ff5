//! Follow-up question suggestions

use crate::extract::extract_array;
use crate::llm::{ChatModel, ModelTarget};
use crate::markdown;
use crate::models::{AgentState, Message, StateUpdate};
use crate::nodes::Node;
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const SUGGESTIONS_PROMPT: &str = r#"Based on current conversation, predict user intent and generate 2 intelligent question suggestions:
    1. Questions should be specific and valuable
    2. Avoid overly broad or repetitive queries
    3. Consider users' actual scenario needs
    4. Uniform format for easy selection

    Please output in the following JSON format:
    [ "Question 1","Question 2"]
    "#;

pub struct NextStepSuggestions {
    model: Arc<dyn ChatModel>,
}

impl NextStepSuggestions {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn generate(&self, state: &AgentState, config: &RunConfig) -> Result<Vec<String>> {
        let mut prompt = state.messages.clone();
        prompt.push(Message::system(SUGGESTIONS_PROMPT));

        let reply = self
            .model
            .invoke_silent(&prompt, config, ModelTarget::IntentRecognition)
            .await?;

        Ok(extract_array(reply.content.as_str())
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }
}

pub fn render(suggestions: &[String]) -> String {
    format!(
        "## 🔍 Next Steps Suggestions\n{}\n",
        markdown::list_str_to_sequence(suggestions)
    )
}

#[async_trait]
impl Node for NextStepSuggestions {
    fn name(&self) -> &'static str {
        "next_step_suggestions"
    }

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let suggestions = match state.action.as_ref().and_then(|a| a.suggestions()) {
            Some(given) => given,
            None => self.generate(state, config).await?,
        };

        info!(count = suggestions.len(), "Suggested next steps");

        Ok(StateUpdate::new()
            .message(Message::assistant(render(&suggestions)))
            .set_suggestions(suggestions))
    }
}
