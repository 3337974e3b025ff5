//! Information-query agent
//!
//! query → call: the analysis model picks at most one dataset tool, the tool
//! runs, and the model summarizes the result for the user.

use crate::agents::{task_ticker, Agent};
use crate::dataset::DatasetFactory;
use crate::extract::{extract_object, latest_message_content};
use crate::llm::{ChatModel, ModelTarget};
use crate::models::{AgentState, Message, StateUpdate};
use crate::nodes::{run_node, Node};
use crate::settings::RunConfig;
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn selection_prompt(symbol: &str, short_name: &str, input: &str, tools: &str) -> String {
    format!(
        r#"Given the current context—stock symbol: {symbol}, company name: {short_name}.

—and the user's latest input: {input}.

select the single most appropriate tool from the available toolset for invocation.
Derive all required tool parameters exclusively from the user input to ensure relevance (e.g., for 'query Apple Inc.', parameters should resolve to AAPL/Apple Inc.).
If the input provides sufficient clarity for parameter determination (as in this case), invoke exactly one tool.
If the input lacks specificity or fails to define parameters (e.g., ambiguous or incomplete queries), skip tool invocation entirely.
Prioritize accuracy over tool usage; never assume parameters beyond the input.

Available tools:
{tools}

Reply with ONLY a JSON object: {{"tool": "<tool name>", "arguments": {{...}}}}. To skip tool invocation reply {{}}.
"#
    )
}

fn summary_prompt(tool_messages: &str, input: &str) -> String {
    format!(
        r#"Tool messages:
```json
{tool_messages}
```
The user's latest input: {input}.

Based on the user's input, extract the required information from the tool's response and provide a concise summary in the final answer.
"#
    )
}

/// Consumes the pending action.
struct Query;

#[async_trait]
impl Node for Query {
    fn name(&self) -> &'static str {
        "query"
    }

    async fn call(&self, _state: &AgentState, _config: &RunConfig) -> Result<StateUpdate> {
        Ok(StateUpdate::new().clear_action())
    }
}

struct CallTools {
    model: Arc<dyn ChatModel>,
    datasets: Arc<dyn DatasetFactory>,
    tools: Arc<ToolRegistry>,
}

impl CallTools {
    async fn consult(&self, state: &AgentState, config: &RunConfig) -> Result<Vec<Message>> {
        let ticker = task_ticker(state)?;
        let (symbol, short_name) = ticker
            .as_ref()
            .map(|t| (t.symbol(), t.short_name()))
            .unwrap_or(("", ""));
        let input = latest_message_content(state);

        let prompt = selection_prompt(symbol, short_name, &input, &self.tools.describe());
        let selection = self
            .model
            .invoke(&[Message::user(prompt)], config, ModelTarget::Analysis)
            .await?;

        let choice = extract_object(selection.text().as_str());
        let tool_name = choice
            .get("tool")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());

        let mut tool_messages = Vec::new();
        if let Some(tool_name) = tool_name {
            let args = choice
                .get("arguments")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            info!(tool = tool_name, "Executing dataset tool");

            let dataset = self.datasets.connect(config)?;
            let content = match self.tools.execute(tool_name, dataset.as_ref(), &args).await {
                Ok(output) => output.to_string(),
                Err(e) => {
                    warn!(tool = tool_name, error = %e, "Tool execution failed");
                    format!("Error executing tool {}: {}", tool_name, e)
                }
            };
            tool_messages.push(Message::tool(
                tool_name,
                &Uuid::new_v4().to_string(),
                content,
            ));
        }

        let transcript: Vec<Value> = tool_messages
            .iter()
            .map(|m| json!({"name": m.name, "content": m.text()}))
            .collect();
        let prompt = summary_prompt(&serde_json::to_string_pretty(&transcript)?, &input);
        let summary = self
            .model
            .invoke(&[Message::user(prompt)], config, ModelTarget::Analysis)
            .await?;

        let mut messages = Vec::with_capacity(tool_messages.len() + 2);
        messages.push(selection);
        messages.extend(tool_messages);
        messages.push(summary);
        Ok(messages)
    }
}

#[async_trait]
impl Node for CallTools {
    fn name(&self) -> &'static str {
        "call_tools"
    }

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let messages = match self.consult(state, config).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Information query failed");
                vec![Message::assistant(format!(
                    "Error calling financial_data: {}",
                    e
                ))]
            }
        };
        Ok(StateUpdate::new().messages(messages).clear_action())
    }
}

pub struct InformationQueryAgent {
    query: Query,
    call: CallTools,
}

impl InformationQueryAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        datasets: Arc<dyn DatasetFactory>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            query: Query,
            call: CallTools {
                model,
                datasets,
                tools,
            },
        }
    }
}

#[async_trait]
impl Agent for InformationQueryAgent {
    fn name(&self) -> &'static str {
        "information_query"
    }

    fn description(&self) -> &'static str {
        "Provides detailed company information and key financial metrics analysis"
    }

    async fn run(&self, mut state: AgentState, config: &RunConfig) -> Result<AgentState> {
        run_node(&self.query, &mut state, config).await?;
        run_node(&self.call, &mut state, config).await?;
        Ok(state)
    }
}
