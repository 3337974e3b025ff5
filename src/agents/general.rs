//! General agent
//!
//! planner → one of:
//! - ticker_switch → TickerSelect echo of the action parameters
//! - ticker_search → TickerSearch node
//! - ticker_analysis → one analysis agent run per (agent, ticker) task
//! - next_step_suggestions → NextStepSuggestions node
//!
//! Every route finishes by clearing the action and resetting the context.

use crate::agents::{Agent, AgentRegistry};
use crate::dataset::DatasetFactory;
use crate::error::AgentError;
use crate::extract::{at_mentions, extract_array, latest_message_content};
use crate::llm::{ChatModel, ModelTarget};
use crate::markdown;
use crate::models::{
    ActionKind, AgentState, AnalysisTask, JsonMap, Message, StateAction, StateContext,
    StateUpdate,
};
use crate::nodes::{run_node, NextStepSuggestions, TickerSearch};
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const TICKER_EXTRACTION_PROMPT: &str = r#"Please extract the most recent one or more stock information entries currently being discussed from the above conversation history. The extracted information must include:

1. **short_name**: The name of the stock or company
2. **symbol**: The stock symbol, derived from user input or analyzed from short_name. Include the stock market suffix when necessary (e.g., `AAPL`, `601398.SS`)
3. **en_name**: The English abbreviation of the stock, analyzed from short_name and symbol

**Output ONLY the JSON—validate structure before responding.**
Example output:
`[{"short_name": "Apple", "en_name": "Apple Inc.", "symbol": "AAPL"}]`
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    TickerSwitch,
    TickerSearch,
    TickerAnalysis,
    NextStepSuggestions,
}

pub struct GeneralAgent {
    model: Arc<dyn ChatModel>,
    analysts: AgentRegistry,
    ticker_search: TickerSearch,
    suggestions: NextStepSuggestions,
}

impl GeneralAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        datasets: Arc<dyn DatasetFactory>,
        analysts: AgentRegistry,
    ) -> Self {
        Self {
            ticker_search: TickerSearch::new(datasets),
            suggestions: NextStepSuggestions::new(model.clone()),
            model,
            analysts,
        }
    }

    async fn plan(&self, state: &AgentState, config: &RunConfig) -> Result<(Route, StateUpdate)> {
        let update = StateUpdate::new().set_context(state.context.clone().unwrap_or_default());

        if let Some(action) = &state.action {
            let route = match action.kind {
                ActionKind::TickerSwitch => Route::TickerSwitch,
                ActionKind::TickerAnalysis => Route::TickerAnalysis,
                _ => Route::NextStepSuggestions,
            };
            return Ok((route, update));
        }

        let tickers = self.tickers_from_conversation(state, config).await?;
        if tickers.is_empty() {
            return Ok((Route::NextStepSuggestions, update));
        }

        let agents: Vec<Value> = at_mentions(&latest_message_content(state))
            .into_iter()
            .filter(|name| self.analysts.contains(name))
            .map(Value::String)
            .collect();

        let (kind, route) = if agents.is_empty() {
            (ActionKind::TickerSearch, Route::TickerSearch)
        } else {
            (ActionKind::TickerAnalysis, Route::TickerAnalysis)
        };

        let mut parameters = JsonMap::new();
        parameters.insert("agents".to_string(), Value::Array(agents));
        parameters.insert("tickers".to_string(), Value::Array(tickers));

        Ok((route, update.set_action(StateAction::new(kind, parameters))))
    }

    /// Side-channel call; neither the prompt nor the reply reach the history.
    async fn tickers_from_conversation(
        &self,
        state: &AgentState,
        config: &RunConfig,
    ) -> Result<Vec<Value>> {
        let mut prompt = state.messages.clone();
        prompt.push(Message::system(TICKER_EXTRACTION_PROMPT));

        let reply = self
            .model
            .invoke_silent(&prompt, config, ModelTarget::IntentRecognition)
            .await?;

        Ok(extract_array(reply.content.as_str())
            .into_iter()
            .filter(Value::is_object)
            .collect())
    }

    fn ticker_switch(state: &AgentState) -> StateUpdate {
        let parameters = state
            .action
            .as_ref()
            .map(|action| action.parameters.clone())
            .unwrap_or_default();

        StateUpdate::new()
            .message(Message::assistant(markdown::ticker_select(&parameters).render()))
            .clear_action()
    }

    /// Run every (agent, ticker) task in agent-major order.
    async fn ticker_analysis(&self, state: &mut AgentState, config: &RunConfig) -> Result<()> {
        let action = state
            .action
            .clone()
            .ok_or_else(|| AgentError::InvalidState("ticker_analysis without action".to_string()))?;

        let tickers = action.tickers()?;
        let tasks: Vec<AnalysisTask> = action
            .agents()
            .into_iter()
            .flat_map(|agent| {
                tickers.iter().map(move |ticker| AnalysisTask {
                    agent: agent.clone(),
                    ticker: ticker.clone(),
                })
            })
            .collect();

        info!(tasks = tasks.len(), "Starting ticker analysis");

        for (index, task) in tasks.iter().enumerate() {
            let context = state.context.get_or_insert_with(StateContext::default);
            context.tasks = Some(tasks.clone());
            context.task_index = index;
            context.current_task = Some(task.clone());

            // Analysis agents consume the action; each task sees it again.
            state.action = Some(action.clone());

            let Some(agent) = self.analysts.get(&task.agent) else {
                warn!(agent = %task.agent, "Skipping task for unknown analysis agent");
                continue;
            };

            info!(
                agent = %task.agent,
                ticker = task.ticker.query(),
                index,
                "Running analysis task"
            );
            *state = agent.run(std::mem::take(state), config).await?;
        }

        if let Some(context) = state.context.as_mut() {
            context.task_index = tasks.len();
            context.current_task = None;
        }
        Ok(())
    }

    fn clear_cache(state: &mut AgentState) {
        state.apply(
            StateUpdate::new()
                .clear_action()
                .set_context(StateContext::default()),
        );
    }
}

#[async_trait]
impl Agent for GeneralAgent {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn description(&self) -> &'static str {
        "agent"
    }

    async fn run(&self, mut state: AgentState, config: &RunConfig) -> Result<AgentState> {
        let (route, update) = self.plan(&state, config).await?;
        state.apply(update);

        info!(route = ?route, "Planner routed turn");

        match route {
            Route::TickerSwitch => {
                let update = Self::ticker_switch(&state);
                state.apply(update);
            }
            Route::TickerSearch => run_node(&self.ticker_search, &mut state, config).await?,
            Route::TickerAnalysis => self.ticker_analysis(&mut state, config).await?,
            Route::NextStepSuggestions => run_node(&self.suggestions, &mut state, config).await?,
        }

        Self::clear_cache(&mut state);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticDataset;
    use crate::llm::ScriptedModel;
    use crate::models::{Role, TickerDescriptor};
    use crate::nodes::ticker_search::ticker_select_payloads;
    use serde_json::json;
    use std::sync::Mutex;

    /// Analysis agent double that records the tasks it is run for.
    #[derive(Default)]
    struct RecordingAnalyst {
        seen: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Agent for RecordingAnalyst {
        fn name(&self) -> &'static str {
            "warren_buffett"
        }

        fn description(&self) -> &'static str {
            "records tasks"
        }

        async fn run(&self, mut state: AgentState, _config: &RunConfig) -> Result<AgentState> {
            let symbol = state
                .context
                .as_ref()
                .and_then(|c| c.current_task.as_ref())
                .map(|t| t.ticker.query().to_string())
                .unwrap_or_default();
            self.seen
                .lock()
                .unwrap()
                .push((symbol.clone(), state.action.is_some()));
            state.messages.push(Message::assistant(format!("analysed {}", symbol)));
            state.action = None;
            Ok(state)
        }
    }

    fn agent_with(
        model: Arc<ScriptedModel>,
        dataset: StaticDataset,
        analyst: Arc<RecordingAnalyst>,
    ) -> GeneralAgent {
        let mut analysts = AgentRegistry::new();
        analysts.register(analyst);
        GeneralAgent::new(model, Arc::new(dataset), analysts)
    }

    fn action(kind: ActionKind, params: Value) -> StateAction {
        StateAction::new(kind, params.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_plain_question_gets_suggestions() {
        let model = Arc::new(ScriptedModel::new(["[]", "[\"Q1\", \"Q2\"]"]));
        let agent = agent_with(model.clone(), StaticDataset::new(), Arc::default());

        let state = AgentState::with_messages(vec![Message::user("hello")]);
        let result = agent.run(state, &RunConfig::new()).await.unwrap();

        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.suggestions, Some(vec!["Q1".to_string(), "Q2".to_string()]));
        assert!(result.action.is_none());
        assert_eq!(result.context, Some(StateContext::default()));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_named_ticker_is_searched() {
        let model = Arc::new(ScriptedModel::new([
            "[{\"short_name\": \"Apple\", \"en_name\": \"Apple Inc.\", \"symbol\": \"AAPL\"}]",
        ]));
        let dataset = StaticDataset::new().with_ticker(
            "AAPL",
            vec![TickerDescriptor {
                symbol: Some("AAPL".into()),
                ..TickerDescriptor::default()
            }],
        );
        let agent = agent_with(model, dataset, Arc::default());

        let state = AgentState::with_messages(vec![Message::user("how is apple doing?")]);
        let result = agent.run(state, &RunConfig::new()).await.unwrap();

        let reply = result.messages.last().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        let payloads = ticker_select_payloads(&reply.text());
        assert_eq!(payloads[0]["selected"]["symbol"], "AAPL");
        assert!(result.action.is_none());
    }

    #[tokio::test]
    async fn test_mentions_route_to_analysis_in_agent_major_order() {
        let model = Arc::new(ScriptedModel::new([
            "[{\"symbol\": \"AAPL\"}, {\"symbol\": \"MSFT\"}]",
        ]));
        let analyst = Arc::new(RecordingAnalyst::default());
        let agent = agent_with(model, StaticDataset::new(), analyst.clone());

        let state = AgentState::with_messages(vec![Message::user(
            "@warren_buffett @cathie_wood compare AAPL and MSFT",
        )]);
        let result = agent.run(state, &RunConfig::new()).await.unwrap();

        assert_eq!(
            *analyst.seen.lock().unwrap(),
            vec![("AAPL".to_string(), true), ("MSFT".to_string(), true)]
        );
        assert_eq!(result.messages.last().unwrap().text(), "analysed MSFT");
        assert!(result.action.is_none());
        assert_eq!(result.context, Some(StateContext::default()));
    }

    #[tokio::test]
    async fn test_ticker_switch_echoes_selection() {
        let model = Arc::new(ScriptedModel::default());
        let agent = agent_with(model.clone(), StaticDataset::new(), Arc::default());

        let state = AgentState::default().with_action(action(
            ActionKind::TickerSwitch,
            json!({"list": [{"symbol": "AAPL"}], "selected": {"symbol": "AAPL"}}),
        ));
        let result = agent.run(state, &RunConfig::new()).await.unwrap();

        let payloads = ticker_select_payloads(&result.messages[0].text());
        assert_eq!(payloads[0]["selected"]["symbol"], "AAPL");
        assert!(result.action.is_none());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_other_action_uses_given_suggestions() {
        let model = Arc::new(ScriptedModel::default());
        let agent = agent_with(model.clone(), StaticDataset::new(), Arc::default());

        let state = AgentState::default().with_action(action(
            ActionKind::Other("refresh".into()),
            json!({"suggestions": ["X", "Y"]}),
        ));
        let result = agent.run(state, &RunConfig::new()).await.unwrap();

        assert_eq!(result.suggestions, Some(vec!["X".to_string(), "Y".to_string()]));
        assert_eq!(model.call_count(), 0);
    }
}
