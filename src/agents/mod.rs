//! Agents and agent registry
//!
//! An agent runs a fixed sequence of nodes over one conversation turn and
//! returns the resulting state. Three agents are served:
//! - `agent`: general entry point (ticker search, analysis routing, suggestions)
//! - `warren_buffett`: value-investing persona analysis of one ticker
//! - `information_query`: answers factual questions through dataset tools

use crate::dataset::DatasetFactory;
use crate::llm::ChatModel;
use crate::models::{AgentState, TickerQuery};
use crate::settings::RunConfig;
use crate::tools;
use crate::Result;
use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub mod general;
pub mod information_query;
pub mod warren_buffett;

pub use general::GeneralAgent;
pub use information_query::InformationQueryAgent;
pub use warren_buffett::WarrenBuffettAgent;

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn run(&self, state: AgentState, config: &RunConfig) -> Result<AgentState>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
}

/// Agent registry for looking up agents by name
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.name().to_string(), agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered agents, sorted by name.
    pub fn list(&self) -> Vec<AgentInfo> {
        let mut infos: Vec<AgentInfo> = self
            .agents
            .values()
            .map(|agent| AgentInfo {
                name: agent.name().to_string(),
                description: agent.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

/// Create the served agents over one model and one dataset factory.
pub fn create_default_registry(
    model: Arc<dyn ChatModel>,
    datasets: Arc<dyn DatasetFactory>,
) -> AgentRegistry {
    let mut analysts = AgentRegistry::new();
    analysts.register(Arc::new(WarrenBuffettAgent::new(
        model.clone(),
        datasets.clone(),
    )));
    analysts.register(Arc::new(InformationQueryAgent::new(
        model.clone(),
        datasets.clone(),
        Arc::new(tools::create_default_registry()),
    )));

    let mut registry = analysts.clone();
    registry.register(Arc::new(GeneralAgent::new(model, datasets, analysts)));
    registry
}

/// Ticker an analysis agent works on: the current task's, else the first
/// ticker named by the pending action.
pub(crate) fn task_ticker(state: &AgentState) -> Result<Option<TickerQuery>> {
    if let Some(task) = state.context.as_ref().and_then(|c| c.current_task.as_ref()) {
        return Ok(Some(task.ticker.clone()));
    }
    match &state.action {
        Some(action) => Ok(action.tickers()?.into_iter().next()),
        None => Ok(None),
    }
}

/// `action.parameters.end_date`, else today's date.
pub(crate) fn analysis_end_date(state: &AgentState) -> String {
    state
        .action
        .as_ref()
        .and_then(|action| action.end_date())
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticDataset;
    use crate::llm::ScriptedModel;
    use crate::models::{ActionKind, AnalysisTask, StateAction, StateContext};
    use serde_json::json;

    #[test]
    fn test_default_registry_lists_agents() {
        let registry = create_default_registry(
            Arc::new(ScriptedModel::default()),
            Arc::new(StaticDataset::new()),
        );

        let names: Vec<String> = registry.list().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["agent", "information_query", "warren_buffett"]);
        assert!(registry.get("warren_buffett").is_some());
        assert!(!registry.contains("cathie_wood"));
    }

    #[test]
    fn test_task_ticker_prefers_current_task() {
        let action = StateAction::new(
            ActionKind::TickerAnalysis,
            json!({"tickers": [{"symbol": "MSFT"}], "end_date": "2024-12-31"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let mut state = AgentState::default().with_action(action);

        assert_eq!(task_ticker(&state).unwrap().unwrap().symbol(), "MSFT");
        assert_eq!(analysis_end_date(&state), "2024-12-31");

        state.context = Some(StateContext {
            current_task: Some(AnalysisTask {
                agent: "warren_buffett".into(),
                ticker: TickerQuery::from_symbol("AAPL"),
            }),
            ..StateContext::default()
        });
        assert_eq!(task_ticker(&state).unwrap().unwrap().symbol(), "AAPL");

        assert!(task_ticker(&AgentState::default()).unwrap().is_none());
        assert_eq!(analysis_end_date(&AgentState::default()).len(), 10);
    }
}
