//! Conversation nodes
//!
//! A node reads the state and returns a [`StateUpdate`]; it never mutates the
//! state it is given. Agents apply the update and decide what runs next.

use crate::models::{AgentState, StateUpdate};
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;

pub mod llm_node;
pub mod next_step_suggestions;
pub mod ticker_search;

pub use llm_node::LlmNode;
pub use next_step_suggestions::NextStepSuggestions;
pub use ticker_search::TickerSearch;

#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &'static str;

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate>;
}

/// Run `node` and merge its output into `state`.
pub async fn run_node(node: &dyn Node, state: &mut AgentState, config: &RunConfig) -> Result<()> {
    tracing::debug!(node = node.name(), "Running node");
    let update = node.call(state, config).await?;
    state.apply(update);
    Ok(())
}
