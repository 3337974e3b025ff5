//! Ticker resolution
//!
//! Resolves each ticker named in `action.parameters.tickers` against the
//! dataset and renders a `TickerSelect` fragment per match.

use crate::dataset::DatasetFactory;
use crate::markdown;
use crate::models::{AgentState, JsonMap, Message, StateUpdate};
use crate::nodes::Node;
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const NO_TICKER_MESSAGE: &str = "can not find ticker, please check your input and try again";

pub struct TickerSearch {
    datasets: Arc<dyn DatasetFactory>,
}

impl TickerSearch {
    pub fn new(datasets: Arc<dyn DatasetFactory>) -> Self {
        Self { datasets }
    }
}

#[async_trait]
impl Node for TickerSearch {
    fn name(&self) -> &'static str {
        "ticker_search"
    }

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let tickers = match &state.action {
            Some(action) => action.tickers()?,
            None => Vec::new(),
        };

        if tickers.is_empty() {
            return Ok(StateUpdate::new()
                .message(Message::assistant(NO_TICKER_MESSAGE))
                .clear_action());
        }

        // Only connect when some query is worth looking up.
        let dataset = if tickers.iter().any(|t| !t.query().is_empty()) {
            Some(self.datasets.connect(config)?)
        } else {
            None
        };

        let mut lines = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            let query = ticker.query();
            let found = match &dataset {
                Some(handle) if !query.is_empty() => handle.lookup_ticker(query).await?,
                _ => Vec::new(),
            };

            info!(query, matches = found.len(), "Ticker lookup");

            match found.first() {
                None => lines.push(format!("* {} not found", query)),
                Some(first) => {
                    let mut data = JsonMap::new();
                    data.insert("list".to_string(), serde_json::to_value(&found)?);
                    data.insert("selected".to_string(), serde_json::to_value(first)?);
                    lines.push(markdown::ticker_select(&data).render());
                }
            }
        }

        Ok(StateUpdate::new()
            .message(Message::assistant(lines.join("\n")))
            .clear_action())
    }
}

/// Parse the JSON body of every `TickerSelect` block in `content`.
#[cfg(test)]
pub(crate) fn ticker_select_payloads(content: &str) -> Vec<serde_json::Value> {
    content
        .split("```TickerSelect\n")
        .skip(1)
        .filter_map(|block| block.split_once("\n```"))
        .filter_map(|(body, _)| serde_json::from_str(body).ok())
        .collect()
}
