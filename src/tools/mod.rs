//! Tool trait and registry
//!
//! Tools are read-only queries against the financial dataset. The
//! information-query agent lets the model pick one by name and supplies
//! its arguments as a JSON object.

use crate::dataset::{FinancialData, Period};
use crate::error::AgentError;
use crate::models::JsonMap;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// One `name – description` line per tool, for prompts.
    pub fn describe(&self) -> String {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| format!("- {} – {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn execute(
        &self,
        name: &str,
        data: &dyn FinancialData,
        args: &JsonMap,
    ) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.execute(data, args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str<'a>(args: &'a JsonMap, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::InvalidToolInput(format!("Expected '{}' in arguments", key)))
}

fn optional_str<'a>(args: &'a JsonMap, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn rows(rows: Vec<JsonMap>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

pub struct CompanyInfoTool;

#[async_trait::async_trait]
impl Tool for CompanyInfoTool {
    fn name(&self) -> &'static str {
        "company_info"
    }

    fn description(&self) -> &'static str {
        "Company profile for a symbol: sector, industry, business summary, market data. Arguments: symbol"
    }

    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value> {
        let symbol = require_str(args, "symbol")?;
        Ok(Value::Object(data.info(symbol).await?))
    }
}

pub struct FinancialMetricsTool;

#[async_trait::async_trait]
impl Tool for FinancialMetricsTool {
    fn name(&self) -> &'static str {
        "financial_metrics"
    }

    fn description(&self) -> &'static str {
        "Key financial ratios (ROE, margins, valuation multiples) per period. Arguments: symbol, period (quarterly|yearly), end_date (optional)"
    }

    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value> {
        let symbol = require_str(args, "symbol")?;
        let period = optional_str(args, "period")
            .map(Period::parse)
            .unwrap_or_default();
        let metrics = data
            .financial_metrics(symbol, optional_str(args, "end_date"), period)
            .await?;
        Ok(rows(metrics))
    }
}

pub struct NewsTool;

#[async_trait::async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &'static str {
        "news"
    }

    fn description(&self) -> &'static str {
        "Recent news articles about a company. Arguments: symbol, end_date (optional)"
    }

    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value> {
        let symbol = require_str(args, "symbol")?;
        let news = data.news(symbol, optional_str(args, "end_date")).await?;
        Ok(rows(news))
    }
}

pub struct PricesTool;

#[async_trait::async_trait]
impl Tool for PricesTool {
    fn name(&self) -> &'static str {
        "prices"
    }

    fn description(&self) -> &'static str {
        "Daily price bars. Arguments: symbol, start_date, end_date (YYYY-MM-DD)"
    }

    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value> {
        let symbol = require_str(args, "symbol")?;
        let start_date = require_str(args, "start_date")?;
        let end_date = require_str(args, "end_date")?;
        let prices = data.prices(symbol, start_date, end_date).await?;
        Ok(rows(prices))
    }
}

pub struct InsiderTransactionsTool;

#[async_trait::async_trait]
impl Tool for InsiderTransactionsTool {
    fn name(&self) -> &'static str {
        "insider_transactions"
    }

    fn description(&self) -> &'static str {
        "Insider buys and sells reported for a company. Arguments: symbol, end_date (optional)"
    }

    async fn execute(&self, data: &dyn FinancialData, args: &JsonMap) -> Result<Value> {
        let symbol = require_str(args, "symbol")?;
        let trades = data
            .insider_transactions(symbol, optional_str(args, "end_date"))
            .await?;
        Ok(json!({ "symbol": symbol, "transactions": rows(trades) }))
    }
}

/// Create a default registry with the dataset-backed tools.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(CompanyInfoTool));
    registry.register(Arc::new(FinancialMetricsTool));
    registry.register(Arc::new(NewsTool));
    registry.register(Arc::new(PricesTool));
    registry.register(Arc::new(InsiderTransactionsTool));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::StaticDataset;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_registry_lists_sorted() {
        let registry = create_default_registry();
        assert_eq!(
            registry.list(),
            vec![
                "company_info",
                "financial_metrics",
                "insider_transactions",
                "news",
                "prices"
            ]
        );
        assert!(registry.describe().starts_with("- company_info – "));
    }

    #[tokio::test]
    async fn test_company_info() {
        let data = StaticDataset::new().with_info(args(json!({"symbol": "AAPL", "sector": "Technology"})));
        let registry = create_default_registry();

        let result = registry
            .execute("company_info", &data, &args(json!({"symbol": "AAPL"})))
            .await
            .unwrap();

        assert_eq!(result["sector"], "Technology");
    }

    #[tokio::test]
    async fn test_news_respects_end_date() {
        let data = StaticDataset::new().with_news(vec![
            args(json!({"title": "a", "pub_date": "2024-01-01"})),
            args(json!({"title": "b", "pub_date": "2024-06-01"})),
        ]);

        let result = NewsTool
            .execute(&data, &args(json!({"symbol": "AAPL", "end_date": "2024-03-01"})))
            .await
            .unwrap();

        assert_eq!(result, json!([{"title": "a", "pub_date": "2024-01-01"}]));
    }

    #[tokio::test]
    async fn test_missing_argument_is_rejected() {
        let result = PricesTool
            .execute(&StaticDataset::new(), &args(json!({"symbol": "AAPL"})))
            .await;
        assert!(matches!(result, Err(AgentError::InvalidToolInput(_))));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = create_default_registry()
            .execute("web_search", &StaticDataset::new(), &JsonMap::new())
            .await;
        assert!(matches!(result, Err(AgentError::ToolNotFound(_))));
    }
}
