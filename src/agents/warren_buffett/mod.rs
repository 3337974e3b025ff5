//! Warren Buffett persona agent
//!
//! start_analysis → fundamental → consistency → moat → pricing_power →
//! book_value_growth → management_quality → intrinsic_value → end_analysis
//!
//! Each analysis appends an `AnalysisData` fragment; the final node hands the
//! collected scores to the analysis model, which answers in the persona's
//! voice with an `AnalysisResult` block.

use crate::agents::{analysis_end_date, task_ticker, Agent};
use crate::dataset::{DatasetFactory, Period};
use crate::error::AgentError;
use crate::llm::{ChatModel, ModelTarget};
use crate::markdown;
use crate::models::{AgentState, JsonMap, Message, StateUpdate};
use crate::nodes::{run_node, Node};
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub mod analysis;
pub mod book_value_growth;
pub mod consistency;
pub mod fundamental;
pub mod intrinsic_value;
pub mod management_quality;
pub mod moat;
pub mod pricing_power;

use analysis::AnalysisNode;
use book_value_growth::BookValueGrowthAnalysis;
use consistency::ConsistencyAnalysis;
use fundamental::FundamentalAnalysis;
use intrinsic_value::IntrinsicValueAnalysis;
use management_quality::ManagementQualityAnalysis;
use moat::MoatAnalysis;
use pricing_power::PricingPowerAnalysis;

/// Yearly line items fetched into `context.metrics`.
pub const METRIC_ITEMS: &[&str] = &[
    "return_on_equity",
    "debt_to_equity",
    "operating_margin",
    "current_ratio",
    "return_on_invested_capital",
    "asset_turnover",
    "market_cap",
    "capital_expenditure",
    "depreciation_and_amortization",
    "net_income",
    "ordinary_shares_number",
    "total_assets",
    "total_liabilities",
    "stockholders_equity",
    "dividends_and_other_cash_distributions",
    "issuance_or_purchase_of_equity_shares",
    "gross_profit",
    "revenue",
    "free_cash_flow",
    "gross_margin",
];

const PERSONA_PROMPT: &str = r#"You are Warren Buffett, the Oracle of Omaha. Analyze investment opportunities using my proven methodology developed over 60+ years of investing:

MY CORE PRINCIPLES:
1. Circle of Competence: "Risk comes from not knowing what you're doing." Only invest in businesses I thoroughly understand.
2. Economic Moats: Seek companies with durable competitive advantages - pricing power, brand strength, scale advantages, switching costs.
3. Quality Management: Look for honest, competent managers who think like owners and allocate capital wisely.
4. Financial Fortress: Prefer companies with strong balance sheets, consistent earnings, and minimal debt.
5. Intrinsic Value & Margin of Safety: Pay significantly less than what the business is worth - "Price is what you pay, value is what you get."
6. Long-term Perspective: "Our favorite holding period is forever." Look for businesses that will prosper for decades.
7. Pricing Power: The best businesses can raise prices without losing customers.

MY CIRCLE OF COMPETENCE PREFERENCES:
STRONGLY PREFER:
- Consumer staples with strong brands (Coca-Cola, P&G, Walmart, Costco)
- Commercial banking (Bank of America, Wells Fargo) - NOT investment banking
- Insurance (GEICO, property & casualty)
- Railways and utilities (BNSF, simple infrastructure)
- Simple industrials with moats (UPS, FedEx, Caterpillar)
- Energy companies with reserves and pipelines (Chevron, not exploration)

GENERALLY AVOID:
- Complex technology (semiconductors, software, except Apple due to consumer ecosystem)
- Biotechnology and pharmaceuticals (too complex, regulatory risk)
- Airlines (commodity business, poor economics)
- Cryptocurrency and fintech speculation
- Complex derivatives or financial instruments
- Rapid technology change industries
- Capital-intensive businesses without pricing power

APPLE EXCEPTION: I own Apple not as a tech stock, but as a consumer products company with an ecosystem that creates switching costs.

MY INVESTMENT CRITERIA HIERARCHY:
First: Circle of Competence - If I don't understand the business model or industry dynamics, I don't invest, regardless of potential returns.
Second: Business Quality - Does it have a moat? Will it still be thriving in 20 years?
Third: Management - Do they act in shareholders' interests? Smart capital allocation?
Fourth: Financial Strength - Consistent earnings, low debt, strong returns on capital?
Fifth: Valuation - Am I paying a reasonable price for this wonderful business?

MY LANGUAGE & STYLE:
- Use folksy wisdom and simple analogies ("It's like...")
- Reference specific past investments when relevant (Coca-Cola, Apple, GEICO, See's Candies, etc.)
- Quote my own sayings when appropriate
- Be candid about what I don't understand
- Show patience - most opportunities don't meet my criteria
- Express genuine enthusiasm for truly exceptional businesses
- Be skeptical of complexity and Wall Street jargon

CONFIDENCE LEVELS:
- 90-100%: Exceptional business within my circle, trading at attractive price
- 70-89%: Good business with decent moat, fair valuation
- 50-69%: Mixed signals, would need more information or better price
- 30-49%: Outside my expertise or concerning fundamentals
- 10-29%: Poor business or significantly overvalued

Remember: I'd rather own a wonderful business at a fair price than a fair business at a wonderful price. And when in doubt, the answer is usually "no" - there's no penalty for missed opportunities, only for permanent capital loss.
"#;

fn decision_prompt(symbol: &str, short_name: &str, analysis_data: &str) -> String {
    format!(
        r#"Analyze this investment opportunity for {symbol} ({short_name}):

COMPREHENSIVE ANALYSIS DATA:
{analysis_data}

Please provide your investment decision in exactly this JSON format, notice to use 'AnalysisResult' before json:
```AnalysisResult
{{
  "signal": "bullish" | "bearish" | "neutral",
  "confidence": float between 0 and 100
}}
```
then provide a detailed reasoning for your decision.

In your reasoning, be specific about:
1. Whether this falls within your circle of competence and why (CRITICAL FIRST STEP)
2. Your assessment of the business's competitive moat
3. Management quality and capital allocation
4. Financial health and consistency
5. Valuation relative to intrinsic value
6. Long-term prospects and any red flags
7. How this compares to opportunities in your portfolio

Write as Warren Buffett would speak - plainly, with conviction, and with specific references to the data provided.
"#
    )
}

//
// ================= Pipeline Nodes =================
//

/// Fetches yearly metrics for the task's ticker and opens the report.
pub struct StartAnalysis {
    datasets: Arc<dyn DatasetFactory>,
}

#[async_trait]
impl Node for StartAnalysis {
    fn name(&self) -> &'static str {
        "start_analysis"
    }

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let ticker = task_ticker(state)?
            .ok_or_else(|| AgentError::InvalidState("No ticker to analyze".to_string()))?;
        let end_date = analysis_end_date(state);

        let dataset = self.datasets.connect(config)?;
        let metrics = dataset
            .financial_items(ticker.symbol(), METRIC_ITEMS, Some(&end_date), Period::Yearly)
            .await?;

        info!(
            symbol = ticker.symbol(),
            end_date = %end_date,
            periods = metrics.len(),
            "Starting value analysis"
        );

        let mut context = state.context.clone().unwrap_or_default();
        context.metrics = Some(metrics);
        context.analysis_data = Some(JsonMap::new());

        Ok(StateUpdate::new()
            .message(Message::assistant(markdown::to_h2(&format!(
                "Analysis for {}",
                ticker.symbol()
            ))))
            .set_context(context))
    }
}

fn report_field(analysis_data: &JsonMap, kind: &str, field: &str) -> u64 {
    analysis_data
        .get(kind)
        .and_then(|report| report.get(field))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Totals the scores and asks the analysis model for a verdict.
pub struct EndAnalysis {
    model: Arc<dyn ChatModel>,
}

impl EndAnalysis {
    fn summarize(analysis_data: &mut JsonMap, metrics: &[JsonMap]) {
        let total_score: u64 = [
            "fundamental_analysis",
            "consistency_analysis",
            "moat_analysis",
            "management_quality_analysis",
            "pricing_power_analysis",
            "book_value_growth_analysis",
        ]
        .iter()
        .map(|kind| report_field(analysis_data, kind, "score"))
        .sum();

        // Fundamentals, pricing power and book value growth count at fixed weights.
        let max_possible_score = 10
            + report_field(analysis_data, "moat_analysis", "max_score")
            + report_field(analysis_data, "management_quality_analysis", "max_score")
            + 5
            + 5;

        let intrinsic_value = analysis_data
            .get("intrinsic_value_analysis")
            .and_then(|report| report.get("intrinsic_value"))
            .and_then(Value::as_f64)
            .filter(|v| *v != 0.0);
        let market_cap = metrics
            .first()
            .and_then(|row| row.get("market_cap"))
            .and_then(Value::as_f64)
            .filter(|v| *v != 0.0);
        let margin_of_safety = match (intrinsic_value, market_cap) {
            (Some(value), Some(cap)) => json!((value - cap) / cap),
            _ => Value::Null,
        };

        analysis_data.insert("total_score".to_string(), json!(total_score));
        analysis_data.insert("max_possible_score".to_string(), json!(max_possible_score));
        analysis_data.insert("margin_of_safety".to_string(), margin_of_safety);
    }
}

#[async_trait]
impl Node for EndAnalysis {
    fn name(&self) -> &'static str {
        "end_analysis"
    }

    async fn call(&self, state: &AgentState, config: &RunConfig) -> Result<StateUpdate> {
        let ticker = task_ticker(state)?
            .ok_or_else(|| AgentError::InvalidState("No ticker to analyze".to_string()))?;

        let mut context = state.context.clone().unwrap_or_default();
        let metrics = context.metrics.clone().unwrap_or_default();
        let analysis_data = context.analysis_data.get_or_insert_with(JsonMap::new);
        Self::summarize(analysis_data, &metrics);

        let prompt = decision_prompt(
            ticker.symbol(),
            ticker.short_name(),
            &serde_json::to_string_pretty(&*analysis_data)?,
        );
        let messages = [Message::system(PERSONA_PROMPT), Message::user(prompt)];
        let reply = self
            .model
            .invoke(&messages, config, ModelTarget::Analysis)
            .await?;

        Ok(StateUpdate::new()
            .message(reply)
            .clear_action()
            .set_context(context))
    }
}

//
// ================= Agent =================
//

pub struct WarrenBuffettAgent {
    nodes: Vec<Box<dyn Node>>,
}

impl WarrenBuffettAgent {
    pub fn new(model: Arc<dyn ChatModel>, datasets: Arc<dyn DatasetFactory>) -> Self {
        let nodes: Vec<Box<dyn Node>> = vec![
            Box::new(StartAnalysis { datasets }),
            Box::new(AnalysisNode::new(FundamentalAnalysis)),
            Box::new(AnalysisNode::new(ConsistencyAnalysis)),
            Box::new(AnalysisNode::new(MoatAnalysis)),
            Box::new(AnalysisNode::new(PricingPowerAnalysis)),
            Box::new(AnalysisNode::new(BookValueGrowthAnalysis)),
            Box::new(AnalysisNode::new(ManagementQualityAnalysis)),
            Box::new(AnalysisNode::new(IntrinsicValueAnalysis)),
            Box::new(EndAnalysis { model }),
        ];
        Self { nodes }
    }
}

#[async_trait]
impl Agent for WarrenBuffettAgent {
    fn name(&self) -> &'static str {
        "warren_buffett"
    }

    fn description(&self) -> &'static str {
        "Value-investing analysis in the style of Warren Buffett"
    }

    async fn run(&self, mut state: AgentState, config: &RunConfig) -> Result<AgentState> {
        for node in &self.nodes {
            run_node(node.as_ref(), &mut state, config).await?;
        }
        Ok(state)
    }
}
