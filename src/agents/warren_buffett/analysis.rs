//! Shared scaffolding for the scoring analyses
//!
//! Each analysis is a pure function over `context.metrics` (newest period
//! first). [`AnalysisNode`] stores the report under
//! `context.analysis_data[<type>]` and emits it as an `AnalysisData` fragment.

use crate::markdown;
use crate::models::{AgentState, JsonMap, Message, StateUpdate};
use crate::nodes::Node;
use crate::settings::RunConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Scored result of one analysis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    pub score: u32,
    pub max_score: u32,
    pub details: Vec<String>,
    /// Analysis-specific fields (e.g. `intrinsic_value`), emitted after `details`.
    pub extra: JsonMap,
}

impl AnalysisReport {
    pub fn new(max_score: u32) -> Self {
        Self {
            max_score,
            ..Self::default()
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn into_map(self, kind: &str, title: &str) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("score".to_string(), json!(self.score));
        map.insert("max_score".to_string(), json!(self.max_score));
        map.insert("details".to_string(), json!(self.details));
        map.extend(self.extra);
        map.insert("type".to_string(), json!(kind));
        map.insert("title".to_string(), json!(title));
        map
    }
}

pub trait Analysis: Send + Sync {
    /// Key under `analysis_data` and the fragment's `type`.
    fn kind(&self) -> &'static str;
    fn title(&self) -> &'static str;
    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport;
}

pub struct AnalysisNode<A> {
    analysis: A,
}

impl<A: Analysis> AnalysisNode<A> {
    pub fn new(analysis: A) -> Self {
        Self { analysis }
    }
}

#[async_trait]
impl<A: Analysis> Node for AnalysisNode<A> {
    fn name(&self) -> &'static str {
        self.analysis.kind()
    }

    async fn call(&self, state: &AgentState, _config: &RunConfig) -> Result<StateUpdate> {
        let mut context = state.context.clone().unwrap_or_default();
        let metrics = context.metrics.as_deref().unwrap_or_default();

        let report = self
            .analysis
            .analyze(metrics)
            .into_map(self.analysis.kind(), self.analysis.title());

        tracing::debug!(
            analysis = self.analysis.kind(),
            score = report.get("score").and_then(serde_json::Value::as_u64).unwrap_or(0),
            "Analysis scored"
        );

        let fragment = markdown::analysis_data(&report);
        context
            .analysis_data
            .get_or_insert_with(JsonMap::new)
            .insert(self.analysis.kind().to_string(), Value::Object(report));

        Ok(StateUpdate::new()
            .message(Message::assistant(fragment.render()))
            .set_context(context))
    }
}

//
// ================= Metric helpers =================
//

pub(crate) fn number(row: &JsonMap, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

/// Present and non-zero; zero is treated as not reported.
pub(crate) fn reported(row: &JsonMap, key: &str) -> Option<f64> {
    number(row, key).filter(|v| *v != 0.0)
}

/// Every present value of `key`, newest first.
pub(crate) fn series(rows: &[JsonMap], key: &str) -> Vec<f64> {
    rows.iter().filter_map(|row| number(row, key)).collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `0.153` → `15.3%`
pub(crate) fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// `1234567.8` → `$1,234,568`
pub(crate) fn dollars(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

#[cfg(test)]
pub(crate) fn rows(value: Value) -> Vec<JsonMap> {
    serde_json::from_value(value).unwrap()
}
