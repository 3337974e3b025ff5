//! Durable competitive advantage
//!
//! Needs at least five periods. Points, capped at 5:
//! - ROE above 15% in ≥80% of periods: 2, in ≥60%: 1
//! - average operating margin above 20% and not eroding: 1
//! - asset turnover above 1.0 in any period (≥3 reported): 1
//! - combined ROE/margin stability (1 − stddev/mean) above 0.7: 1

use super::analysis::{mean, pct, series, Analysis, AnalysisReport};
use crate::models::JsonMap;

const MAX_SCORE: u32 = 5;

pub struct MoatAnalysis;

/// `1 − σ/μ`, or 0 when the mean is not positive.
fn stability(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    1.0 - variance.sqrt() / avg
}

impl Analysis for MoatAnalysis {
    fn kind(&self) -> &'static str {
        "moat_analysis"
    }

    fn title(&self) -> &'static str {
        "MOAT analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(MAX_SCORE);
        if metrics.len() < 5 {
            return report.detail("Insufficient data for comprehensive moat analysis");
        }

        let roes = series(metrics, "return_on_equity");
        if roes.len() >= 5 {
            let high = roes.iter().filter(|roe| **roe > 0.15).count();
            let consistency = high as f64 / roes.len() as f64;

            if consistency >= 0.8 {
                report.score += 2;
                report.details.push(format!(
                    "Excellent ROE consistency: {}/{} periods >15% (avg: {}) - indicates durable competitive advantage",
                    high,
                    roes.len(),
                    pct(mean(&roes))
                ));
            } else if consistency >= 0.6 {
                report.score += 1;
                report.details.push(format!(
                    "Good ROE performance: {}/{} periods >15%",
                    high,
                    roes.len()
                ));
            } else {
                report.details.push(format!(
                    "Inconsistent ROE: only {}/{} periods >15%",
                    high,
                    roes.len()
                ));
            }
        } else {
            report
                .details
                .push("Insufficient ROE history for moat analysis".to_string());
        }

        let margins = series(metrics, "operating_margin");
        if margins.len() >= 5 {
            let avg = mean(&margins);
            let recent = mean(&margins[..3]);
            let older = mean(&margins[margins.len() - 3..]);

            if avg > 0.2 && recent >= older {
                report.score += 1;
                report.details.push(format!(
                    "Strong and stable operating margins (avg: {}) indicate pricing power moat",
                    pct(avg)
                ));
            } else if avg > 0.15 {
                report.details.push(format!(
                    "Decent operating margins (avg: {}) suggest some competitive advantage",
                    pct(avg)
                ));
            } else {
                report.details.push(format!(
                    "Low operating margins (avg: {}) suggest limited pricing power",
                    pct(avg)
                ));
            }
        }

        let turnovers = series(metrics, "asset_turnover");
        if turnovers.len() >= 3 && turnovers.iter().any(|t| *t > 1.0) {
            report.score += 1;
            report
                .details
                .push("Efficient asset utilization suggests operational moat".to_string());
        }

        if roes.len() >= 5 && margins.len() >= 5 {
            let overall = (stability(&roes) + stability(&margins)) / 2.0;
            if overall > 0.7 {
                report.score += 1;
                report.details.push(format!(
                    "High performance stability ({}) suggests strong competitive moat",
                    pct(overall)
                ));
            }
        }

        report.score = report.score.min(MAX_SCORE);
        if report.details.is_empty() {
            report
                .details
                .push("Limited moat analysis available".to_string());
        }
        report
    }
}
