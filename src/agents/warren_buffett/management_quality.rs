//! Shareholder-friendly capital allocation: buybacks and dividends

use super::analysis::{reported, Analysis, AnalysisReport};
use crate::models::JsonMap;

pub struct ManagementQualityAnalysis;

impl Analysis for ManagementQualityAnalysis {
    fn kind(&self) -> &'static str {
        "management_quality_analysis"
    }

    fn title(&self) -> &'static str {
        "Management quality analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(2);
        let Some(latest) = metrics.first() else {
            return report.detail("Insufficient data for management analysis");
        };

        // Cash-flow sign convention: negative issuance is money spent on buybacks.
        let issuance = reported(latest, "issuance_or_purchase_of_equity_shares");
        if issuance.is_some_and(|v| v < 0.0) {
            report.score += 1;
            report
                .details
                .push("Company has been repurchasing shares (shareholder-friendly)".to_string());
        }
        if issuance.is_some_and(|v| v > 0.0) {
            report
                .details
                .push("Recent common stock issuance (potential dilution)".to_string());
        } else {
            report
                .details
                .push("No significant new stock issuance detected".to_string());
        }

        let dividends = reported(latest, "dividends_and_other_cash_distributions");
        if dividends.is_some_and(|v| v < 0.0) {
            report.score += 1;
            report
                .details
                .push("Company has a track record of paying dividends".to_string());
        } else {
            report.details.push("No or minimal dividends paid".to_string());
        }

        report
    }
}
