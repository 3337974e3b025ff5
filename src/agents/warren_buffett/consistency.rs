//! Earnings consistency across periods

use super::analysis::{pct, series, Analysis, AnalysisReport};
use crate::models::JsonMap;

pub struct ConsistencyAnalysis;

impl Analysis for ConsistencyAnalysis {
    fn kind(&self) -> &'static str {
        "consistency_analysis"
    }

    fn title(&self) -> &'static str {
        "Consistency analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(3);
        if metrics.len() < 4 {
            return report.detail("Insufficient historical data");
        }

        let earnings: Vec<f64> = series(metrics, "net_income")
            .into_iter()
            .filter(|v| *v != 0.0)
            .collect();
        if earnings.len() < 4 {
            return report.detail("Insufficient earnings data for trend analysis");
        }

        // Newest first, so growth means each period beats the one before it.
        if earnings.windows(2).all(|pair| pair[0] > pair[1]) {
            report.score += 3;
            report
                .details
                .push("Consistent earnings growth over past periods".to_string());
        } else {
            report
                .details
                .push("Inconsistent earnings growth pattern".to_string());
        }

        let (latest, oldest) = (earnings[0], earnings[earnings.len() - 1]);
        let growth = (latest - oldest) / oldest.abs();
        report.details.push(format!(
            "Total earnings growth of {} over past {} periods",
            pct(growth),
            earnings.len()
        ));

        report
    }
}
