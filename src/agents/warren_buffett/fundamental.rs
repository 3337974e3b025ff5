//! Latest-period fundamentals: ROE, leverage, margins, liquidity

use super::analysis::{pct, reported, Analysis, AnalysisReport};
use crate::models::JsonMap;

pub struct FundamentalAnalysis;

impl Analysis for FundamentalAnalysis {
    fn kind(&self) -> &'static str {
        "fundamental_analysis"
    }

    fn title(&self) -> &'static str {
        "Fundamental analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(7);
        let Some(latest) = metrics.first() else {
            return report.detail("No metrics available");
        };

        match reported(latest, "return_on_equity") {
            Some(roe) if roe > 0.15 => {
                report.score += 2;
                report.details.push(format!("Strong ROE of {}", pct(roe)));
            }
            Some(roe) => report.details.push(format!("Weak ROE of {}", pct(roe))),
            None => report.details.push("ROE data not available".to_string()),
        }

        match reported(latest, "debt_to_equity") {
            Some(de) if de < 0.5 => {
                report.score += 2;
                report.details.push("Conservative debt levels".to_string());
            }
            Some(de) => report
                .details
                .push(format!("High debt to equity ratio of {:.1}", de)),
            None => report
                .details
                .push("Debt to equity data not available".to_string()),
        }

        match reported(latest, "operating_margin") {
            Some(margin) if margin > 0.15 => {
                report.score += 2;
                report.details.push("Strong operating margins".to_string());
            }
            Some(margin) => report
                .details
                .push(format!("Weak operating margin of {}", pct(margin))),
            None => report
                .details
                .push("Operating margin data not available".to_string()),
        }

        match reported(latest, "current_ratio") {
            Some(ratio) if ratio > 1.5 => {
                report.score += 1;
                report.details.push("Good liquidity position".to_string());
            }
            Some(ratio) => report
                .details
                .push(format!("Weak liquidity with current ratio of {:.1}", ratio)),
            None => report
                .details
                .push("Current ratio data not available".to_string()),
        }

        report
    }
}
