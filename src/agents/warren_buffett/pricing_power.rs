//! Pricing power from gross margin level and trend

use super::analysis::{mean, pct, series, Analysis, AnalysisReport};
use crate::models::JsonMap;

pub struct PricingPowerAnalysis;

impl Analysis for PricingPowerAnalysis {
    fn kind(&self) -> &'static str {
        "pricing_power_analysis"
    }

    fn title(&self) -> &'static str {
        "Pricing power analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(5);
        if metrics.is_empty() {
            return report.detail("Insufficient data for pricing power analysis");
        }

        let margins = series(metrics, "gross_margin");

        if margins.len() >= 3 {
            let recent = mean(&margins[..2]);
            let older = mean(&margins[margins.len() - 2..]);

            if recent > older + 0.02 {
                report.score += 3;
                report
                    .details
                    .push("Expanding gross margins indicate strong pricing power".to_string());
            } else if recent > older {
                report.score += 2;
                report
                    .details
                    .push("Improving gross margins suggest good pricing power".to_string());
            } else if (recent - older).abs() < 0.01 {
                report.score += 1;
                report
                    .details
                    .push("Stable gross margins during economic uncertainty".to_string());
            } else {
                report
                    .details
                    .push("Declining gross margins may indicate pricing pressure".to_string());
            }
        }

        if !margins.is_empty() {
            let avg = mean(&margins);
            if avg > 0.5 {
                report.score += 2;
                report.details.push(format!(
                    "Consistently high gross margins ({}) indicate strong pricing power",
                    pct(avg)
                ));
            } else if avg > 0.3 {
                report.score += 1;
                report.details.push(format!(
                    "Good gross margins ({}) suggest decent pricing power",
                    pct(avg)
                ));
            }
        }

        if report.details.is_empty() {
            report
                .details
                .push("Limited pricing power analysis available".to_string());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::warren_buffett::analysis::rows;
    use serde_json::json;

    #[test]
    fn test_expanding_high_margins() {
        let metrics = rows(json!([
            {"gross_margin": 0.62},
            {"gross_margin": 0.60},
            {"gross_margin": 0.56},
            {"gross_margin": 0.54}
        ]));

        let report = PricingPowerAnalysis.analyze(&metrics);
        assert_eq!(report.score, 5);
        assert_eq!(
            report.details,
            vec![
                "Expanding gross margins indicate strong pricing power",
                "Consistently high gross margins (58.0%) indicate strong pricing power"
            ]
        );
    }

    #[test]
    fn test_stable_mid_margins() {
        let metrics = rows(json!([
            {"gross_margin": 0.40},
            {"gross_margin": 0.40},
            {"gross_margin": 0.40}
        ]));

        let report = PricingPowerAnalysis.analyze(&metrics);
        assert_eq!(report.score, 2);
        assert_eq!(report.details[0], "Stable gross margins during economic uncertainty");
    }

    #[test]
    fn test_without_margins() {
        let report = PricingPowerAnalysis.analyze(&rows(json!([{"revenue": 1}])));
        assert_eq!(report.score, 0);
        assert_eq!(report.details, vec!["Limited pricing power analysis available"]);

        let empty = PricingPowerAnalysis.analyze(&[]);
        assert_eq!(empty.details, vec!["Insufficient data for pricing power analysis"]);
    }
}
