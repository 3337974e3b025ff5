//! Book value per share growth

use super::analysis::{pct, reported, Analysis, AnalysisReport};
use crate::models::JsonMap;

pub struct BookValueGrowthAnalysis;

/// Score and explanation for the compound growth of book value per share.
fn cagr_score(book_values: &[f64]) -> (u32, String) {
    if book_values.len() < 2 {
        return (0, "Insufficient data for CAGR calculation".to_string());
    }

    let latest = book_values[0];
    let oldest = book_values[book_values.len() - 1];
    let years = (book_values.len() - 1) as f64;

    if oldest > 0.0 && latest > 0.0 {
        let cagr = (latest / oldest).powf(1.0 / years) - 1.0;
        if cagr > 0.15 {
            (2, format!("Excellent book value CAGR: {}", pct(cagr)))
        } else if cagr > 0.1 {
            (1, format!("Good book value CAGR: {}", pct(cagr)))
        } else {
            (0, format!("Book value CAGR: {}", pct(cagr)))
        }
    } else if oldest < 0.0 && latest > 0.0 {
        (
            3,
            "Excellent: Company improved from negative to positive book value".to_string(),
        )
    } else if oldest > 0.0 && latest < 0.0 {
        (
            0,
            "Warning: Company declined from positive to negative book value".to_string(),
        )
    } else {
        (
            0,
            "Unable to calculate meaningful book value CAGR due to negative values".to_string(),
        )
    }
}

impl Analysis for BookValueGrowthAnalysis {
    fn kind(&self) -> &'static str {
        "book_value_growth_analysis"
    }

    fn title(&self) -> &'static str {
        "Book value growth analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(6);
        if metrics.len() < 3 {
            return report.detail("Insufficient data for book value analysis");
        }

        let book_values: Vec<f64> = metrics
            .iter()
            .filter_map(|row| {
                let equity = reported(row, "stockholders_equity")?;
                let shares = reported(row, "ordinary_shares_number")?;
                Some(equity / shares)
            })
            .collect();

        if book_values.len() < 3 {
            return report.detail("Insufficient book value data for growth analysis");
        }

        let growth_periods = book_values
            .windows(2)
            .filter(|pair| pair[0] > pair[1])
            .count();
        let growth_rate = growth_periods as f64 / (book_values.len() - 1) as f64;

        let (points, detail) = if growth_rate >= 0.8 {
            (3, "Consistent book value per share growth (Buffett's favorite metric)")
        } else if growth_rate >= 0.6 {
            (2, "Good book value per share growth pattern")
        } else if growth_rate >= 0.4 {
            (1, "Moderate book value per share growth")
        } else {
            (0, "Inconsistent book value per share growth")
        };
        report.score += points;
        report.details.push(detail.to_string());

        let (points, detail) = cagr_score(&book_values);
        report.score += points;
        report.details.push(detail);

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::warren_buffett::analysis::rows;
    use serde_json::json;

    #[test]
    fn test_compounding_book_value() {
        let metrics = rows(json!([
            {"stockholders_equity": 1440.0, "ordinary_shares_number": 10.0},
            {"stockholders_equity": 1200.0, "ordinary_shares_number": 10.0},
            {"stockholders_equity": 1000.0, "ordinary_shares_number": 10.0}
        ]));

        let report = BookValueGrowthAnalysis.analyze(&metrics);
        assert_eq!(report.score, 5);
        assert_eq!(report.max_score, 6);
        assert_eq!(report.details[1], "Excellent book value CAGR: 20.0%");
    }

    #[test]
    fn test_turnaround_from_negative_equity() {
        let (points, detail) = cagr_score(&[5.0, -1.0, -3.0]);
        assert_eq!(points, 3);
        assert!(detail.starts_with("Excellent: Company improved"));

        let (points, _) = cagr_score(&[-5.0, 2.0]);
        assert_eq!(points, 0);
    }

    #[test]
    fn test_missing_share_counts() {
        let metrics = rows(json!([
            {"stockholders_equity": 10.0},
            {"stockholders_equity": 9.0, "ordinary_shares_number": 0},
            {"stockholders_equity": 8.0, "ordinary_shares_number": 1}
        ]));

        let report = BookValueGrowthAnalysis.analyze(&metrics);
        assert_eq!(report.score, 0);
        assert_eq!(
            report.details,
            vec!["Insufficient book value data for growth analysis"]
        );
    }
}
