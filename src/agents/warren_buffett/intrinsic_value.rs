//! Intrinsic value from owner earnings
//!
//! Owner earnings = net income + D&A − maintenance capex − working capital
//! change. Valued with a three-stage DCF (5y growth, 5y transition, Gordon
//! terminal) at a 10% discount rate, then cut by a further 15%.

use super::analysis::{dollars, number, pct, reported, Analysis, AnalysisReport};
use crate::models::JsonMap;
use serde_json::{json, Value};

const STAGE1_YEARS: i32 = 5;
const STAGE2_YEARS: i32 = 5;
const TERMINAL_GROWTH: f64 = 0.025;
const DISCOUNT_RATE: f64 = 0.10;
const DEFAULT_GROWTH: f64 = 0.03;
const SAFETY_HAIRCUT: f64 = 0.85;

pub struct IntrinsicValueAnalysis;

struct OwnerEarnings {
    value: f64,
    details: Vec<String>,
}

/// Median of (85% of latest capex, latest D&A, average capex/revenue × latest
/// revenue) when three periods report the ratio, otherwise the larger of the
/// first two.
fn estimate_maintenance_capex(metrics: &[JsonMap]) -> f64 {
    let Some(latest) = metrics.first() else {
        return 0.0;
    };

    let capex_ratios: Vec<f64> = metrics
        .iter()
        .take(5)
        .filter_map(|row| {
            let capex = reported(row, "capital_expenditure")?;
            let revenue = reported(row, "revenue").filter(|r| *r > 0.0)?;
            Some(capex.abs() / revenue)
        })
        .collect();

    let by_capex = reported(latest, "capital_expenditure").map_or(0.0, f64::abs) * 0.85;
    let by_depreciation = reported(latest, "depreciation_and_amortization").unwrap_or(0.0);

    if capex_ratios.len() >= 3 {
        let avg_ratio = capex_ratios.iter().sum::<f64>() / capex_ratios.len() as f64;
        let by_revenue = avg_ratio * reported(latest, "revenue").unwrap_or(0.0);

        let mut estimates = [by_capex, by_depreciation, by_revenue];
        estimates.sort_by(|a, b| a.total_cmp(b));
        estimates[1]
    } else {
        by_capex.max(by_depreciation)
    }
}

fn owner_earnings(metrics: &[JsonMap]) -> std::result::Result<OwnerEarnings, String> {
    if metrics.len() < 2 {
        return Err("Insufficient data for owner earnings calculation".to_string());
    }
    let latest = &metrics[0];

    let net_income = number(latest, "net_income");
    let depreciation = number(latest, "depreciation_and_amortization");
    let capex = number(latest, "capital_expenditure");
    let (Some(net_income), Some(depreciation), Some(_)) = (net_income, depreciation, capex) else {
        let missing: Vec<&str> = [
            (net_income, "net income"),
            (depreciation, "depreciation"),
            (capex, "capital expenditure"),
        ]
        .into_iter()
        .filter(|(value, _)| value.is_none())
        .map(|(_, label)| label)
        .collect();
        return Err(format!("Missing components: {}", missing.join(", ")));
    };

    let maintenance_capex = estimate_maintenance_capex(metrics);
    let mut details = Vec::new();

    let previous = &metrics[1];
    let working_capital_change = match (
        reported(latest, "current_assets"),
        reported(latest, "current_liabilities"),
        reported(previous, "current_assets"),
        reported(previous, "current_liabilities"),
    ) {
        (Some(assets), Some(liabilities), Some(prev_assets), Some(prev_liabilities)) => {
            let change = (assets - liabilities) - (prev_assets - prev_liabilities);
            details.push(format!("Working capital change: {}", dollars(change)));
            change
        }
        _ => 0.0,
    };

    let value = net_income + depreciation - maintenance_capex - working_capital_change;

    if value < net_income * 0.3 {
        details.push(
            "Warning: Owner earnings significantly below net income - high capex intensity"
                .to_string(),
        );
    }
    if maintenance_capex > depreciation * 2.0 {
        details.push(
            "Warning: Estimated maintenance capex seems high relative to depreciation".to_string(),
        );
    }

    details.extend([
        format!("Net income: {}", dollars(net_income)),
        format!("Depreciation: {}", dollars(depreciation)),
        format!("Estimated maintenance capex: {}", dollars(maintenance_capex)),
        format!("Owner earnings: {}", dollars(value)),
    ]);

    Ok(OwnerEarnings { value, details })
}

/// Historical net income growth, clamped to [-5%, 15%] and cut by 30%.
fn conservative_growth(metrics: &[JsonMap]) -> f64 {
    let earnings: Vec<f64> = metrics
        .iter()
        .take(5)
        .filter_map(|row| reported(row, "net_income"))
        .collect();
    if earnings.len() < 3 {
        return DEFAULT_GROWTH;
    }

    let latest = earnings[0];
    let oldest = earnings[earnings.len() - 1];
    if oldest <= 0.0 {
        return DEFAULT_GROWTH;
    }

    let historical = if latest <= 0.0 {
        -0.05
    } else {
        let years = (earnings.len() - 1) as f64;
        ((latest / oldest).powf(1.0 / years) - 1.0).clamp(-0.05, 0.15)
    };
    historical * 0.7
}

impl Analysis for IntrinsicValueAnalysis {
    fn kind(&self) -> &'static str {
        "intrinsic_value_analysis"
    }

    fn title(&self) -> &'static str {
        "Intrinsic value analysis"
    }

    fn analyze(&self, metrics: &[JsonMap]) -> AnalysisReport {
        let mut report = AnalysisReport::new(6);
        report
            .extra
            .insert("intrinsic_value".to_string(), Value::Null);

        if metrics.len() < 3 {
            return report.detail("Insufficient data for reliable valuation");
        }

        let earnings = match owner_earnings(metrics) {
            Ok(earnings) if earnings.value != 0.0 => earnings,
            Ok(earnings) => {
                report.details.extend(earnings.details);
                return report;
            }
            Err(reason) => return report.detail(reason),
        };

        if number(&metrics[0], "ordinary_shares_number").map_or(true, |shares| shares <= 0.0) {
            return report.detail("Missing or invalid shares outstanding data");
        }

        let growth = conservative_growth(metrics);
        let stage1_growth = growth.min(0.08);
        let stage2_growth = (growth * 0.5).min(0.04);

        let stage1_pv: f64 = (1..=STAGE1_YEARS)
            .map(|year| {
                earnings.value * (1.0 + stage1_growth).powi(year)
                    / (1.0 + DISCOUNT_RATE).powi(year)
            })
            .sum();

        let stage1_final = earnings.value * (1.0 + stage1_growth).powi(STAGE1_YEARS);
        let stage2_pv: f64 = (1..=STAGE2_YEARS)
            .map(|year| {
                stage1_final * (1.0 + stage2_growth).powi(year)
                    / (1.0 + DISCOUNT_RATE).powi(STAGE1_YEARS + year)
            })
            .sum();

        let final_earnings = stage1_final * (1.0 + stage2_growth).powi(STAGE2_YEARS);
        let terminal_value =
            final_earnings * (1.0 + TERMINAL_GROWTH) / (DISCOUNT_RATE - TERMINAL_GROWTH);
        let terminal_pv = terminal_value / (1.0 + DISCOUNT_RATE).powi(STAGE1_YEARS + STAGE2_YEARS);

        let intrinsic_value = stage1_pv + stage2_pv + terminal_pv;
        let conservative_value = intrinsic_value * SAFETY_HAIRCUT;

        report.details = vec![
            format!(
                "Using three-stage DCF: Stage 1 ({}, {}y), Stage 2 ({}, {}y), Terminal ({})",
                pct(stage1_growth),
                STAGE1_YEARS,
                pct(stage2_growth),
                STAGE2_YEARS,
                pct(TERMINAL_GROWTH)
            ),
            format!("Stage 1 PV: {}", dollars(stage1_pv)),
            format!("Stage 2 PV: {}", dollars(stage2_pv)),
            format!("Terminal PV: {}", dollars(terminal_pv)),
            format!("Total IV: {}", dollars(intrinsic_value)),
            format!(
                "Conservative IV (15% haircut): {}",
                dollars(conservative_value)
            ),
            format!("Owner earnings: {}", dollars(earnings.value)),
            format!("Discount rate: {}", pct(DISCOUNT_RATE)),
        ];

        report.score = if conservative_value > 0.0 {
            6
        } else if intrinsic_value > 0.0 {
            3
        } else {
            0
        };

        report
            .extra
            .insert("intrinsic_value".to_string(), json!(conservative_value));
        report
            .extra
            .insert("raw_intrinsic_value".to_string(), json!(intrinsic_value));
        report
            .extra
            .insert("owner_earnings".to_string(), json!(earnings.value));
        report.extra.insert(
            "assumptions".to_string(),
            json!({
                "stage1_growth": stage1_growth,
                "stage2_growth": stage2_growth,
                "terminal_growth": TERMINAL_GROWTH,
                "discount_rate": DISCOUNT_RATE,
                "stage1_years": STAGE1_YEARS,
                "stage2_years": STAGE2_YEARS,
                "historical_growth": growth,
            }),
        );
        report
    }
}
