//! Post-run Trading Analysis
//!
//! Pure functions over the logs a run leaves behind. Nothing here reads or
//! writes live simulation state.

use crate::calendar::Hour;
use crate::events::EventHistory;
use crate::ledger::{TradeAction, TradeRecord};
use crate::pricing::CONTRACT_MULTIPLIER;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Trades per day above which a run counts as overtrading
const OVERTRADING_PER_DAY: f64 = 5.0;
/// Lookback for news that may have prompted a buy
const TIMING_WINDOW_HOURS: Hour = 3;

/// Logs the analyzer consumes
#[derive(Debug, Clone, Copy)]
pub struct RunHistory<'a> {
    pub trades: &'a [TradeRecord],
    pub portfolio_history: &'a [f64],
    pub event_history: &'a EventHistory,
    pub final_return_pct: f64,
    pub catalog_size: usize,
    pub trading_days: u32,
    pub starting_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Strength,
    Weakness,
    Tip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One piece of feedback for the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingInsight {
    pub category: InsightCategory,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl TradingInsight {
    fn new(category: InsightCategory, severity: Severity, title: &str, description: String) -> Self {
        Self {
            category,
            title: title.to_string(),
            description,
            severity: Some(severity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradingStyle {
    #[serde(rename = "Balanced Trader")]
    Balanced,
    #[serde(rename = "Aggressive Momentum Trader")]
    AggressiveMomentum,
    #[serde(rename = "Conservative Diversified Investor")]
    ConservativeDiversified,
    #[serde(rename = "Concentrated Position Trader")]
    ConcentratedPosition,
}

impl fmt::Display for TradingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TradingStyle::Balanced => "Balanced Trader",
            TradingStyle::AggressiveMomentum => "Aggressive Momentum Trader",
            TradingStyle::ConservativeDiversified => "Conservative Diversified Investor",
            TradingStyle::ConcentratedPosition => "Concentrated Position Trader",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

/// Analyzer output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradingAnalysis {
    pub insights: Vec<TradingInsight>,
    pub trading_style: TradingStyle,
    pub risk_level: RiskLevel,
    /// Distinct instruments traded as a share of the catalog, 0..=100
    pub diversification_score: f64,
    /// Largest single-instrument share of bought units, 0..=100
    pub concentration_pct: f64,
    /// Share of buys placed shortly after a relevant event, 0..=100
    pub timing_score: f64,
}

/// Headline numbers for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub starting_value: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    /// Worst peak-to-trough decline of portfolio value, as a positive percent
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
}

/// Summarize portfolio history and trade count
pub fn performance_summary(run: &RunHistory<'_>) -> PerformanceSummary {
    let final_value = run
        .portfolio_history
        .last()
        .copied()
        .unwrap_or(run.starting_balance);
    PerformanceSummary {
        starting_value: run.starting_balance,
        final_value,
        total_return_pct: run.final_return_pct,
        max_drawdown_pct: max_drawdown_pct(run.portfolio_history),
        trade_count: run.trades.len(),
    }
}

/// Largest decline from a running peak, in percent
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak * 100.0);
        }
    }
    worst
}

/// Analyze a finished (or in-progress) run
pub fn analyze(run: &RunHistory<'_>) -> TradingAnalysis {
    let mut insights = Vec::new();
    let total_trades = run.trades.len();

    // Frequency
    let days = run.trading_days.max(1) as f64;
    let per_day = total_trades as f64 / days;
    let overtrading = per_day > OVERTRADING_PER_DAY;
    let undertrading = per_day < 1.0 && total_trades > 0;
    if overtrading {
        insights.push(TradingInsight::new(
            InsightCategory::Weakness,
            Severity::High,
            "Overtrading Detected",
            format!(
                "You made {} trades ({:.1} per day). Overtrading can lead to emotional \
                 decision-making. Consider being more selective with your trades.",
                total_trades, per_day
            ),
        ));
    } else if undertrading {
        insights.push(TradingInsight::new(
            InsightCategory::Tip,
            Severity::Low,
            "Consider More Active Trading",
            format!(
                "You made only {} trades. While patience is good, consider taking \
                 advantage of more opportunities when they arise.",
                total_trades
            ),
        ));
    }

    // Diversification
    let traded: BTreeSet<&str> = run.trades.iter().map(|t| t.ticker.as_str()).collect();
    let diversification_score = if run.catalog_size == 0 {
        0.0
    } else {
        (traded.len() as f64 / run.catalog_size as f64 * 100.0).min(100.0)
    };
    if diversification_score < 30.0 {
        insights.push(TradingInsight::new(
            InsightCategory::Weakness,
            Severity::High,
            "Low Diversification",
            format!(
                "You traded only {} different stocks. Diversification helps reduce risk. \
                 Consider spreading investments across more sectors.",
                traded.len()
            ),
        ));
    } else if diversification_score > 70.0 {
        insights.push(TradingInsight::new(
            InsightCategory::Strength,
            Severity::Low,
            "Good Diversification",
            format!(
                "You diversified across {} different stocks. This helps manage risk effectively.",
                traded.len()
            ),
        ));
    }

    // Concentration
    let concentration_pct = concentration(run.trades);
    if concentration_pct > 50.0 {
        insights.push(TradingInsight::new(
            InsightCategory::Weakness,
            Severity::High,
            "High Position Concentration",
            format!(
                "Your largest position represents {:.0}% of what you bought. High \
                 concentration increases risk if that stock underperforms.",
                concentration_pct
            ),
        ));
    }

    // Cash deployment
    if let Some(insight) = cash_insight(run) {
        insights.push(insight);
    }

    // Return
    if run.final_return_pct > 20.0 {
        insights.push(TradingInsight::new(
            InsightCategory::Strength,
            Severity::Low,
            "Strong Performance",
            format!(
                "You achieved a {:.1}% return! Excellent work managing your portfolio \
                 through market volatility.",
                run.final_return_pct
            ),
        ));
    } else if run.final_return_pct < -10.0 {
        insights.push(TradingInsight::new(
            InsightCategory::Weakness,
            Severity::High,
            "Negative Returns",
            format!(
                "You finished with a {:.1}% return. Review your strategy and consider \
                 risk management and research before trades.",
                run.final_return_pct
            ),
        ));
    }

    let trading_style = if overtrading && concentration_pct > 40.0 {
        TradingStyle::AggressiveMomentum
    } else if per_day < 2.0 && diversification_score > 60.0 {
        TradingStyle::ConservativeDiversified
    } else if concentration_pct > 60.0 {
        TradingStyle::ConcentratedPosition
    } else {
        TradingStyle::Balanced
    };

    let risk_level = if concentration_pct > 50.0 || diversification_score < 30.0 {
        RiskLevel::High
    } else if diversification_score > 70.0 && concentration_pct < 30.0 {
        RiskLevel::Low
    } else {
        RiskLevel::Moderate
    };

    TradingAnalysis {
        insights,
        trading_style,
        risk_level,
        diversification_score,
        concentration_pct,
        timing_score: timing_score(run.trades, run.event_history),
    }
}

/// Largest single-instrument share of bought units. Option opens count
/// their full contract size.
fn concentration(trades: &[TradeRecord]) -> f64 {
    let mut bought: BTreeMap<&str, f64> = BTreeMap::new();
    for trade in trades {
        let units = match trade.action {
            TradeAction::Buy => trade.quantity as f64,
            TradeAction::OpenCall | TradeAction::OpenPut => trade.quantity as f64 * CONTRACT_MULTIPLIER,
            TradeAction::Sell | TradeAction::CloseOption => continue,
        };
        *bought.entry(trade.ticker.as_str()).or_insert(0.0) += units;
    }
    let total: f64 = bought.values().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let largest = bought.values().copied().fold(0.0, f64::max);
    largest / total * 100.0
}

fn cash_insight(run: &RunHistory<'_>) -> Option<TradingInsight> {
    if run.starting_balance <= 0.0 {
        return None;
    }
    let spent: f64 = run
        .trades
        .iter()
        .filter(|t| matches!(t.action, TradeAction::Buy | TradeAction::OpenCall | TradeAction::OpenPut))
        .map(TradeRecord::notional)
        .sum();
    let deployed = spent.min(run.starting_balance);
    let cash_pct = (run.starting_balance - deployed) / run.starting_balance * 100.0;

    if cash_pct > 80.0 {
        Some(TradingInsight::new(
            InsightCategory::Tip,
            Severity::Low,
            "High Cash Position",
            format!(
                "You held {:.0}% cash. While safe, you may have missed opportunities. \
                 Consider deploying more capital when confident.",
                cash_pct
            ),
        ))
    } else if cash_pct < 10.0 {
        Some(TradingInsight::new(
            InsightCategory::Weakness,
            Severity::Medium,
            "Low Cash Reserve",
            format!(
                "You held very little cash ({:.0}%). Maintaining cash reserves helps you \
                 take advantage of opportunities and manage risk.",
                cash_pct
            ),
        ))
    } else {
        None
    }
}

/// Buys made within three hours after an event naming the instrument, as a
/// share of all trades (capped at 100). 50 when there were no trades.
fn timing_score(trades: &[TradeRecord], history: &EventHistory) -> f64 {
    if trades.is_empty() {
        return 50.0;
    }
    let well_timed = trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .filter(|t| {
            let from = t.hour.saturating_sub(TIMING_WINDOW_HOURS);
            history.naming_between(&t.ticker, from, t.hour).next().is_some()
        })
        .count();
    (well_timed as f64 / trades.len() as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::tests::template;
    use crate::events::{ActiveEvent, Sentiment};

    fn trade(ticker: &str, action: TradeAction, quantity: u64, price: f64, hour: Hour) -> TradeRecord {
        TradeRecord {
            ticker: ticker.to_string(),
            action,
            quantity,
            price,
            hour,
            strike: None,
            expiration_hour: None,
        }
    }

    fn run<'a>(trades: &'a [TradeRecord], values: &'a [f64], history: &'a EventHistory, ret: f64) -> RunHistory<'a> {
        RunHistory {
            trades,
            portfolio_history: values,
            event_history: history,
            final_return_pct: ret,
            catalog_size: 10,
            trading_days: 10,
            starting_balance: 10_000.0,
        }
    }

    fn has(analysis: &TradingAnalysis, title: &str) -> bool {
        analysis.insights.iter().any(|i| i.title == title)
    }

    #[test]
    fn test_no_trades() {
        let history = EventHistory::new();
        let analysis = analyze(&run(&[], &[10_000.0], &history, 0.0));
        assert_eq!(analysis.timing_score, 50.0);
        assert_eq!(analysis.diversification_score, 0.0);
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert!(has(&analysis, "Low Diversification"));
        assert!(has(&analysis, "High Cash Position"));
        assert!(!has(&analysis, "Consider More Active Trading"));
    }

    #[test]
    fn test_single_stock_run_is_concentrated() {
        let trades = vec![
            trade("GLCR", TradeAction::Buy, 50, 180.0, 2),
            trade("GLCR", TradeAction::Sell, 50, 190.0, 30),
        ];
        let history = EventHistory::new();
        let analysis = analyze(&run(&trades, &[10_000.0, 10_500.0], &history, 5.0));

        assert_eq!(analysis.diversification_score, 10.0);
        assert_eq!(analysis.concentration_pct, 100.0);
        assert_eq!(analysis.trading_style, TradingStyle::ConcentratedPosition);
        assert_eq!(analysis.risk_level, RiskLevel::High);
        assert!(has(&analysis, "High Position Concentration"));
        assert!(has(&analysis, "Consider More Active Trading"));
        // 9,000 of 10,000 deployed
        assert!(!has(&analysis, "Low Cash Reserve"));
    }

    #[test]
    fn test_diversified_low_risk() {
        let tickers = ["GLCR", "EDU", "SOLR", "MEDX", "FINX", "AUTO", "RETAIL", "BIO"];
        let trades: Vec<TradeRecord> = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| trade(t, TradeAction::Buy, 10, 20.0, i as Hour * 8 + 1))
            .collect();
        let history = EventHistory::new();
        let analysis = analyze(&run(&trades, &[10_000.0], &history, 25.0));

        assert_eq!(analysis.diversification_score, 80.0);
        assert!((analysis.concentration_pct - 12.5).abs() < 1e-9);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.trading_style, TradingStyle::ConservativeDiversified);
        assert!(has(&analysis, "Good Diversification"));
        assert!(has(&analysis, "Strong Performance"));
    }

    #[test]
    fn test_overtrading_momentum() {
        let trades: Vec<TradeRecord> = (0..60)
            .map(|i| trade(if i % 3 == 0 { "EDU" } else { "GLCR" }, TradeAction::Buy, 1, 10.0, i))
            .collect();
        let history = EventHistory::new();
        let analysis = analyze(&run(&trades, &[10_000.0], &history, -12.0));

        assert_eq!(analysis.trading_style, TradingStyle::AggressiveMomentum);
        assert!(has(&analysis, "Overtrading Detected"));
        assert!(has(&analysis, "Negative Returns"));
    }

    #[test]
    fn test_options_count_as_contract_units() {
        let trades = vec![
            trade("GLCR", TradeAction::Buy, 100, 10.0, 1),
            trade("SOLR", TradeAction::OpenCall, 1, 0.5, 1),
        ];
        let history = EventHistory::new();
        let analysis = analyze(&run(&trades, &[10_000.0], &history, 0.0));
        assert!((analysis.concentration_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_timing_score_counts_recent_events() {
        let mut history = EventHistory::new();
        history.append(ActiveEvent::new(template("a", Sentiment::Positive, &["GLCR"]), 4));
        history.append(ActiveEvent::new(template("b", Sentiment::Negative, &["EDU"]), 12));

        let trades = vec![
            // One hour after the GLCR event
            trade("GLCR", TradeAction::Buy, 1, 10.0, 5),
            // Same hour as the EDU event: not "before"
            trade("EDU", TradeAction::Buy, 1, 10.0, 12),
            // Four hours after: outside the window
            trade("GLCR", TradeAction::Buy, 1, 10.0, 8),
            // Sells never score but still count as trades
            trade("GLCR", TradeAction::Sell, 1, 10.0, 6),
        ];
        let analysis = analyze(&run(&trades, &[10_000.0], &history, 0.0));
        assert!((analysis.timing_score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_timing_ignores_market_wide_events() {
        let mut history = EventHistory::new();
        history.append(ActiveEvent::new(template("m", Sentiment::Positive, &[]), 4));

        let trades = vec![trade("GLCR", TradeAction::Buy, 1, 10.0, 5)];
        let analysis = analyze(&run(&trades, &[10_000.0], &history, 0.0));
        assert_eq!(analysis.timing_score, 0.0);
    }

    #[test]
    fn test_timing_options_only_run_scores_zero() {
        let mut history = EventHistory::new();
        history.append(ActiveEvent::new(template("a", Sentiment::Positive, &["GLCR"]), 4));

        let trades = vec![
            trade("GLCR", TradeAction::OpenCall, 2, 3.0, 5),
            trade("GLCR", TradeAction::CloseOption, 2, 4.0, 7),
        ];
        let analysis = analyze(&run(&trades, &[10_000.0], &history, 0.0));
        assert_eq!(analysis.timing_score, 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        let values = [100.0, 120.0, 90.0, 110.0, 60.0, 130.0];
        assert!((max_drawdown_pct(&values) - 50.0).abs() < 1e-9);
        assert_eq!(max_drawdown_pct(&[100.0, 101.0, 102.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    #[test]
    fn test_performance_summary() {
        let trades = vec![trade("BIO", TradeAction::Buy, 1, 150.0, 0)];
        let history = EventHistory::new();
        let values = [10_000.0, 9_000.0, 11_000.0];
        let summary = performance_summary(&run(&trades, &values, &history, 10.0));
        assert_eq!(summary.final_value, 11_000.0);
        assert_eq!(summary.trade_count, 1);
        assert!((summary.max_drawdown_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_style_labels() {
        assert_eq!(TradingStyle::ConservativeDiversified.to_string(), "Conservative Diversified Investor");
        assert_eq!(RiskLevel::Moderate.to_string(), "Moderate");
    }
}
