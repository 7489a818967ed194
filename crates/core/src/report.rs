#![allow(clippy::format_push_string)]

use crate::config::RiskConfig;
use crate::portfolio::Portfolio;
use crate::risk::{conditional_var, RiskBudget};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Daily risk summary rendered as markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
}

impl RiskReport {
    #[must_use]
    pub fn new(metrics: BTreeMap<String, f64>) -> Self {
        Self {
            generated_at: Utc::now(),
            metrics,
        }
    }

    /// Builds the daily report from the live ledger, a return history and the
    /// latest risk budget.
    #[must_use]
    pub fn from_portfolio(
        portfolio: &Portfolio,
        marks: &HashMap<String, Decimal>,
        returns: &[f64],
        budget: &RiskBudget,
        config: &RiskConfig,
    ) -> Self {
        let to_f64 = |value: Decimal| value.to_f64().unwrap_or(0.0);
        let metrics = BTreeMap::from([
            ("capital".to_string(), to_f64(config.capital)),
            ("cash".to_string(), to_f64(portfolio.cash())),
            ("equity".to_string(), to_f64(portfolio.equity(marks))),
            ("cvar".to_string(), conditional_var(returns, config.confidence_level)),
            ("allocation".to_string(), to_f64(budget.allocation)),
            ("max_loss".to_string(), to_f64(budget.max_loss)),
        ]);
        Self::new(metrics)
    }

    #[must_use]
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut output = String::from("# Daily Risk Report\n\n");
        output.push_str(&format!("Generated at: {}\n\n", self.generated_at.to_rfc3339()));

        for (key, value) in &self.metrics {
            output.push_str(&format!("- **{}**: {value:.4}\n", title_case(key)));
        }
        output
    }

    /// Writes the rendered report, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        std::fs::write(path, self.render_markdown())
            .with_context(|| format!("Failed to write risk report to {}", path.display()))?;
        tracing::info!(path = %path.display(), metrics = self.metrics.len(), "Risk report saved");
        Ok(path.to_path_buf())
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> RiskReport {
        let metrics = BTreeMap::from([
            ("cvar".to_string(), -0.05),
            ("max_drawdown".to_string(), -0.123_456),
        ]);
        RiskReport::new(metrics)
            .with_generated_at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn renders_header_and_sorted_metrics() {
        let markdown = report().render_markdown();

        assert!(markdown.starts_with("# Daily Risk Report\n"));
        assert!(markdown.contains("Generated at: 2024-03-01T12:00:00+00:00"));
        let cvar = markdown.find("- **Cvar**: -0.0500").unwrap();
        let drawdown = markdown.find("- **Max Drawdown**: -0.1235").unwrap();
        assert!(cvar < drawdown);
    }

    #[test]
    fn from_portfolio_collects_risk_metrics() {
        use crate::risk::compute_risk_budget;
        use rust_decimal_macros::dec;

        let config = RiskConfig::default();
        let portfolio = Portfolio::new(dec!(100000), 10);
        let budget = compute_risk_budget(0.5, &config);

        let report = RiskReport::from_portfolio(
            &portfolio,
            &HashMap::new(),
            &[-0.04, 0.01, 0.02],
            &budget,
            &config,
        );

        assert_eq!(report.metrics["capital"], 100_000.0);
        assert_eq!(report.metrics["equity"], 100_000.0);
        assert_eq!(report.metrics["allocation"], 62_500.0);
        assert_eq!(report.metrics["max_loss"], 12_500.0);
        assert!((report.metrics["cvar"] + 0.04).abs() < 1e-12);
    }

    #[test]
    fn title_case_splits_on_underscores() {
        assert_eq!(title_case("total_return"), "Total Return");
        assert_eq!(title_case("sharpe"), "Sharpe");
        assert_eq!(title_case("__x"), "X");
    }

    #[test]
    fn save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("risk.md");

        let written = report().save(&path).unwrap();

        assert_eq!(written, path);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Max Drawdown"));
    }
}
