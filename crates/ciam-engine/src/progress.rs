//! Period callback that reports run progress through the log.

use ciam_core::market::Marketplace;
use ciam_core::runner::{PeriodCallback, PeriodSummary};
use ciam_core::solver::relative_excess;
use tracing::{debug, info, warn};

/// Logs one line per period and remembers which periods failed to clear.
#[derive(Debug, Default)]
pub struct ProgressCallback {
    unconverged: Vec<i32>,
}

impl ProgressCallback {
    /// Create a callback with no recorded periods.
    pub const fn new() -> Self {
        Self {
            unconverged: Vec::new(),
        }
    }

    /// Years of solved periods whose markets did not clear.
    pub fn unconverged_years(&self) -> &[i32] {
        &self.unconverged
    }
}

impl PeriodCallback for ProgressCallback {
    fn on_period(&mut self, summary: &PeriodSummary, marketplace: &Marketplace) {
        let worst = marketplace
            .markets()
            .filter_map(|market| market.record(summary.period).map(|r| (market, relative_excess(r))))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match summary.solved {
            Some(report) if !report.converged => {
                self.unconverged.push(summary.year);
                warn!(
                    period = summary.period,
                    year = summary.year,
                    iterations = report.iterations,
                    worst_market = worst.map(|(market, _)| market.key().to_string()),
                    "Period finished without clearing"
                );
            }
            Some(report) => info!(
                period = summary.period,
                year = summary.year,
                iterations = report.iterations,
                "Period cleared"
            ),
            None => info!(period = summary.period, year = summary.year, "Base period evaluated"),
        }

        match serde_json::to_string(summary) {
            Ok(json) => debug!(summary = %json, "Period summary"),
            Err(e) => debug!(error = %e, "Period summary not serializable"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ciam_core::market::{MarketKey, MarketKind};
    use ciam_core::solver::SolveReport;

    use super::*;

    #[test]
    fn only_unconverged_solved_periods_are_remembered() {
        let mut marketplace = Marketplace::new(3);
        marketplace.create_market(MarketKey::new("usa", "coal"), MarketKind::Normal, 1.0);
        let mut callback = ProgressCallback::new();

        let report = |period, converged| SolveReport {
            period,
            converged,
            iterations: 12,
            max_relative_excess: 0.0,
        };
        callback.on_period(
            &PeriodSummary {
                period: 0,
                year: 2000,
                solved: None,
            },
            &marketplace,
        );
        callback.on_period(
            &PeriodSummary {
                period: 1,
                year: 2010,
                solved: Some(report(1, true)),
            },
            &marketplace,
        );
        callback.on_period(
            &PeriodSummary {
                period: 2,
                year: 2020,
                solved: Some(report(2, false)),
            },
            &marketplace,
        );

        assert_eq!(callback.unconverged_years(), &[2020]);
    }
}
