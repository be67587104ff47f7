//! Equilibrium solver seam and a bisection/Newton-Raphson solver.
//!
//! The run driver needs exactly one thing from a solver: given the market
//! state and the world, leave the period's markets at (or as close as the
//! solver gets to) equilibrium. The [`MarketSolver`] trait abstracts the
//! numerical method. The driver never branches on the returned
//! [`SolveReport`]; convergence diagnostics are logged here.
//!
//! Whatever a solver does internally, it must finish with the period's
//! registers holding one consistent evaluation at the final prices, because
//! the next period's carryover copies them verbatim.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::market::{MarketKey, MarketRecord, Marketplace};
use crate::world::WorldCalc;

/// Smallest price a bracket is allowed to start from.
const MIN_START_PRICE: f64 = 1e-6;

/// Relative bracket width, as a fraction of the tolerance, below which an
/// uncleared bracket is widened again.
const COLLAPSE_FRACTION: f64 = 1e-2;

/// Log-price perturbation used for finite-difference Jacobian columns.
const JACOBIAN_LOG_STEP: f64 = 1e-5;

/// Largest change of any log price in one Newton step.
const MAX_LOG_STEP: f64 = 1.0;

/// Step halvings tried before a Newton step is abandoned.
const MAX_LINE_SEARCH_STEPS: u32 = 12;

/// Outcome of one `solve` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolveReport {
    /// Period that was solved.
    pub period: usize,
    /// Whether every solvable market met the tolerance.
    pub converged: bool,
    /// Number of world evaluations performed.
    pub iterations: u32,
    /// Largest relative excess demand left across solvable markets.
    pub max_relative_excess: f64,
}

/// A method for clearing one period's markets.
pub trait MarketSolver {
    /// Adjust the prices of `period`'s solvable markets until supply meets
    /// demand or a stopping condition is hit.
    ///
    /// Implementations re-evaluate `world.calc` as often as they need and
    /// must leave the registers of `period` consistent with its final prices.
    fn solve(
        &mut self,
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        period: usize,
    ) -> SolveReport;
}

/// Null the period's registers and run one supply/demand evaluation.
pub fn evaluate(marketplace: &mut Marketplace, world: &mut dyn WorldCalc, period: usize) {
    marketplace.null_demands(period);
    marketplace.null_supplies(period);
    world.calc(marketplace, period);
}

/// `|demand - supply| / max(|demand|, |supply|)`, or zero for an idle market.
pub fn relative_excess(record: &MarketRecord) -> f64 {
    let scale = record.demand.abs().max(record.supply.abs());
    if scale < f64::EPSILON {
        0.0
    } else {
        record.excess_demand().abs() / scale
    }
}

/// Price interval believed to contain a market's clearing price.
#[derive(Debug, Clone)]
struct Bracket {
    key: MarketKey,
    low: f64,
    high: f64,
}

/// Prices of `keys` in `period`, in key order.
fn prices(marketplace: &Marketplace, keys: &[MarketKey], period: usize) -> Vec<f64> {
    keys.iter()
        .map(|key| marketplace.price(key, period).unwrap_or(1.0))
        .collect()
}

fn set_prices(marketplace: &mut Marketplace, keys: &[MarketKey], period: usize, prices: &[f64]) {
    for (key, price) in keys.iter().zip(prices) {
        marketplace.set_price(key, period, *price);
    }
}

/// Excess demand over the mean of supply and demand. Unlike
/// [`relative_excess`] it keeps its sign and is smooth through zero.
fn scaled_excess(record: &MarketRecord) -> f64 {
    let mean = (record.demand.abs() + record.supply.abs()) * 0.5;
    if mean < f64::EPSILON {
        0.0
    } else {
        record.excess_demand() / mean
    }
}

fn residuals(marketplace: &Marketplace, keys: &[MarketKey], period: usize) -> Vec<f64> {
    keys.iter()
        .map(|key| {
            marketplace
                .record(key, period)
                .map_or(0.0, |record| scaled_excess(&record))
        })
        .collect()
}

fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// State of one `solve` call: the markets being cleared, the evaluation
/// count, and the lowest-excess price vector seen so far.
#[derive(Debug)]
struct Progress<'k> {
    keys: &'k [MarketKey],
    period: usize,
    iterations: u32,
    best_prices: Vec<f64>,
    best_excess: f64,
}

impl Progress<'_> {
    fn evaluate(&mut self, marketplace: &mut Marketplace, world: &mut dyn WorldCalc) {
        evaluate(marketplace, world, self.period);
        self.iterations = self.iterations.saturating_add(1);
    }

    fn prices(&self, marketplace: &Marketplace) -> Vec<f64> {
        prices(marketplace, self.keys, self.period)
    }

    fn residuals(&self, marketplace: &Marketplace) -> Vec<f64> {
        residuals(marketplace, self.keys, self.period)
    }

    fn max_excess(&self, marketplace: &Marketplace) -> f64 {
        self.keys
            .iter()
            .filter_map(|key| marketplace.record(key, self.period))
            .map(|record| relative_excess(&record))
            .fold(0.0, f64::max)
    }

    /// Remember the current prices if they beat the best point.
    fn offer(&mut self, marketplace: &Marketplace) -> f64 {
        let excess = self.max_excess(marketplace);
        if excess < self.best_excess {
            self.best_prices = self.prices(marketplace);
            self.best_excess = excess;
        }
        excess
    }
}

/// Bisection to get close, then Newton-Raphson to finish.
///
/// Each market's price is first bracketed around its starting value by
/// doubling/halving, then all brackets are bisected together, re-running
/// the world after every step, until the worst market is within
/// `newton_threshold` or half of `max_iterations` is spent. A bracket that
/// collapses without clearing is widened around its last midpoint.
///
/// Goods are coupled through the world, so simultaneous bisection alone can
/// cycle (a calibration market and the good it scales both follow the same
/// output). The Newton stage works on log prices with a finite-difference
/// Jacobian of the scaled excess demands, and backtracks any step that does
/// not reduce the residual. The best point seen is restored if the solve
/// stops short.
#[derive(Debug, Clone, PartialEq)]
pub struct BisectNewtonSolver {
    tolerance: f64,
    newton_threshold: f64,
    max_iterations: u32,
    max_bracket_steps: u32,
}

impl BisectNewtonSolver {
    /// Build a solver from configuration.
    pub const fn new(config: &SolverConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            newton_threshold: config.newton_threshold,
            max_iterations: config.max_iterations,
            max_bracket_steps: config.max_bracket_steps,
        }
    }

    fn initial_brackets(
        marketplace: &Marketplace,
        keys: &[MarketKey],
        period: usize,
    ) -> Vec<Bracket> {
        keys.iter()
            .filter_map(|key| {
                let record = marketplace.record(key, period)?;
                let start = if record.price > MIN_START_PRICE {
                    record.price
                } else {
                    1.0
                };
                let (low, high) = if record.excess_demand() > 0.0 {
                    (start, start * 2.0)
                } else {
                    (start / 2.0, start)
                };
                Some(Bracket {
                    key: key.clone(),
                    low,
                    high,
                })
            })
            .collect()
    }

    /// Widen brackets until every market has excess demand at its low end
    /// and excess supply at its high end (or the step budget runs out).
    fn expand_brackets(
        &self,
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        progress: &mut Progress<'_>,
        brackets: &mut [Bracket],
    ) {
        let period = progress.period;
        for step in 0..self.max_bracket_steps {
            for bracket in brackets.iter() {
                marketplace.set_price(&bracket.key, period, bracket.high);
            }
            progress.evaluate(marketplace, world);
            let mut widened = false;
            for bracket in brackets.iter_mut() {
                if marketplace.excess_demand(&bracket.key, period).unwrap_or(0.0) > 0.0 {
                    bracket.low = bracket.high;
                    bracket.high *= 2.0;
                    widened = true;
                }
            }

            for bracket in brackets.iter() {
                marketplace.set_price(&bracket.key, period, bracket.low);
            }
            progress.evaluate(marketplace, world);
            for bracket in brackets.iter_mut() {
                if marketplace.excess_demand(&bracket.key, period).unwrap_or(0.0) < 0.0 {
                    bracket.high = bracket.low;
                    bracket.low /= 2.0;
                    widened = true;
                }
            }

            if !widened {
                debug!(period, steps = step, "Markets bracketed");
                return;
            }
        }
        debug!(period, "Bracket step budget exhausted");
    }

    /// Bisect every bracket together for at most `steps` steps. Returns the
    /// number of steps taken.
    fn bisect(
        &self,
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        progress: &mut Progress<'_>,
        steps: u32,
    ) -> u32 {
        let period = progress.period;
        let mut brackets = Self::initial_brackets(marketplace, progress.keys, period);
        self.expand_brackets(marketplace, world, progress, &mut brackets);

        let switch_at = self.tolerance.max(self.newton_threshold);
        let mut taken: u32 = 0;
        while taken < steps {
            taken = taken.saturating_add(1);
            for bracket in &brackets {
                let mid = (bracket.low + bracket.high) * 0.5;
                marketplace.set_price(&bracket.key, period, mid);
            }
            progress.evaluate(marketplace, world);

            let excess = progress.offer(marketplace);
            debug!(
                period,
                iterations = progress.iterations,
                max_relative_excess = excess,
                "Bisection step"
            );
            if excess <= switch_at {
                break;
            }

            for bracket in &mut brackets {
                let mid = (bracket.low + bracket.high) * 0.5;
                let Some(record) = marketplace.record(&bracket.key, period) else {
                    continue;
                };
                if record.excess_demand() > 0.0 {
                    bracket.low = mid;
                } else {
                    bracket.high = mid;
                }
                // Coupled markets move each other's roots; a bracket that
                // has collapsed without clearing no longer holds its root.
                let collapsed = bracket.high - bracket.low
                    <= bracket.high * self.tolerance * COLLAPSE_FRACTION;
                if collapsed && relative_excess(&record) > self.tolerance {
                    debug!(period, market = %bracket.key, price = mid, "Re-bracketing drifted market");
                    bracket.low = mid * 0.5;
                    bracket.high = mid * 2.0;
                }
            }
        }
        taken
    }

    /// Newton direction in log-price space at `base`, whose residuals are
    /// `residual`. Leaves the prices at `base` with stale registers.
    fn newton_direction(
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        progress: &mut Progress<'_>,
        base: &[f64],
        residual: &[f64],
    ) -> Option<Vec<f64>> {
        let keys = progress.keys;
        let n = keys.len();
        let mut columns = Vec::with_capacity(n.saturating_mul(n));
        for (key, price) in keys.iter().zip(base) {
            marketplace.set_price(key, progress.period, price * JACOBIAN_LOG_STEP.exp());
            progress.evaluate(marketplace, world);
            let shifted = progress.residuals(marketplace);
            columns.extend(
                shifted
                    .iter()
                    .zip(residual)
                    .map(|(s, r)| (s - r) / JACOBIAN_LOG_STEP),
            );
            marketplace.set_price(key, progress.period, *price);
        }

        let mut jacobian = DMatrix::from_vec(n, n, columns);
        // A market idle under every nudge has a zero row; hold its price.
        let idle: Vec<usize> = (0..n)
            .filter(|&i| jacobian.row(i).iter().all(|v| v.abs() < f64::EPSILON))
            .collect();
        for i in idle {
            if let Some(diagonal) = jacobian.get_mut((i, i)) {
                *diagonal = 1.0;
            }
        }
        let rhs = DVector::from_iterator(n, residual.iter().map(|r| -r));
        jacobian
            .lu()
            .solve(&rhs)
            .map(|step| step.iter().copied().collect::<Vec<f64>>())
            .filter(|step| step.iter().all(|d| d.is_finite()))
    }

    /// Newton-Raphson from the best point for at most `steps` steps.
    /// Returns whether the markets cleared; when they did, the registers
    /// hold the evaluation at the final prices.
    fn newton(
        &self,
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        progress: &mut Progress<'_>,
        steps: u32,
    ) -> bool {
        let period = progress.period;
        set_prices(marketplace, progress.keys, period, &progress.best_prices);
        progress.evaluate(marketplace, world);

        for _ in 0..steps {
            let base = progress.prices(marketplace);
            let residual = progress.residuals(marketplace);
            let excess = progress.offer(marketplace);
            debug!(
                period,
                iterations = progress.iterations,
                max_relative_excess = excess,
                "Newton step"
            );
            if excess <= self.tolerance {
                return true;
            }

            let Some(direction) =
                Self::newton_direction(marketplace, world, progress, &base, &residual)
            else {
                debug!(period, "Singular Jacobian, stopping Newton stage");
                return false;
            };

            let norm = sum_of_squares(&residual);
            let mut damping = 1.0;
            let mut accepted = false;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let trial: Vec<f64> = base
                    .iter()
                    .zip(&direction)
                    .map(|(price, d)| {
                        price * (damping * d).clamp(-MAX_LOG_STEP, MAX_LOG_STEP).exp()
                    })
                    .collect();
                set_prices(marketplace, progress.keys, period, &trial);
                progress.evaluate(marketplace, world);
                if sum_of_squares(&progress.residuals(marketplace)) < norm {
                    accepted = true;
                    break;
                }
                damping *= 0.5;
            }
            if !accepted {
                debug!(period, "Line search failed, stopping Newton stage");
                return false;
            }
        }

        progress.offer(marketplace) <= self.tolerance
    }
}

impl MarketSolver for BisectNewtonSolver {
    fn solve(
        &mut self,
        marketplace: &mut Marketplace,
        world: &mut dyn WorldCalc,
        period: usize,
    ) -> SolveReport {
        let keys = marketplace.solvable_keys(period);
        let mut progress = Progress {
            keys: &keys,
            period,
            iterations: 0,
            best_prices: Vec::new(),
            best_excess: f64::INFINITY,
        };
        progress.evaluate(marketplace, world);

        let start_excess = progress.offer(marketplace);
        if keys.is_empty() || start_excess <= self.tolerance {
            debug!(period, markets = keys.len(), "Markets already in equilibrium");
            return SolveReport {
                period,
                converged: true,
                iterations: progress.iterations,
                max_relative_excess: start_excess,
            };
        }

        let taken = self.bisect(
            marketplace,
            world,
            &mut progress,
            self.max_iterations.div_ceil(2),
        );
        let mut converged = progress.best_excess <= self.tolerance;
        if !converged {
            let newton_steps = self.max_iterations.saturating_sub(taken);
            converged = self.newton(marketplace, world, &mut progress, newton_steps);
        }

        // Leave the registers holding one evaluation at the best prices.
        if !converged {
            set_prices(marketplace, &keys, period, &progress.best_prices);
            progress.evaluate(marketplace, world);
        }
        let iterations = progress.iterations;
        let max_excess = progress.max_excess(marketplace);

        if converged {
            info!(period, iterations, "Markets solved");
        } else {
            warn!(
                period,
                iterations,
                max_relative_excess = max_excess,
                tolerance = self.tolerance,
                "Markets did not converge"
            );
        }

        SolveReport {
            period,
            converged,
            iterations,
            max_relative_excess: max_excess,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::market::MarketKind;

    /// Demand `a - p`, supply `b * p` on a single market.
    struct LinearWorld {
        key: MarketKey,
        intercept: f64,
        slope: f64,
        calls: u32,
    }

    impl WorldCalc for LinearWorld {
        fn calc(&mut self, marketplace: &mut Marketplace, period: usize) {
            self.calls = self.calls.saturating_add(1);
            let price = marketplace.price(&self.key, period).unwrap();
            marketplace.add_to_demand(&self.key, period, (self.intercept - price).max(0.0));
            marketplace.add_to_supply(&self.key, period, self.slope * price);
        }
    }

    fn config() -> SolverConfig {
        SolverConfig {
            tolerance: 1e-6,
            newton_threshold: 0.05,
            max_iterations: 200,
            max_bracket_steps: 40,
        }
    }

    fn setup(initial_price: f64) -> (Marketplace, LinearWorld) {
        let key = MarketKey::new("global", "wheat");
        let mut marketplace = Marketplace::new(2);
        marketplace.create_market(key.clone(), MarketKind::Normal, initial_price);
        marketplace.init_prices();
        let world = LinearWorld {
            key,
            intercept: 10.0,
            slope: 1.0,
            calls: 0,
        };
        (marketplace, world)
    }

    #[test]
    fn finds_linear_equilibrium_from_below() {
        let (mut marketplace, mut world) = setup(0.5);
        let mut solver = BisectNewtonSolver::new(&config());
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(report.converged);
        let price = marketplace.price(&world.key, 1).unwrap();
        assert!((price - 5.0).abs() < 1e-4, "price {price}");
    }

    #[test]
    fn finds_linear_equilibrium_from_above() {
        let (mut marketplace, mut world) = setup(400.0);
        let mut solver = BisectNewtonSolver::new(&config());
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(report.converged);
        let price = marketplace.price(&world.key, 1).unwrap();
        assert!((price - 5.0).abs() < 1e-4, "price {price}");
    }

    #[test]
    fn registers_match_final_prices() {
        let (mut marketplace, mut world) = setup(2.0);
        let mut solver = BisectNewtonSolver::new(&config());
        let _ = solver.solve(&mut marketplace, &mut world, 1);
        let record = marketplace.record(&world.key, 1).unwrap();
        assert!((record.supply - record.price).abs() < 1e-12);
        assert!((record.demand - (10.0 - record.price)).abs() < 1e-12);
    }

    #[test]
    fn unsolvable_market_keeps_its_price() {
        let (mut marketplace, mut world) = setup(2.0);
        marketplace.set_solvable(&world.key, 1, false);
        let mut solver = BisectNewtonSolver::new(&config());
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(report.converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(world.calls, 1);
        assert!((marketplace.price(&world.key, 1).unwrap() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let (mut marketplace, mut world) = setup(0.5);
        let mut solver = BisectNewtonSolver::new(&SolverConfig {
            tolerance: 1e-12,
            newton_threshold: 0.05,
            max_iterations: 2,
            max_bracket_steps: 1,
        });
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(!report.converged);
        assert!(report.max_relative_excess > 1e-12);
    }

    /// Market A: demand `10 - a`, supply `a`. Market B: demand half of A's
    /// supply, supply `b`.
    struct CoupledWorld {
        a: MarketKey,
        b: MarketKey,
    }

    impl WorldCalc for CoupledWorld {
        fn calc(&mut self, marketplace: &mut Marketplace, period: usize) {
            let a = marketplace.price(&self.a, period).unwrap();
            let b = marketplace.price(&self.b, period).unwrap();
            marketplace.add_to_demand(&self.a, period, (10.0 - a).max(0.0));
            marketplace.add_to_supply(&self.a, period, a);
            marketplace.add_to_demand(&self.b, period, 0.5 * a);
            marketplace.add_to_supply(&self.b, period, b);
        }
    }

    #[test]
    fn coupled_markets_converge() {
        let a = MarketKey::new("global", "a");
        let b = MarketKey::new("global", "b");
        let mut marketplace = Marketplace::new(2);
        marketplace.create_market(a.clone(), MarketKind::Normal, 1.0);
        marketplace.create_market(b.clone(), MarketKind::Normal, 4.0);
        marketplace.init_prices();
        let mut world = CoupledWorld { a, b };

        let mut solver = BisectNewtonSolver::new(&SolverConfig {
            tolerance: 1e-4,
            newton_threshold: 0.05,
            max_iterations: 500,
            max_bracket_steps: 40,
        });
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(report.converged, "{report:?}");
        let price_a = marketplace.price(&world.a, 1).unwrap();
        let price_b = marketplace.price(&world.b, 1).unwrap();
        assert!((price_a - 5.0).abs() < 1e-2, "a {price_a}");
        assert!((price_b - 2.5).abs() < 1e-2, "b {price_b}");
    }

    /// A good whose output is scaled by a calibration market: both markets
    /// see the same output, `scale * 10 * (price / 2) ^ 1.5`. The good's
    /// demand is `80 * (price / 4) ^ -0.5`; the calibration target is 80.
    struct CalibratedWorld {
        good: MarketKey,
        calibration: MarketKey,
    }

    impl WorldCalc for CalibratedWorld {
        fn calc(&mut self, marketplace: &mut Marketplace, period: usize) {
            let price = marketplace.price(&self.good, period).unwrap();
            let scale = marketplace.price(&self.calibration, period).unwrap();
            let output = scale * 10.0 * (price / 2.0).powf(1.5);
            marketplace.add_to_demand(&self.good, period, 80.0 * (price / 4.0).powf(-0.5));
            marketplace.add_to_supply(&self.good, period, output);
            marketplace.add_to_demand(&self.calibration, period, 80.0);
            marketplace.add_to_supply(&self.calibration, period, output);
        }
    }

    #[test]
    fn calibration_scale_and_its_good_clear_together() {
        let good = MarketKey::new("usa", "electricity");
        let calibration = MarketKey::new("usa", "electricity-calibration");
        let mut marketplace = Marketplace::new(2);
        marketplace.create_market(good.clone(), MarketKind::Normal, 5.0);
        marketplace.create_market(calibration.clone(), MarketKind::Calibration, 1.0);
        marketplace.init_prices();
        let mut world = CalibratedWorld { good, calibration };

        let mut solver = BisectNewtonSolver::new(&SolverConfig {
            tolerance: 1e-4,
            newton_threshold: 0.05,
            max_iterations: 400,
            max_bracket_steps: 30,
        });
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(report.converged, "{report:?}");
        assert!(report.max_relative_excess <= 1e-4);

        let price = marketplace.price(&world.good, 1).unwrap();
        let scale = marketplace.price(&world.calibration, 1).unwrap();
        assert!((price - 4.0).abs() < 1e-2, "price {price}");
        assert!((scale - 80.0 / (10.0 * 2.0_f64.powf(1.5))).abs() < 1e-2, "scale {scale}");

        let record = marketplace.record(&world.calibration, 1).unwrap();
        assert!(relative_excess(&record) <= 1e-4, "{record:?}");
    }

    #[test]
    fn stopping_short_restores_the_best_point() {
        let good = MarketKey::new("usa", "electricity");
        let calibration = MarketKey::new("usa", "electricity-calibration");
        let mut marketplace = Marketplace::new(2);
        marketplace.create_market(good.clone(), MarketKind::Normal, 5.0);
        marketplace.create_market(calibration.clone(), MarketKind::Calibration, 1.0);
        marketplace.init_prices();
        let mut world = CalibratedWorld { good, calibration };

        let mut solver = BisectNewtonSolver::new(&SolverConfig {
            tolerance: 1e-15,
            newton_threshold: 0.05,
            max_iterations: 2,
            max_bracket_steps: 30,
        });
        let report = solver.solve(&mut marketplace, &mut world, 1);
        assert!(!report.converged);

        // Registers hold one evaluation at the final prices.
        let price = marketplace.price(&world.good, 1).unwrap();
        let scale = marketplace.price(&world.calibration, 1).unwrap();
        let record = marketplace.record(&world.calibration, 1).unwrap();
        let output = scale * 10.0 * (price / 2.0).powf(1.5);
        assert!((record.supply - output).abs() < 1e-9);
        let worst = [&world.good, &world.calibration]
            .iter()
            .map(|key| relative_excess(&marketplace.record(key, 1).unwrap()))
            .fold(0.0, f64::max);
        assert!((report.max_relative_excess - worst).abs() < 1e-12);
    }

    #[test]
    fn relative_excess_of_idle_market_is_zero() {
        assert!(relative_excess(&MarketRecord::default()).abs() < f64::EPSILON);
    }
}
