use serde::{Deserialize, Serialize};

use crate::{
    engines::evaluation::Portfolio,
    engines::generation::StrategyGenome,
    engines::metrics::{ProfitabilityMetrics, RiskMetrics},
    engines::risk::RiskFilter,
    error::{EvolverError, Result},
    types::{Candle, Trade},
};

/// Normalized starting equity of every simulation.
pub const INITIAL_EQUITY: f64 = 1.0;

/// Outcome of evaluating one genome over one window. A pure function of the
/// two; never modified once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    /// Risk-adjusted return, penalized when drawdown breaks the limit
    pub score: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub total_return: f64,
}

/// Full simulation output, for inspection beyond the score.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub record: FitnessRecord,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
}

/// Deterministic backtest of a genome. Holds only the read-only risk
/// envelope, so one evaluator can be shared across worker threads.
#[derive(Debug, Clone, Default)]
pub struct FitnessEvaluator {
    risk: RiskFilter,
}

impl FitnessEvaluator {
    pub fn new(risk: RiskFilter) -> Self {
        Self { risk }
    }

    pub fn risk(&self) -> &RiskFilter {
        &self.risk
    }

    pub fn evaluate(&self, genome: &StrategyGenome, window: &[Candle]) -> Result<FitnessRecord> {
        self.run(genome, window).map(|result| result.record)
    }

    pub fn run(&self, genome: &StrategyGenome, window: &[Candle]) -> Result<BacktestResult> {
        let required = genome.lookback();
        if window.len() < required {
            return Err(EvolverError::InsufficientData {
                required,
                available: window.len(),
            });
        }

        let decisions = genome.decisions(window);
        let mut portfolio = Portfolio::new(INITIAL_EQUITY);

        for (bar, (candle, &(action, confidence))) in window.iter().zip(&decisions).enumerate() {
            portfolio.process_bar(bar, candle, action, confidence, &self.risk);
        }
        if let Some(last) = window.last() {
            portfolio.finish(window.len() - 1, last.close);
        }

        let record = self.score(&portfolio);
        Ok(BacktestResult {
            record,
            trades: portfolio.get_trades().to_vec(),
            equity_curve: portfolio.get_equity_curve().to_vec(),
        })
    }

    fn score(&self, portfolio: &Portfolio) -> FitnessRecord {
        let trades = portfolio.get_trades();
        let equity = portfolio.get_equity_curve();
        let max_drawdown = RiskMetrics::max_drawdown(equity);

        let raw = if trades.is_empty() {
            0.0
        } else {
            RiskMetrics::risk_adjusted_return(&RiskMetrics::returns(equity))
        };

        FitnessRecord {
            score: self.risk.penalize(raw, max_drawdown),
            max_drawdown,
            win_rate: ProfitabilityMetrics::win_rate(trades),
            trade_count: trades.len(),
            total_return: ProfitabilityMetrics::total_return(equity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::engines::generation::{Aggregation, Comparison, Gene};
    use crate::functions::indicators::Indicator;
    use crate::types::ExitReason;
    use chrono::{TimeZone, Utc};

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(), c, c * 1.001, c * 0.999, c, 10.0))
            .collect()
    }

    /// Buys after any up bar, sells after any down bar.
    fn momentum_genome() -> StrategyGenome {
        let up = Gene::new(Indicator::RateOfChange { period: 1 }, Comparison::GreaterThan, 0.0, 1.0).unwrap();
        let down = Gene::new(Indicator::RateOfChange { period: 1 }, Comparison::LessThan, 0.0, -1.0).unwrap();
        StrategyGenome::new(vec![up, down], Aggregation::WeightedVote { threshold: 0.4 }, 4).unwrap()
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 3.0 + i as f64 * 0.05).collect();
        let window = series(&closes);
        let evaluator = FitnessEvaluator::default();
        let genome = momentum_genome();

        let first = evaluator.evaluate(&genome, &window).unwrap();
        for _ in 0..5 {
            let again = evaluator.evaluate(&genome, &window).unwrap();
            assert_eq!(again, first);
            assert_eq!(again.score.to_bits(), first.score.to_bits());
        }
        assert!(first.trade_count > 0);
    }

    #[test]
    fn test_short_window_is_insufficient_data() {
        let genome = StrategyGenome::new(
            vec![Gene::new(Indicator::PriceToSma { period: 50 }, Comparison::GreaterThan, 0.0, 0.5).unwrap()],
            Aggregation::Majority,
            3,
        )
        .unwrap();
        let window = series(&[100.0; 10]);
        let err = FitnessEvaluator::default().evaluate(&genome, &window).unwrap_err();
        assert!(matches!(err, EvolverError::InsufficientData { required: 50, available: 10 }));
    }

    #[test]
    fn test_no_trades_scores_zero() {
        let window = series(&[100.0; 30]);
        let record = FitnessEvaluator::default().evaluate(&momentum_genome(), &window).unwrap();
        assert_eq!(record.trade_count, 0);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.max_drawdown, 0.0);
    }

    #[test]
    fn test_rising_market_rewards_momentum() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 * 1.002f64.powi(i)).collect();
        let result = FitnessEvaluator::default().run(&momentum_genome(), &series(&closes)).unwrap();
        assert!(result.record.score > 0.0);
        assert!(result.record.total_return > 0.0);
        assert_eq!(result.equity_curve.len(), closes.len() + 1);
        assert!(result.trades.iter().all(|t| t.exit_reason != ExitReason::StopLoss));
    }

    #[test]
    fn test_drawdown_breach_is_penalized_not_excluded() {
        let mut closes: Vec<f64> = vec![100.0, 101.0];
        closes.extend((0..20).map(|i| 101.0 - i as f64));
        let risk = RiskFilter::new(RiskConfig {
            max_position_size: 1.0,
            max_drawdown: 0.001,
            stop_loss_pct: 0.5,
            take_profit_pct: 0.5,
        })
        .unwrap();
        let record = FitnessEvaluator::new(risk).evaluate(&momentum_genome(), &series(&closes)).unwrap();
        assert!(record.max_drawdown > 0.001);
        assert!(record.score < -1.0e5);
    }
}
