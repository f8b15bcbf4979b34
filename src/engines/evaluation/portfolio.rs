use crate::{
    engines::risk::RiskFilter,
    types::{Action, Candle, ExitReason, Trade},
};

/// Long-only position simulator over normalized equity.
pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,

    // Drawdown tracking
    pub peak_equity: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    /// Set once drawdown reaches the limit; no further entries.
    pub halted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_bar: usize,
    pub entry_price: f64,
    /// Units held
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: vec![initial_capital],
            peak_equity: initial_capital,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
            halted: false,
        }
    }

    /// Advance one bar: stops first (never on the entry bar), then the
    /// genome's decision at the close, then mark-to-market and the drawdown
    /// halt.
    pub fn process_bar(&mut self, bar: usize, candle: &Candle, action: Action, confidence: f64, risk: &RiskFilter) {
        let stop_hit = self
            .position
            .as_ref()
            .filter(|pos| bar > pos.entry_bar)
            .and_then(|pos| risk.check_stops(pos.stop_loss, pos.take_profit, candle));
        if let Some((reason, price)) = stop_hit {
            self.close_position(bar, price, reason);
        }

        if !self.halted {
            match action {
                Action::Buy if self.position.is_none() => {
                    let fraction = risk.clip_position(confidence);
                    self.open_position(bar, candle.close, fraction, risk);
                }
                Action::Sell if self.position.is_some() => {
                    self.close_position(bar, candle.close, ExitReason::Signal);
                }
                _ => {}
            }
        }

        self.update_drawdown(candle.close);
        self.equity_curve.push(self.equity(candle.close));

        if !self.halted && risk.halts_trading(self.current_drawdown) {
            self.close_position(bar, candle.close, ExitReason::DrawdownLimit);
            self.halted = true;
        }
    }

    /// Commit `fraction` of current equity at `price`. Zero-sized entries
    /// are ignored.
    pub fn open_position(&mut self, bar: usize, price: f64, fraction: f64, risk: &RiskFilter) {
        if self.position.is_some() || fraction <= 0.0 || price <= 0.0 {
            return;
        }
        let size = self.equity(price) * fraction / price;
        let (stop_loss, take_profit) = risk.stop_levels(price);
        self.cash -= size * price;

        self.position = Some(Position {
            entry_bar: bar,
            entry_price: price,
            size,
            stop_loss,
            take_profit,
        });
    }

    pub fn close_position(&mut self, bar: usize, price: f64, reason: ExitReason) {
        if let Some(pos) = self.position.take() {
            let profit = (price - pos.entry_price) * pos.size;
            self.cash += price * pos.size;

            self.trades.push(Trade {
                entry_bar: pos.entry_bar,
                exit_bar: bar,
                entry_price: pos.entry_price,
                exit_price: price,
                size: pos.size,
                profit,
                exit_reason: reason,
            });
        }
    }

    /// Close whatever is still open at the final bar.
    pub fn finish(&mut self, bar: usize, price: f64) {
        self.close_position(bar, price, ExitReason::EndOfData);
    }

    pub fn get_trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn get_equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }

    /// Cash plus the open position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |pos| pos.size * price)
    }

    pub fn update_drawdown(&mut self, price: f64) {
        let current_equity = self.equity(price);

        if current_equity > self.peak_equity {
            self.peak_equity = current_equity;
        }

        if self.peak_equity > 0.0 {
            self.current_drawdown = (self.peak_equity - current_equity) / self.peak_equity;

            if self.current_drawdown > self.max_drawdown {
                self.max_drawdown = self.current_drawdown;
            }
        }
    }
}
