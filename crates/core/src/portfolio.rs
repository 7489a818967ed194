//! Cash and open-position ledger owned by the cycle orchestrator.
//!
//! A SELL closes every open position at the sell price, regardless of the
//! quantity sold. The ledger carries no shorts.

use crate::events::TradeSide;
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_price: Decimal,
}

impl Position {
    #[allow(clippy::missing_const_for_fn)] // String cannot be used in const fn
    fn new(symbol: String, quantity: Decimal, avg_price: Decimal) -> Self {
        Self {
            symbol,
            quantity,
            avg_price,
        }
    }

    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.avg_price
    }
}

/// Outcome of applying a trade to the portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeEffect {
    /// A long was opened or increased.
    Opened,
    /// Every open position was closed with this realized `PnL`.
    Closed { realized_pnl: Decimal, positions_closed: usize },
    /// A SELL arrived with nothing open; only cash moved.
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    cash: Decimal,
    positions: HashMap<String, Position>,
    max_open_positions: usize,
}

impl Portfolio {
    #[must_use]
    pub fn new(cash: Decimal, max_open_positions: usize) -> Self {
        Self {
            cash,
            positions: HashMap::new(),
            max_open_positions,
        }
    }

    /// Applies a recorded trade.
    ///
    /// # Errors
    /// Returns an error, leaving the portfolio untouched, if the price or
    /// quantity is not positive, a BUY costs more than available cash, or a
    /// BUY would open a position beyond the configured limit.
    pub fn apply(
        &mut self,
        side: TradeSide,
        symbol: &str,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<TradeEffect> {
        if price <= Decimal::ZERO || quantity <= Decimal::ZERO {
            anyhow::bail!("price and quantity must be positive (price={price}, quantity={quantity})");
        }
        let notional = price * quantity;

        match side {
            TradeSide::Buy => {
                if notional > self.cash {
                    anyhow::bail!("insufficient cash: need {notional}, have {}", self.cash);
                }
                if !self.positions.contains_key(symbol)
                    && self.positions.len() >= self.max_open_positions
                {
                    anyhow::bail!(
                        "open position limit reached ({} of {})",
                        self.positions.len(),
                        self.max_open_positions
                    );
                }

                self.cash -= notional;
                match self.positions.get_mut(symbol) {
                    Some(pos) => {
                        let total_cost = pos.cost_basis() + notional;
                        pos.quantity += quantity;
                        pos.avg_price = total_cost / pos.quantity;
                    }
                    None => {
                        self.positions.insert(
                            symbol.to_string(),
                            Position::new(symbol.to_string(), quantity, price),
                        );
                    }
                }
                Ok(TradeEffect::Opened)
            }
            TradeSide::Sell => {
                self.cash += notional;
                if self.positions.is_empty() {
                    return Ok(TradeEffect::Flat);
                }

                let realized_pnl = self
                    .positions
                    .values()
                    .map(|pos| (price - pos.avg_price) * pos.quantity)
                    .sum();
                let positions_closed = self.positions.len();
                self.positions.clear();
                Ok(TradeEffect::Closed {
                    realized_pnl,
                    positions_closed,
                })
            }
        }
    }

    #[must_use]
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    #[must_use]
    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    #[must_use]
    pub const fn all_positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    #[must_use]
    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Cash plus open positions marked at `marks`, falling back to average cost.
    #[must_use]
    pub fn equity(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|pos| marks.get(&pos.symbol).copied().unwrap_or(pos.avg_price) * pos.quantity)
                .sum::<Decimal>()
    }
}
