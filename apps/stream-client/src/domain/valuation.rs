//! Portfolio Valuation
//!
//! Combines a price-cache snapshot with a caller-supplied holding list
//! into consistent portfolio totals. Valuations are derived values,
//! recomputed on demand and never stored.
//!
//! Holdings whose symbol has no cached price are excluded from every
//! total and listed in [`Valuation::missing_prices`]; totals never
//! silently average over gaps.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::Quote;

/// One hundred, for percent arithmetic.
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Inputs
// =============================================================================

/// A position supplied by the caller. Read-only to the streaming core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol.
    pub symbol: String,
    /// Number of units held.
    pub quantity: Decimal,
    /// Acquisition cost per unit, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Decimal>,
}

impl Holding {
    /// Create a holding without a cost basis.
    #[must_use]
    pub fn new(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            cost_basis: None,
        }
    }

    /// Attach a per-unit cost basis.
    #[must_use]
    pub const fn with_cost_basis(mut self, cost_basis: Decimal) -> Self {
        self.cost_basis = Some(cost_basis);
        self
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Valuation of a single priced holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingValuation {
    /// Ticker symbol.
    pub symbol: String,
    /// Units held.
    pub quantity: Decimal,
    /// Price used for the valuation.
    pub price: Decimal,
    /// `price * quantity`.
    pub current_value: Decimal,
    /// `cost_basis * quantity`, when a cost basis was supplied.
    pub total_cost: Option<Decimal>,
    /// Gain or loss against cost; zero when no cost basis was supplied.
    pub gain_loss: Decimal,
    /// Gain or loss as a percentage of cost; zero when the cost is zero
    /// or unknown.
    pub gain_loss_percent: Decimal,
}

/// Portfolio-level totals derived from cache snapshot x holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valuation {
    /// Sum of `current_value` over priced holdings.
    pub total_value: Decimal,
    /// Sum of `total_cost` over priced holdings with a cost basis.
    pub total_cost_basis: Decimal,
    /// Sum of per-holding gains.
    pub total_gain_loss: Decimal,
    /// Total gain as a percentage of total cost basis; zero when the
    /// denominator is zero.
    pub total_gain_loss_percent: Decimal,
    /// Per-holding breakdown, in input order.
    pub per_holding: Vec<HoldingValuation>,
    /// Symbols excluded from totals for lack of a cached price, in
    /// input order.
    pub missing_prices: Vec<String>,
}

impl Valuation {
    /// Whether every holding had a price.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_prices.is_empty()
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Compute a valuation from an immutable price snapshot.
///
/// Pure and synchronous: the snapshot is taken once by the caller, so a
/// concurrently mutating cache cannot produce a torn valuation.
#[must_use]
pub fn compute_valuation(prices: &HashMap<String, Quote>, holdings: &[Holding]) -> Valuation {
    let mut total_value = Decimal::ZERO;
    let mut total_cost_basis = Decimal::ZERO;
    let mut total_gain_loss = Decimal::ZERO;
    let mut per_holding = Vec::with_capacity(holdings.len());
    let mut missing_prices = Vec::new();

    for holding in holdings {
        let Some(quote) = prices.get(&holding.symbol) else {
            missing_prices.push(holding.symbol.clone());
            continue;
        };

        let current_value = quote.price * holding.quantity;
        let total_cost = holding.cost_basis.map(|basis| basis * holding.quantity);
        let gain_loss = total_cost.map_or(Decimal::ZERO, |cost| current_value - cost);
        let gain_loss_percent = total_cost
            .filter(|cost| !cost.is_zero())
            .map_or(Decimal::ZERO, |cost| gain_loss / cost * HUNDRED);

        total_value += current_value;
        if let Some(cost) = total_cost {
            total_cost_basis += cost;
        }
        total_gain_loss += gain_loss;

        per_holding.push(HoldingValuation {
            symbol: holding.symbol.clone(),
            quantity: holding.quantity,
            price: quote.price,
            current_value,
            total_cost,
            gain_loss,
            gain_loss_percent,
        });
    }

    let total_gain_loss_percent = if total_cost_basis.is_zero() {
        Decimal::ZERO
    } else {
        total_gain_loss / total_cost_basis * HUNDRED
    };

    Valuation {
        total_value,
        total_cost_basis,
        total_gain_loss,
        total_gain_loss_percent,
        per_holding,
        missing_prices,
    }
}
