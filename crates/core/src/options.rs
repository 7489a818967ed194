//! Options-chain domain types shared by the analytics pipeline and the
//! market-data collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contract kind of a listed option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }

    /// Parses from string representation (accepts `C`/`P` shorthands).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" | "c" => Some(Self::Call),
            "put" | "p" => Some(Self::Put),
            _ => None,
        }
    }
}

/// Option greeks as quoted by the venue. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub vega: Option<f64>,
}

/// A single quoted option contract within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub kind: OptionKind,
    /// Implied volatility as a decimal fraction (0.65 = 65%).
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub greeks: Greeks,
    #[serde(default)]
    pub last_price: Option<f64>,
}

impl OptionContract {
    /// Creates a contract with only strike, kind and IV populated.
    #[must_use]
    pub fn new(strike: f64, kind: OptionKind, implied_volatility: Option<f64>) -> Self {
        Self {
            strike,
            kind,
            implied_volatility,
            open_interest: None,
            volume: None,
            greeks: Greeks::default(),
            last_price: None,
        }
    }

    #[must_use]
    pub fn call(strike: f64, iv: f64) -> Self {
        Self::new(strike, OptionKind::Call, Some(iv))
    }

    #[must_use]
    pub fn put(strike: f64, iv: f64) -> Self {
        Self::new(strike, OptionKind::Put, Some(iv))
    }

    #[must_use]
    pub const fn with_greeks(mut self, greeks: Greeks) -> Self {
        self.greeks = greeks;
        self
    }

    #[must_use]
    pub const fn with_open_interest(mut self, open_interest: f64) -> Self {
        self.open_interest = Some(open_interest);
        self
    }

    /// Returns the implied volatility only when it is usable for analysis.
    ///
    /// Missing, non-positive and non-finite values are treated as absent.
    #[must_use]
    pub fn valid_iv(&self) -> Option<f64> {
        self.implied_volatility
            .filter(|iv| iv.is_finite() && *iv > 0.0)
    }
}

/// Point-in-time options chain for one `(symbol, expiry)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsChainSnapshot {
    pub symbol: String,
    pub spot_price: f64,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub contracts: Vec<OptionContract>,
}

impl OptionsChainSnapshot {
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        spot_price: f64,
        expiry: DateTime<Utc>,
        contracts: Vec<OptionContract>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            spot_price,
            expiry,
            contracts,
        }
    }

    /// Number of contracts carrying a usable implied volatility.
    #[must_use]
    pub fn valid_iv_count(&self) -> usize {
        self.contracts.iter().filter(|c| c.valid_iv().is_some()).count()
    }

    /// Expiry rendered as `YYYY-MM-DD`, used as a feature-key prefix.
    #[must_use]
    pub fn expiry_label(&self) -> String {
        self.expiry.format("%Y-%m-%d").to_string()
    }
}
