//! Market-data provider boundary
//!
//! The crate never talks to a network itself. A [`MarketData`] implementation
//! supplies raw price tables; [`Universe`] maps base tickers to the symbols
//! that provider expects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::series::RawTable;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Provider error: {0}")]
    Other(String),
}

/// How much history to request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    OneMonth,
    ThreeMonths,
    #[default]
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    Max,
}

impl HistoryPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryPeriod::OneMonth => "1mo",
            HistoryPeriod::ThreeMonths => "3mo",
            HistoryPeriod::SixMonths => "6mo",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
            HistoryPeriod::Max => "max",
        }
    }
}

impl std::fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column layout of a bulk response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupBy {
    /// One table per symbol
    #[default]
    Ticker,
    /// Field-major columns, `(field, symbol)` labels
    Column,
}

/// Source of daily price history
pub trait MarketData: Send + Sync {
    /// Fetch every symbol in one call. Symbols without data map to empty
    /// tables; an error fails the whole batch.
    fn fetch_bars_bulk(
        &self,
        symbols: &[String],
        period: HistoryPeriod,
        group_by: GroupBy,
    ) -> Result<HashMap<String, RawTable>, ProviderError>;

    fn fetch_bars(&self, symbol: &str, period: HistoryPeriod) -> Result<RawTable, ProviderError>;
}

impl<T: MarketData + ?Sized> MarketData for std::sync::Arc<T> {
    fn fetch_bars_bulk(
        &self,
        symbols: &[String],
        period: HistoryPeriod,
        group_by: GroupBy,
    ) -> Result<HashMap<String, RawTable>, ProviderError> {
        (**self).fetch_bars_bulk(symbols, period, group_by)
    }

    fn fetch_bars(&self, symbol: &str, period: HistoryPeriod) -> Result<RawTable, ProviderError> {
        (**self).fetch_bars(symbol, period)
    }
}

// ============================================================
// UNIVERSE
// ============================================================

pub const JAKARTA_SUFFIX: &str = ".JK";

/// Jakarta Islamic Index constituents
pub const JAKARTA_ISLAMIC_30: [&str; 30] = [
    "ADRO", "AKRA", "ANTM", "BRIS", "BRPT", "CPIN", "EXCL", "HRUM", "ICBP", "INCO", "INDF", "INKP",
    "INTP", "ITMG", "KLBF", "MAPI", "MBMA", "MDKA", "MEDC", "PGAS", "PGEO", "PTBA", "SMGR", "TLKM",
    "UNTR", "UNVR", "ACES", "AMRT", "ASII", "TPIA",
];

/// Base tickers plus the exchange suffix the provider expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub tickers: Vec<String>,
    pub suffix: String,
}

impl Universe {
    pub fn new<I, S>(tickers: I, suffix: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            suffix: suffix.into(),
        }
    }

    pub fn jakarta_islamic_30() -> Self {
        Self::new(JAKARTA_ISLAMIC_30, JAKARTA_SUFFIX)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn provider_symbols(&self) -> Vec<String> {
        self.tickers
            .iter()
            .map(|t| format!("{t}{}", self.suffix))
            .collect()
    }

    /// Provider symbol with the suffix stripped
    pub fn base_ticker<'a>(&self, symbol: &'a str) -> &'a str {
        if self.suffix.is_empty() {
            return symbol;
        }
        symbol.strip_suffix(self.suffix.as_str()).unwrap_or(symbol)
    }

    /// Uppercase a user-entered ticker and append the suffix unless present
    pub fn resolve(&self, ticker: &str) -> String {
        let upper = ticker.trim().to_uppercase();
        if upper.ends_with(&self.suffix.to_uppercase()) {
            upper
        } else {
            format!("{upper}{}", self.suffix)
        }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::jakarta_islamic_30()
    }
}
