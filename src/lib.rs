//! # equiscreen - equity screening engine
//!
//! Ranks a universe of equities by combining technical indicators, money-flow,
//! candlestick patterns and fundamental ratios into one composite score.
//!
//! ## Quick Start
//!
//! ```rust
//! use equiscreen::prelude::*;
//!
//! let bars: Vec<Bar> = (0..40)
//!     .map(|i| {
//!         let c = 100.0 + i as f64;
//!         Bar::new(i as i64 * 86_400, c - 0.5, c + 1.0, c - 1.0, c, 1_000.0)
//!     })
//!     .collect();
//! let series = Series::from_bars(bars).unwrap();
//!
//! let frame = IndicatorFrame::compute(&series, &IndicatorSettings::default());
//! let scanner = ScannerBuilder::new().with_defaults().build().unwrap();
//! let pattern = scanner.scan_latest(&series, frame.latest().and_then(|r| r.rsi));
//!
//! let score = Scorer::new(ScoringPolicy::default()).score(&frame, &pattern, None);
//! assert!(!score.reasons.is_empty());
//! ```

pub mod detectors;
pub mod fundamentals;
pub mod indicators;
pub mod policy;
pub mod provider;
pub mod scoring;
pub mod screener;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::{
            BuiltinDetector, CandleContext, CandleScanner, PatternDetector, PatternHit,
            PatternResult, ScannerBuilder,
        },
        // Fundamentals
        fundamentals::{FundamentalCache, FundamentalSnapshot, FundamentalSource},
        // Indicators
        indicators::{IndicatorFrame, IndicatorRow, IndicatorSettings},
        // Policy
        policy::{RecommendationRule, ScoringPolicy},
        // Provider boundary
        provider::{GroupBy, HistoryPeriod, MarketData, ProviderError, Universe},
        // Scoring
        scoring::{Recommendation, ScoreResult, Scorer, SubScores},
        // Screening
        screener::{
            CancelToken, EvalError, Inclusion, Progress, ProgressSink, ScreenError, ScreenReport,
            ScreenRow, ScreenStatus, Screener, ScreenerConfig, SortKey, SymbolAnalysis,
        },
        // Series
        series::{ColumnLabel, RawTable, Series},
        // Core types
        Bar,
        Direction,
        Error,
        OHLCVExt,
        PatternId,
        Period,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by validation, configuration and indicator computation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Timestamp at index {index} is not after the previous bar")]
    NonMonotonicTimestamp { index: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Lookback length in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed candle geometry
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BAR
// ============================================================

/// One trading session
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    /// Session timestamp, seconds since the Unix epoch
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub const fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Multiply every price field by `factor`, leaving volume untouched
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            open: self.open * factor,
            high: self.high * factor,
            low: self.low * factor,
            close: self.close * factor,
            ..*self
        }
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// PATTERN IDENTITY
// ============================================================

/// Unique identifier for a candlestick pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PatternId(pub &'static str);

impl PatternId {
    pub const HAMMER: PatternId = PatternId("Hammer");
    pub const BULLISH_ENGULFING: PatternId = PatternId("Bullish Engulfing");
    pub const MARUBOZU: PatternId = PatternId("Marubozu");
    pub const DOJI: PatternId = PatternId("Doji");

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_period_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Period>("14").is_ok());
        assert!(serde_json::from_str::<Period>("0").is_err());
    }

    #[test]
    fn test_candle_geometry() {
        let bar = Bar::new(0, 101.0, 103.0, 90.0, 100.5, 1200.0);
        assert!((bar.body() - 0.5).abs() < 1e-12);
        assert!((bar.upper_wick() - 2.0).abs() < 1e-12);
        assert!((bar.lower_wick() - 10.5).abs() < 1e-12);
        assert!((bar.range() - 13.0).abs() < 1e-12);
        assert!(bar.is_bearish());
        assert!(!bar.is_bullish());
    }

    #[test]
    fn test_scaled_keeps_volume() {
        let bar = Bar::new(7, 10.0, 12.0, 9.0, 11.0, 500.0).scaled(3.0);
        assert_eq!(bar.close, 33.0);
        assert_eq!(bar.volume, 500.0);
        assert_eq!(bar.timestamp, 7);
    }
}
