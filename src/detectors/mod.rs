//! Candlestick pattern detection
//!
//! Classifies the latest bar (relative to the one before it) into weighted
//! reversal/continuation patterns. Detectors run in a fixed order and a bar may
//! match several of them; the weights add up.
//!
//! - **Single-bar**: Hammer, Marubozu, Doji
//! - **Two-bar**: Bullish Engulfing

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod single_bar;
pub mod two_bar;

pub use single_bar::*;
pub use two_bar::*;

use serde::Serialize;

use crate::{series::Series, Direction, OHLCVExt, PatternId, Result, OHLCV};

// ============================================================
// DETECTION TYPES
// ============================================================

/// Indicator state a detector may consult
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CandleContext {
    /// RSI on the current bar, if known
    pub rsi: Option<f64>,
}

/// One matched pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternHit {
    pub pattern_id: PatternId,
    pub direction: Direction,
    pub weight: f64,
}

/// Every pattern matched on the latest bar, in detection order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternResult {
    /// Sum of matched weights
    pub weight: f64,
    pub hits: Vec<PatternHit>,
}

impl PatternResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.hits.iter().map(|h| h.pattern_id.as_str()).collect()
    }

    fn push(&mut self, hit: PatternHit) {
        self.weight += hit.weight;
        self.hits.push(hit);
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;

    fn detect<T: OHLCV>(&self, prev: &T, curr: &T, ctx: &CandleContext) -> Option<PatternHit>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Pattern compares wicks/body against the bar's range; skipped when the
    /// range is zero
    fn uses_wick_ratios(&self) -> bool {
        false
    }
}

/// Macro to generate the BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors, dispatched by enum
        #[derive(Debug, Clone, PartialEq)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                prev: &T,
                curr: &T,
                ctx: &CandleContext,
            ) -> Option<PatternHit> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, prev, curr, ctx)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn uses_wick_ratios(&self) -> bool {
                match self {
                    $(Self::$variant(d) => PatternDetector::uses_wick_ratios(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    Hammer(HammerDetector),
    BullishEngulfing(BullishEngulfingDetector),
    Marubozu(MarubozuDetector),
    Doji(DojiDetector),
}

// ============================================================
// SCANNER
// ============================================================

/// Runs a fixed, ordered set of detectors over a bar pair
#[derive(Debug, Clone, PartialEq)]
pub struct CandleScanner {
    detectors: Vec<BuiltinDetector>,
}

impl CandleScanner {
    /// Detect patterns on `curr` relative to `prev`.
    pub fn scan<T: OHLCV>(&self, prev: &T, curr: &T, ctx: &CandleContext) -> PatternResult {
        let mut result = PatternResult::default();
        let flat = !(curr.range() > 0.0);

        for detector in &self.detectors {
            if flat && detector.uses_wick_ratios() {
                continue;
            }
            if let Some(hit) = detector.detect(prev, curr, ctx) {
                result.push(hit);
            }
        }

        result
    }

    /// Detect patterns on the last bar of `series`; empty with fewer than two bars.
    pub fn scan_latest(&self, series: &Series, rsi: Option<f64>) -> PatternResult {
        match series.last_pair() {
            Some((prev, curr)) => self.scan(prev, curr, &CandleContext { rsi }),
            None => PatternResult::default(),
        }
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }
}

impl Default for CandleScanner {
    fn default() -> Self {
        Self {
            detectors: default_detectors().to_vec(),
        }
    }
}

fn default_detectors() -> [BuiltinDetector; 4] {
    [
        BuiltinDetector::Hammer(HammerDetector::default()),
        BuiltinDetector::BullishEngulfing(BullishEngulfingDetector::default()),
        BuiltinDetector::Marubozu(MarubozuDetector::default()),
        BuiltinDetector::Doji(DojiDetector::default()),
    ]
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`CandleScanner`]
#[derive(Debug, Default)]
pub struct ScannerBuilder {
    detectors: Vec<BuiltinDetector>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add Hammer, Bullish Engulfing, Marubozu and Doji with default settings
    pub fn with_defaults(mut self) -> Self {
        self.detectors.extend(default_detectors());
        self
    }

    /// Add the four detectors configured by `patterns`, in detection order
    pub fn with_policy(mut self, patterns: &crate::policy::PatternPolicy) -> Self {
        self.detectors.extend([
            BuiltinDetector::Hammer(patterns.hammer),
            BuiltinDetector::BullishEngulfing(patterns.bullish_engulfing),
            BuiltinDetector::Marubozu(patterns.marubozu),
            BuiltinDetector::Doji(patterns.doji),
        ]);
        self
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Build the scanner, validating every detector's configuration
    pub fn build(self) -> Result<CandleScanner> {
        for detector in &self.detectors {
            detector.validate_config()?;
        }
        Ok(CandleScanner {
            detectors: self.detectors,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
