//! Single-bar candlestick detectors: Hammer, Marubozu, Doji
//!
//! All three compare wick and body lengths against the bar's own geometry, so
//! the scanner skips them on a bar with zero range.

use serde::{Deserialize, Serialize};

use super::{
    helpers::{self, check_non_negative, check_rsi_level, rsi_below},
    CandleContext, PatternDetector, PatternHit,
};
use crate::{Direction, OHLCVExt, PatternId, Result, OHLCV};

impl_with_defaults!(HammerDetector, MarubozuDetector, DojiDetector);

// ============================================================
// HAMMER
// ============================================================

/// Long lower wick, upper wick shorter than the body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HammerDetector {
    pub wick_factor: f64,
    pub weight: f64,
    /// Weight when RSI is below `reversal_rsi`
    pub reversal_weight: f64,
    pub reversal_rsi: f64,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            wick_factor: helpers::HAMMER_WICK_FACTOR,
            weight: helpers::HAMMER_WEIGHT,
            reversal_weight: helpers::HAMMER_REVERSAL_WEIGHT,
            reversal_rsi: helpers::HAMMER_REVERSAL_RSI,
        }
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> PatternId {
        PatternId::HAMMER
    }

    fn uses_wick_ratios(&self) -> bool {
        true
    }

    fn detect<T: OHLCV>(&self, _prev: &T, curr: &T, ctx: &CandleContext) -> Option<PatternHit> {
        let body = curr.body();
        if curr.lower_wick() <= self.wick_factor * body || curr.upper_wick() >= body {
            return None;
        }

        let weight = if rsi_below(ctx.rsi, self.reversal_rsi) {
            self.reversal_weight
        } else {
            self.weight
        };

        Some(PatternHit {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            weight,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_non_negative("hammer.wick_factor", self.wick_factor)?;
        check_non_negative("hammer.weight", self.weight)?;
        check_non_negative("hammer.reversal_weight", self.reversal_weight)?;
        check_rsi_level("hammer.reversal_rsi", self.reversal_rsi)
    }
}

// ============================================================
// MARUBOZU
// ============================================================

/// Bullish bar with (almost) no wicks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarubozuDetector {
    pub wick_factor: f64,
    pub weight: f64,
}

impl Default for MarubozuDetector {
    fn default() -> Self {
        Self {
            wick_factor: helpers::MARUBOZU_WICK_FACTOR,
            weight: helpers::MARUBOZU_WEIGHT,
        }
    }
}

impl PatternDetector for MarubozuDetector {
    fn id(&self) -> PatternId {
        PatternId::MARUBOZU
    }

    fn uses_wick_ratios(&self) -> bool {
        true
    }

    fn detect<T: OHLCV>(&self, _prev: &T, curr: &T, _ctx: &CandleContext) -> Option<PatternHit> {
        if !curr.is_bullish() {
            return None;
        }
        let limit = self.wick_factor * curr.body();
        if curr.upper_wick() >= limit || curr.lower_wick() >= limit {
            return None;
        }

        Some(PatternHit {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            weight: self.weight,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_non_negative("marubozu.wick_factor", self.wick_factor)?;
        check_non_negative("marubozu.weight", self.weight)
    }
}

// ============================================================
// DOJI
// ============================================================

/// Body no larger than a tenth of the range.
///
/// Informational by default; carries `oversold_weight` when RSI is below
/// `oversold_rsi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DojiDetector {
    pub body_factor: f64,
    pub weight: f64,
    pub oversold_weight: f64,
    pub oversold_rsi: f64,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            body_factor: helpers::DOJI_BODY_FACTOR,
            weight: helpers::DOJI_WEIGHT,
            oversold_weight: helpers::DOJI_OVERSOLD_WEIGHT,
            oversold_rsi: helpers::DOJI_OVERSOLD_RSI,
        }
    }
}

impl PatternDetector for DojiDetector {
    fn id(&self) -> PatternId {
        PatternId::DOJI
    }

    fn uses_wick_ratios(&self) -> bool {
        true
    }

    fn detect<T: OHLCV>(&self, _prev: &T, curr: &T, ctx: &CandleContext) -> Option<PatternHit> {
        if curr.body() > self.body_factor * curr.range() {
            return None;
        }

        let weight = if rsi_below(ctx.rsi, self.oversold_rsi) {
            self.oversold_weight
        } else {
            self.weight
        };

        Some(PatternHit {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Neutral,
            weight,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_non_negative("doji.body_factor", self.body_factor)?;
        check_non_negative("doji.weight", self.weight)?;
        check_non_negative("doji.oversold_weight", self.oversold_weight)?;
        check_rsi_level("doji.oversold_rsi", self.oversold_rsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    const PREV: Bar = Bar::new(0, 100.0, 105.0, 95.0, 102.0, 1000.0);

    fn ctx(rsi: Option<f64>) -> CandleContext {
        CandleContext { rsi }
    }

    #[test]
    fn test_hammer_not_fired_when_upper_wick_exceeds_body() {
        // lower wick 10.5 > 2 * 0.5, but upper wick 2 >= body 0.5
        let curr = Bar::new(1, 101.0, 103.0, 90.0, 100.5, 1200.0);
        assert!(HammerDetector::with_defaults()
            .detect(&PREV, &curr, &ctx(None))
            .is_none());
    }

    #[test]
    fn test_hammer_base_and_reversal_weight() {
        let curr = Bar::new(1, 100.0, 102.5, 90.0, 102.0, 1200.0);
        let d = HammerDetector::with_defaults();
        let plain = d.detect(&PREV, &curr, &ctx(Some(55.0))).unwrap();
        assert_eq!(plain.weight, helpers::HAMMER_WEIGHT);
        let reversal = d.detect(&PREV, &curr, &ctx(Some(42.0))).unwrap();
        assert_eq!(reversal.weight, helpers::HAMMER_REVERSAL_WEIGHT);
        let unknown = d.detect(&PREV, &curr, &ctx(None)).unwrap();
        assert_eq!(unknown.weight, helpers::HAMMER_WEIGHT);
    }

    #[test]
    fn test_marubozu() {
        let d = MarubozuDetector::with_defaults();
        let clean = Bar::new(1, 100.0, 110.05, 99.95, 110.0, 1000.0);
        assert!(d.detect(&PREV, &clean, &ctx(None)).is_some());
        let wicky = Bar::new(1, 100.0, 112.0, 99.95, 110.0, 1000.0);
        assert!(d.detect(&PREV, &wicky, &ctx(None)).is_none());
        let bearish = Bar::new(1, 110.0, 110.0, 100.0, 100.0, 1000.0);
        assert!(d.detect(&PREV, &bearish, &ctx(None)).is_none());
    }

    #[test]
    fn test_doji_weight_depends_on_rsi() {
        let d = DojiDetector::with_defaults();
        let curr = Bar::new(1, 100.0, 105.0, 95.0, 100.5, 1000.0);
        assert_eq!(d.detect(&PREV, &curr, &ctx(Some(45.0))).unwrap().weight, 0.0);
        assert_eq!(d.detect(&PREV, &curr, &ctx(Some(25.0))).unwrap().weight, 0.5);
        let long_body = Bar::new(1, 100.0, 105.0, 95.0, 104.0, 1000.0);
        assert!(d.detect(&PREV, &long_body, &ctx(None)).is_none());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let d = HammerDetector {
            weight: -1.0,
            ..HammerDetector::default()
        };
        assert!(d.validate_config().is_err());
        let d = DojiDetector {
            oversold_rsi: 130.0,
            ..DojiDetector::default()
        };
        assert!(d.validate_config().is_err());
    }
}
