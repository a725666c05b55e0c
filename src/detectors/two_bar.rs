//! Two-bar candlestick detectors: Bullish Engulfing

use serde::{Deserialize, Serialize};

use super::{
    helpers::{self, check_non_negative},
    CandleContext, PatternDetector, PatternHit,
};
use crate::{Direction, OHLCVExt, PatternId, Result, OHLCV};

impl_with_defaults!(BullishEngulfingDetector);

// ============================================================
// ENGULFING
// ============================================================

/// Bullish body that fully contains the previous bearish body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BullishEngulfingDetector {
    pub weight: f64,
}

impl Default for BullishEngulfingDetector {
    fn default() -> Self {
        Self {
            weight: helpers::BULLISH_ENGULFING_WEIGHT,
        }
    }
}

impl PatternDetector for BullishEngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId::BULLISH_ENGULFING
    }

    fn detect<T: OHLCV>(&self, prev: &T, curr: &T, _ctx: &CandleContext) -> Option<PatternHit> {
        if !(prev.is_bearish() && curr.is_bullish()) {
            return None;
        }
        if curr.open() >= prev.close() || curr.close() <= prev.open() {
            return None;
        }

        Some(PatternHit {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            weight: self.weight,
        })
    }

    fn validate_config(&self) -> Result<()> {
        check_non_negative("bullish_engulfing.weight", self.weight)
    }
}
