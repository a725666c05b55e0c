//! Pattern thresholds and weights
//!
//! Defaults for every detector. Each detector struct copies these into public
//! fields, so a caller (or a policy file) can override any of them.

// ============================================================
// SHAPE THRESHOLDS
// ============================================================

/// Hammer: lower wick must exceed body * HAMMER_WICK_FACTOR
pub const HAMMER_WICK_FACTOR: f64 = 2.0;
/// Marubozu: each wick must stay below body * MARUBOZU_WICK_FACTOR
pub const MARUBOZU_WICK_FACTOR: f64 = 0.1;
/// Doji: body <= range * DOJI_BODY_FACTOR
pub const DOJI_BODY_FACTOR: f64 = 0.1;

// ============================================================
// RSI CONTEXT
// ============================================================

/// Hammer below this RSI is a reversal hammer
pub const HAMMER_REVERSAL_RSI: f64 = 50.0;
/// Doji below this RSI carries weight
pub const DOJI_OVERSOLD_RSI: f64 = 30.0;

// ============================================================
// WEIGHTS
// ============================================================

pub const HAMMER_WEIGHT: f64 = 1.0;
pub const HAMMER_REVERSAL_WEIGHT: f64 = 1.5;
pub const BULLISH_ENGULFING_WEIGHT: f64 = 2.0;
pub const MARUBOZU_WEIGHT: f64 = 1.0;
pub const DOJI_WEIGHT: f64 = 0.0;
pub const DOJI_OVERSOLD_WEIGHT: f64 = 0.5;

// ============================================================
// VALIDATION
// ============================================================

/// Weights and factors must be finite and non-negative
pub fn check_non_negative(field: &'static str, value: f64) -> crate::Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(crate::Error::OutOfRange {
            field,
            value,
            min: 0.0,
            max: f64::MAX,
        });
    }
    Ok(())
}

/// RSI thresholds live on the 0..=100 scale
pub fn check_rsi_level(field: &'static str, value: f64) -> crate::Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(crate::Error::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

/// RSI below `level`; an absent RSI never qualifies
#[inline]
pub fn rsi_below(rsi: Option<f64>, level: f64) -> bool {
    rsi.is_some_and(|r| r < level)
}
