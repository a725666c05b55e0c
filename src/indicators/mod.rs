//! Indicator engine
//!
//! Derives the scoring indicators from a normalized [`Series`]:
//!
//! - **RSI(14)**: Wilder-smoothed momentum, 0..=100
//! - **MACD(12, 26, 9)**: EMA spread and its signal line
//! - **Money flow(20)**: Chaikin-style accumulation/distribution oscillator
//! - **Bands(20, 2σ)**: Bollinger-style envelope
//! - **Volume MA(20)**: baseline for volume breakouts
//!
//! Every column is aligned bar for bar with the series. Values are `None`
//! during warm-up, and an indicator that cannot be computed at all (too few
//! bars, bad settings) is `None` throughout instead of failing the frame.

pub mod averages;
pub mod momentum;
pub mod volatility;
pub mod volume;

pub use momentum::{macd, rsi, Macd};
pub use volatility::{bands, Bands};
pub use volume::{money_flow, raw_flow, volume_ma};

use serde::{Deserialize, Serialize};

use crate::{series::Series, Bar, Error, Period, Result};

// ============================================================
// DEFAULTS
// ============================================================

pub const RSI_PERIOD: Period = Period::new_const(14);
pub const MACD_FAST: Period = Period::new_const(12);
pub const MACD_SLOW: Period = Period::new_const(26);
pub const MACD_SIGNAL: Period = Period::new_const(9);
pub const MONEY_FLOW_PERIOD: Period = Period::new_const(20);
pub const BAND_PERIOD: Period = Period::new_const(20);
pub const BAND_WIDTH: f64 = 2.0;
pub const VOLUME_MA_PERIOD: Period = Period::new_const(20);

/// RSI assumed when the value is absent (neutral)
pub const DEFAULT_RSI: f64 = 50.0;
/// MACD line and signal assumed when absent
pub const DEFAULT_MACD: f64 = 0.0;
/// Money-flow oscillator assumed when absent
pub const DEFAULT_MONEY_FLOW: f64 = 0.0;

/// Lookback lengths and multipliers for every indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub rsi_period: Period,
    pub macd_fast: Period,
    pub macd_slow: Period,
    pub macd_signal: Period,
    pub money_flow_period: Period,
    pub band_period: Period,
    pub band_width: f64,
    pub volume_ma_period: Period,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: RSI_PERIOD,
            macd_fast: MACD_FAST,
            macd_slow: MACD_SLOW,
            macd_signal: MACD_SIGNAL,
            money_flow_period: MONEY_FLOW_PERIOD,
            band_period: BAND_PERIOD,
            band_width: BAND_WIDTH,
            volume_ma_period: VOLUME_MA_PERIOD,
        }
    }
}

impl IndicatorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.macd_fast >= self.macd_slow {
            return Err(Error::InvalidConfig(
                "macd_fast must be shorter than macd_slow".to_string(),
            ));
        }
        if !(self.band_width.is_finite() && self.band_width > 0.0) {
            return Err(Error::InvalidValue("band_width must be positive"));
        }
        Ok(())
    }

    /// Bars needed before every indicator has a value on the latest bar
    pub fn warmup(&self) -> usize {
        [
            self.rsi_period.get() + 1,
            self.macd_slow.get() + self.macd_signal.get() - 1,
            self.money_flow_period.get(),
            self.band_period.get(),
            self.volume_ma_period.get(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

// ============================================================
// FRAME
// ============================================================

/// A series with every indicator column attached
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub series: Series,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub money_flow: Vec<Option<f64>>,
    pub band_upper: Vec<Option<f64>>,
    pub band_middle: Vec<Option<f64>>,
    pub band_lower: Vec<Option<f64>>,
    pub volume_ma: Vec<Option<f64>>,
}

/// Keep a computed column, or log and blank it
fn or_absent(name: &str, len: usize, result: Result<Vec<Option<f64>>>) -> Vec<Option<f64>> {
    result.unwrap_or_else(|e| {
        log::debug!("indicator {name} unavailable: {e}");
        vec![None; len]
    })
}

impl IndicatorFrame {
    /// Compute every indicator for `series`. Never fails.
    pub fn compute(series: &Series, settings: &IndicatorSettings) -> Self {
        let len = series.len();
        let bars = series.bars();
        let closes = series.closes();

        let rsi = or_absent("rsi", len, rsi(&closes, settings.rsi_period));

        let (macd_line, macd_signal) =
            match macd(&closes, settings.macd_fast, settings.macd_slow, settings.macd_signal) {
                Ok(m) => (m.line, m.signal),
                Err(e) => {
                    log::debug!("indicator macd unavailable: {e}");
                    (vec![None; len], vec![None; len])
                }
            };

        let money_flow = or_absent(
            "money_flow",
            len,
            money_flow(bars, settings.money_flow_period),
        );

        let (band_upper, band_middle, band_lower) =
            match bands(&closes, settings.band_period, settings.band_width) {
                Ok(b) => (b.upper, b.middle, b.lower),
                Err(e) => {
                    log::debug!("indicator bands unavailable: {e}");
                    (vec![None; len], vec![None; len], vec![None; len])
                }
            };

        let volume_ma = or_absent("volume_ma", len, volume_ma(bars, settings.volume_ma_period));

        Self {
            series: series.clone(),
            rsi,
            macd: macd_line,
            macd_signal,
            money_flow,
            band_upper,
            band_middle,
            band_lower,
            volume_ma,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// All indicator values at bar `index`
    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        let bar = *self.series.bars().get(index)?;
        let at = |column: &[Option<f64>]| column.get(index).copied().flatten();
        Some(IndicatorRow {
            bar,
            rsi: at(&self.rsi),
            macd: at(&self.macd),
            macd_signal: at(&self.macd_signal),
            money_flow: at(&self.money_flow),
            band_upper: at(&self.band_upper),
            band_middle: at(&self.band_middle),
            band_lower: at(&self.band_lower),
            volume_ma: at(&self.volume_ma),
        })
    }

    pub fn latest(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    /// The two most recent rows as `(previous, current)`
    pub fn latest_pair(&self) -> Option<(IndicatorRow, IndicatorRow)> {
        let last = self.len().checked_sub(1)?;
        let prev = last.checked_sub(1)?;
        Some((self.row(prev)?, self.row(last)?))
    }
}

/// Indicator state at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub bar: Bar,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub money_flow: Option<f64>,
    pub band_upper: Option<f64>,
    pub band_middle: Option<f64>,
    pub band_lower: Option<f64>,
    pub volume_ma: Option<f64>,
}

impl IndicatorRow {
    #[inline]
    pub fn rsi_or_default(&self) -> f64 {
        self.rsi.unwrap_or(DEFAULT_RSI)
    }

    #[inline]
    pub fn macd_or_default(&self) -> f64 {
        self.macd.unwrap_or(DEFAULT_MACD)
    }

    #[inline]
    pub fn macd_signal_or_default(&self) -> f64 {
        self.macd_signal.unwrap_or(DEFAULT_MACD)
    }

    #[inline]
    pub fn money_flow_or_default(&self) -> f64 {
        self.money_flow.unwrap_or(DEFAULT_MONEY_FLOW)
    }

    /// MACD line above its signal line (defaults applied)
    #[inline]
    pub fn macd_trend_up(&self) -> bool {
        self.macd_or_default() > self.macd_signal_or_default()
    }

    /// Current volume over its moving average, `None` without a usable average
    pub fn volume_ratio(&self) -> Option<f64> {
        self.volume_ma
            .filter(|ma| *ma > 0.0)
            .map(|ma| self.bar.volume / ma)
    }
}
