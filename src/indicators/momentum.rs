//! RSI and MACD
//!
//! ```text
//! RS  = avg_gain / avg_loss            (Wilder smoothing)
//! RSI = 100 - 100 / (1 + RS)
//!
//! MACD   = EMA(fast) - EMA(slow)
//! signal = EMA(signal) of MACD
//! ```

use super::averages::ema;
use crate::{Error, Period, Result};

/// Relative Strength Index.
///
/// The first `period` values are `None`; the first defined value sits at
/// index `period` and is seeded with the simple mean of the first `period`
/// changes.
pub fn rsi(closes: &[f64], period: Period) -> Result<Vec<Option<f64>>> {
    let p = period.get();
    if closes.len() < p + 1 {
        return Err(Error::InsufficientData {
            need: p + 1,
            got: closes.len(),
        });
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let n = p as f64;
    let mut avg_gain = gains[..p].iter().sum::<f64>() / n;
    let mut avg_loss = losses[..p].iter().sum::<f64>() / n;

    let mut out = vec![None; closes.len()];
    out[p] = Some(rsi_value(avg_gain, avg_loss));

    for i in p..gains.len() {
        avg_gain = (avg_gain * (n - 1.0) + gains[i]) / n;
        avg_loss = (avg_loss * (n - 1.0) + losses[i]) / n;
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    Ok(out)
}

#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// MACD line and its signal line, aligned with the input
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// MACD(fast, slow, signal).
///
/// The line is defined from index `slow - 1`. When too few line values exist
/// for the signal EMA, the line is still returned and the signal stays `None`.
pub fn macd(closes: &[f64], fast: Period, slow: Period, signal: Period) -> Result<Macd> {
    if fast >= slow {
        return Err(Error::InvalidConfig(format!(
            "MACD fast period {} must be shorter than slow period {}",
            fast.get(),
            slow.get()
        )));
    }

    let fast_ema = ema(closes, fast)?;
    let slow_ema = ema(closes, slow)?;

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let first = slow.get() - 1;
    let defined: Vec<f64> = line[first..].iter().flatten().copied().collect();

    let mut signal_line = vec![None; closes.len()];
    match ema(&defined, signal) {
        Ok(values) => {
            for (offset, value) in values.into_iter().enumerate() {
                signal_line[first + offset] = value;
            }
        }
        Err(e) => log::debug!("macd: signal line unavailable: {e}"),
    }

    Ok(Macd {
        line,
        signal: signal_line,
    })
}
