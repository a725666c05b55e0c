//! Bollinger-style bands

use super::averages::{rolling_std, sma};
use crate::{Error, Period, Result};

/// Upper, middle and lower band aligned with the input closes
#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// SMA(period) of close ± `width` population standard deviations
pub fn bands(closes: &[f64], period: Period, width: f64) -> Result<Bands> {
    if !(width.is_finite() && width > 0.0) {
        return Err(Error::InvalidValue("band width must be positive"));
    }

    let middle = sma(closes, period)?;
    let std = rolling_std(closes, period)?;

    let (upper, lower) = middle
        .iter()
        .zip(&std)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => (Some(m + width * s), Some(m - width * s)),
            _ => (None, None),
        })
        .unzip();

    Ok(Bands {
        upper,
        middle,
        lower,
    })
}
