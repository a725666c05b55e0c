//! Money-flow oscillator and volume average

use super::averages::{rolling_sum, sma};
use crate::{OHLCVExt, Period, Result, OHLCV};

/// Per-bar raw money flow: `((2C - H - L) / (H - L)) * V`.
///
/// The location term is 0 for a bar with no range.
#[inline]
pub fn raw_flow<T: OHLCV>(bar: &T) -> f64 {
    let range = bar.range();
    if range == 0.0 {
        return 0.0;
    }
    ((2.0 * bar.close() - bar.high() - bar.low()) / range) * bar.volume()
}

/// Chaikin-style money-flow oscillator.
///
/// Rolling sum of raw flow divided by rolling sum of volume. Windows with no
/// volume are `None`.
pub fn money_flow<T: OHLCV>(bars: &[T], period: Period) -> Result<Vec<Option<f64>>> {
    let flows: Vec<f64> = bars.iter().map(raw_flow).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();

    let flow_sums = rolling_sum(&flows, period)?;
    let volume_sums = rolling_sum(&volumes, period)?;

    Ok(flow_sums
        .into_iter()
        .zip(volume_sums)
        .map(|(flow, volume)| match (flow, volume) {
            (Some(f), Some(v)) if v != 0.0 => Some(f / v),
            _ => None,
        })
        .collect())
}

/// Simple moving average of volume
pub fn volume_ma<T: OHLCV>(bars: &[T], period: Period) -> Result<Vec<Option<f64>>> {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();
    sma(&volumes, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    const P3: Period = Period::new_const(3);

    #[test]
    fn test_raw_flow_close_at_high() {
        let bar = Bar::new(0, 10.0, 12.0, 8.0, 12.0, 100.0);
        assert_eq!(raw_flow(&bar), 100.0);
    }

    #[test]
    fn test_raw_flow_close_at_low() {
        let bar = Bar::new(0, 10.0, 12.0, 8.0, 8.0, 100.0);
        assert_eq!(raw_flow(&bar), -100.0);
    }

    #[test]
    fn test_raw_flow_zero_range() {
        let bar = Bar::new(0, 10.0, 10.0, 10.0, 10.0, 100.0);
        assert_eq!(raw_flow(&bar), 0.0);
    }

    #[test]
    fn test_money_flow_accumulation() {
        let bars: Vec<Bar> = (0..5)
            .map(|i| Bar::new(i, 10.0, 12.0, 8.0, 11.5, 100.0))
            .collect();
        let out = money_flow(&bars, P3).unwrap();
        assert!(out[1].is_none());
        assert!((out[4].unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_money_flow_no_volume_is_none() {
        let bars: Vec<Bar> = (0..3).map(|i| Bar::new(i, 10.0, 12.0, 8.0, 11.0, 0.0)).collect();
        let out = money_flow(&bars, P3).unwrap();
        assert_eq!(out[2], None);
    }

    #[test]
    fn test_volume_ma() {
        let bars: Vec<Bar> = (0..3)
            .map(|i| Bar::new(i, 1.0, 1.0, 1.0, 1.0, (i + 1) as f64 * 100.0))
            .collect();
        assert_eq!(volume_ma(&bars, P3).unwrap()[2], Some(200.0));
    }
}
