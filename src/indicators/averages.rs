//! Rolling-window primitives shared by the indicator modules

use crate::{Error, Period, Result};

#[inline]
fn require(len: usize, need: usize) -> Result<()> {
    if len < need {
        return Err(Error::InsufficientData { need, got: len });
    }
    Ok(())
}

/// Sum over each trailing window of `period` values
pub fn rolling_sum(values: &[f64], period: Period) -> Result<Vec<Option<f64>>> {
    let p = period.get();
    require(values.len(), p)?;

    Ok((0..values.len())
        .map(|i| (i + 1 >= p).then(|| values[i + 1 - p..=i].iter().sum::<f64>()))
        .collect())
}

/// Simple moving average, defined from index `period - 1`
pub fn sma(values: &[f64], period: Period) -> Result<Vec<Option<f64>>> {
    let n = period.get() as f64;
    Ok(rolling_sum(values, period)?
        .into_iter()
        .map(|sum| sum.map(|s| s / n))
        .collect())
}

/// Population standard deviation over each trailing window
pub fn rolling_std(values: &[f64], period: Period) -> Result<Vec<Option<f64>>> {
    let p = period.get();
    require(values.len(), p)?;

    Ok((0..values.len())
        .map(|i| {
            (i + 1 >= p).then(|| {
                let window = &values[i + 1 - p..=i];
                let mean = window.iter().sum::<f64>() / p as f64;
                let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / p as f64;
                variance.sqrt()
            })
        })
        .collect())
}

/// Exponential moving average with `alpha = 2 / (period + 1)`.
///
/// Seeded with the simple mean of the first `period` values, so the first
/// defined value sits at index `period - 1`.
pub fn ema(values: &[f64], period: Period) -> Result<Vec<Option<f64>>> {
    let p = period.get();
    require(values.len(), p)?;

    let alpha = 2.0 / (p as f64 + 1.0);
    let mut out = vec![None; values.len()];
    let mut current = values[..p].iter().sum::<f64>() / p as f64;
    out[p - 1] = Some(current);

    for (i, &x) in values.iter().enumerate().skip(p) {
        current = alpha * x + (1.0 - alpha) * current;
        out[i] = Some(current);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P3: Period = Period::new_const(3);

    #[test]
    fn test_sma() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], P3).unwrap();
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sma_insufficient() {
        assert_eq!(
            sma(&[1.0, 2.0], P3),
            Err(Error::InsufficientData { need: 3, got: 2 })
        );
    }

    #[test]
    fn test_rolling_std_constant_is_zero() {
        let out = rolling_std(&[5.0; 4], P3).unwrap();
        assert_eq!(out[2], Some(0.0));
        assert_eq!(out[3], Some(0.0));
    }

    #[test]
    fn test_rolling_std_population() {
        let out = rolling_std(&[1.0, 2.0, 3.0], P3).unwrap();
        let expected = (2.0f64 / 3.0).sqrt();
        assert!((out[2].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ema_seed_and_step() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0], P3).unwrap();
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        // alpha = 0.5
        assert!((out[3].unwrap() - 3.0).abs() < 1e-12);
    }
}
