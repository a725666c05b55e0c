//! Scoring policy
//!
//! Every threshold and point value the scorer uses. The constants are the
//! reference policy; [`ScoringPolicy`] carries them as plain data so a caller
//! can override any of them in code or from a TOML file.
//!
//! # Example
//!
//! ```rust
//! use equiscreen::policy::ScoringPolicy;
//!
//! let policy = ScoringPolicy::from_toml_str(
//!     r#"
//!     [technical.oversold]
//!     level = 30.0
//!     points = 2.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(policy.technical.oversold.level, 30.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    detectors::{BullishEngulfingDetector, DojiDetector, HammerDetector, MarubozuDetector, ScannerBuilder},
    scoring::Recommendation,
    Error, Result,
};

// ============================================================
// TECHNICAL
// ============================================================

pub const MACD_UP_POINTS: f64 = 1.0;
pub const MACD_DOWN_POINTS: f64 = -1.0;
pub const RSI_OVERSOLD: f64 = 35.0;
pub const RSI_OVERSOLD_POINTS: f64 = 2.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERBOUGHT_POINTS: f64 = -2.0;
/// Volume above this multiple of its moving average is a breakout
pub const VOLUME_BREAKOUT_RATIO: f64 = 1.5;
pub const VOLUME_BREAKOUT_POINTS: f64 = 0.5;

// ============================================================
// MONEY FLOW
// ============================================================

pub const MONEY_FLOW_STRONG: f64 = 0.10;
pub const MONEY_FLOW_STRONG_POINTS: f64 = 2.0;
pub const MONEY_FLOW_MILD: f64 = 0.05;
pub const MONEY_FLOW_MILD_POINTS: f64 = 1.0;
pub const MONEY_FLOW_DISTRIBUTION: f64 = -0.10;
pub const MONEY_FLOW_DISTRIBUTION_POINTS: f64 = -2.0;

// ============================================================
// FUNDAMENTAL
// ============================================================

pub const PBV_CHEAP: f64 = 1.0;
pub const PBV_CHEAP_POINTS: f64 = 2.0;
pub const PBV_FAIR: f64 = 2.0;
pub const PBV_FAIR_POINTS: f64 = 1.0;
pub const PBV_EXPENSIVE: f64 = 5.0;
pub const PBV_EXPENSIVE_POINTS: f64 = -1.0;
pub const PER_CHEAP: f64 = 10.0;
pub const PER_CHEAP_POINTS: f64 = 2.0;
pub const PER_EXPENSIVE: f64 = 30.0;
pub const PER_EXPENSIVE_POINTS: f64 = -1.0;
/// Return on equity as a fraction (0.15 = 15%)
pub const ROE_HIGH: f64 = 0.15;
pub const ROE_HIGH_POINTS: f64 = 2.0;
pub const ROE_LOW: f64 = 0.05;
pub const ROE_LOW_POINTS: f64 = -1.0;
/// Debt to equity in percent (50 = 50%)
pub const DER_VERY_SAFE: f64 = 50.0;
pub const DER_VERY_SAFE_POINTS: f64 = 2.0;
pub const DER_SAFE: f64 = 100.0;
pub const DER_SAFE_POINTS: f64 = 1.0;
pub const DER_RISKY: f64 = 150.0;
pub const DER_RISKY_POINTS: f64 = -2.0;

// ============================================================
// RECOMMENDATION
// ============================================================

pub const GEM_MIN_TREND: f64 = 0.0;
pub const GEM_MIN_FUNDAMENTAL: f64 = 3.0;
pub const TRADING_BUY_MIN_TREND: f64 = 1.0;
pub const INVEST_BUY_MIN_FUNDAMENTAL: f64 = 4.0;

/// A level and the points awarded when it is crossed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub level: f64,
    pub points: f64,
}

impl Threshold {
    pub const fn new(level: f64, points: f64) -> Self {
        Self { level, points }
    }

    fn check(&self, field: &'static str) -> Result<()> {
        if !(self.level.is_finite() && self.points.is_finite()) {
            return Err(Error::InvalidConfig(format!("{field} must be finite")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalPolicy {
    pub macd_up_points: f64,
    pub macd_down_points: f64,
    /// RSI strictly below `level`
    pub oversold: Threshold,
    /// RSI strictly above `level`
    pub overbought: Threshold,
    /// Volume / volume MA strictly above `level`
    pub volume_breakout: Threshold,
}

impl Default for TechnicalPolicy {
    fn default() -> Self {
        Self {
            macd_up_points: MACD_UP_POINTS,
            macd_down_points: MACD_DOWN_POINTS,
            oversold: Threshold::new(RSI_OVERSOLD, RSI_OVERSOLD_POINTS),
            overbought: Threshold::new(RSI_OVERBOUGHT, RSI_OVERBOUGHT_POINTS),
            volume_breakout: Threshold::new(VOLUME_BREAKOUT_RATIO, VOLUME_BREAKOUT_POINTS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoneyFlowPolicy {
    pub strong: Threshold,
    pub mild: Threshold,
    /// Oscillator strictly below `level`
    pub distribution: Threshold,
}

impl Default for MoneyFlowPolicy {
    fn default() -> Self {
        Self {
            strong: Threshold::new(MONEY_FLOW_STRONG, MONEY_FLOW_STRONG_POINTS),
            mild: Threshold::new(MONEY_FLOW_MILD, MONEY_FLOW_MILD_POINTS),
            distribution: Threshold::new(MONEY_FLOW_DISTRIBUTION, MONEY_FLOW_DISTRIBUTION_POINTS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalPolicy {
    pub pbv_cheap: Threshold,
    pub pbv_fair: Threshold,
    pub pbv_expensive: Threshold,
    pub per_cheap: Threshold,
    pub per_expensive: Threshold,
    pub roe_high: Threshold,
    pub roe_low: Threshold,
    pub der_very_safe: Threshold,
    pub der_safe: Threshold,
    pub der_risky: Threshold,
}

impl Default for FundamentalPolicy {
    fn default() -> Self {
        Self {
            pbv_cheap: Threshold::new(PBV_CHEAP, PBV_CHEAP_POINTS),
            pbv_fair: Threshold::new(PBV_FAIR, PBV_FAIR_POINTS),
            pbv_expensive: Threshold::new(PBV_EXPENSIVE, PBV_EXPENSIVE_POINTS),
            per_cheap: Threshold::new(PER_CHEAP, PER_CHEAP_POINTS),
            per_expensive: Threshold::new(PER_EXPENSIVE, PER_EXPENSIVE_POINTS),
            roe_high: Threshold::new(ROE_HIGH, ROE_HIGH_POINTS),
            roe_low: Threshold::new(ROE_LOW, ROE_LOW_POINTS),
            der_very_safe: Threshold::new(DER_VERY_SAFE, DER_VERY_SAFE_POINTS),
            der_safe: Threshold::new(DER_SAFE, DER_SAFE_POINTS),
            der_risky: Threshold::new(DER_RISKY, DER_RISKY_POINTS),
        }
    }
}

/// Detector settings for the four scored candlestick patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPolicy {
    pub hammer: HammerDetector,
    pub bullish_engulfing: BullishEngulfingDetector,
    pub marubozu: MarubozuDetector,
    pub doji: DojiDetector,
}

/// Multipliers applied to each sub-score in the composite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PillarWeights {
    pub technical: f64,
    pub money_flow: f64,
    pub fundamental: f64,
    pub pattern: f64,
}

impl Default for PillarWeights {
    fn default() -> Self {
        Self {
            technical: 1.0,
            money_flow: 1.0,
            fundamental: 1.0,
            pattern: 1.0,
        }
    }
}

/// One row of the recommendation table.
///
/// Matches when every present bound is strictly exceeded. Trend is the
/// technical plus money-flow sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trend: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fundamental: Option<f64>,
}

impl RecommendationRule {
    pub fn matches(&self, trend: f64, fundamental: f64) -> bool {
        self.min_trend.map_or(true, |min| trend > min)
            && self.min_fundamental.map_or(true, |min| fundamental > min)
    }
}

/// Reference table: both pillars outrank a single one
pub fn default_recommendations() -> Vec<RecommendationRule> {
    vec![
        RecommendationRule {
            recommendation: Recommendation::Gem,
            min_trend: Some(GEM_MIN_TREND),
            min_fundamental: Some(GEM_MIN_FUNDAMENTAL),
        },
        RecommendationRule {
            recommendation: Recommendation::TradingBuy,
            min_trend: Some(TRADING_BUY_MIN_TREND),
            min_fundamental: None,
        },
        RecommendationRule {
            recommendation: Recommendation::InvestBuy,
            min_trend: None,
            min_fundamental: Some(INVEST_BUY_MIN_FUNDAMENTAL),
        },
    ]
}

// ============================================================
// POLICY
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub technical: TechnicalPolicy,
    pub money_flow: MoneyFlowPolicy,
    pub fundamental: FundamentalPolicy,
    pub patterns: PatternPolicy,
    pub weights: PillarWeights,
    /// Checked in order, first match wins; no match is `Neutral`
    pub recommendations: Vec<RecommendationRule>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            technical: TechnicalPolicy::default(),
            money_flow: MoneyFlowPolicy::default(),
            fundamental: FundamentalPolicy::default(),
            patterns: PatternPolicy::default(),
            weights: PillarWeights::default(),
            recommendations: default_recommendations(),
        }
    }
}

impl ScoringPolicy {
    /// Parse a (possibly partial) TOML policy; missing sections keep defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let policy: ScoringPolicy = toml::from_str(s)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse policy: {e}")))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read policy {}: {e}", path.display()))
        })?;
        let policy = Self::from_toml_str(&contents)?;
        log::info!("loaded scoring policy from {}", path.display());
        Ok(policy)
    }

    /// First rule in the table producing `recommendation`
    pub fn rule_for(&self, recommendation: Recommendation) -> Option<&RecommendationRule> {
        self.recommendations
            .iter()
            .find(|rule| rule.recommendation == recommendation)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize policy: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.technical;
        if !(t.macd_up_points.is_finite() && t.macd_down_points.is_finite()) {
            return Err(Error::InvalidConfig("macd points must be finite".to_string()));
        }
        t.oversold.check("technical.oversold")?;
        t.overbought.check("technical.overbought")?;
        t.volume_breakout.check("technical.volume_breakout")?;
        if t.oversold.level >= t.overbought.level {
            return Err(Error::InvalidConfig(
                "RSI oversold level must be below overbought level".to_string(),
            ));
        }

        let m = &self.money_flow;
        m.strong.check("money_flow.strong")?;
        m.mild.check("money_flow.mild")?;
        m.distribution.check("money_flow.distribution")?;
        if !(m.distribution.level < m.mild.level && m.mild.level <= m.strong.level) {
            return Err(Error::InvalidConfig(
                "money flow levels must satisfy distribution < mild <= strong".to_string(),
            ));
        }

        let f = &self.fundamental;
        for (field, threshold) in [
            ("fundamental.pbv_cheap", f.pbv_cheap),
            ("fundamental.pbv_fair", f.pbv_fair),
            ("fundamental.pbv_expensive", f.pbv_expensive),
            ("fundamental.per_cheap", f.per_cheap),
            ("fundamental.per_expensive", f.per_expensive),
            ("fundamental.roe_high", f.roe_high),
            ("fundamental.roe_low", f.roe_low),
            ("fundamental.der_very_safe", f.der_very_safe),
            ("fundamental.der_safe", f.der_safe),
            ("fundamental.der_risky", f.der_risky),
        ] {
            threshold.check(field)?;
        }
        if f.pbv_cheap.level > f.pbv_fair.level || f.der_very_safe.level > f.der_safe.level {
            return Err(Error::InvalidConfig(
                "tiered fundamental levels must be ascending".to_string(),
            ));
        }

        let w = &self.weights;
        for (field, value) in [
            ("weights.technical", w.technical),
            ("weights.money_flow", w.money_flow),
            ("weights.fundamental", w.fundamental),
            ("weights.pattern", w.pattern),
        ] {
            crate::detectors::helpers::check_non_negative(field, value)?;
        }

        ScannerBuilder::new().with_policy(&self.patterns).build()?;
        Ok(())
    }
}
