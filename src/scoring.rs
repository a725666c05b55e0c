//! Composite scoring
//!
//! Turns the latest indicator state, the pattern result and an optional
//! fundamental snapshot into four sub-scores, a weighted composite, a
//! recommendation and the reasons behind them.

use serde::{Deserialize, Serialize};

use crate::{
    detectors::PatternResult,
    fundamentals::FundamentalSnapshot,
    indicators::{IndicatorFrame, IndicatorRow},
    policy::ScoringPolicy,
};

pub const INSUFFICIENT_DATA: &str = "insufficient data";
pub const FUNDAMENTAL_UNAVAILABLE: &str = "fundamental data unavailable";

// ============================================================
// RESULT TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    /// Trend and fundamentals both positive
    Gem,
    /// Short-term technical setup
    TradingBuy,
    /// Strong fundamentals, trend not confirmed
    InvestBuy,
    Neutral,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::Gem => "GEM",
            Recommendation::TradingBuy => "TRADING BUY",
            Recommendation::InvestBuy => "INVEST BUY",
            Recommendation::Neutral => "NEUTRAL",
        }
    }

    pub fn is_buy(self) -> bool {
        !matches!(self, Recommendation::Neutral)
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub technical: f64,
    pub money_flow: f64,
    pub fundamental: f64,
    pub pattern: f64,
}

impl SubScores {
    /// Technical plus money-flow
    #[inline]
    pub fn trend(&self) -> f64 {
        self.technical + self.money_flow
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub scores: SubScores,
    pub composite: f64,
    pub recommendation: Recommendation,
    pub reasons: Vec<String>,
    /// Trend clears the policy's trading-buy bar
    pub technical_strong: bool,
    /// Fundamental score clears the policy's invest-buy bar
    pub fundamental_strong: bool,
}

impl ScoreResult {
    /// Result for a series too short to score
    pub fn insufficient() -> Self {
        Self {
            scores: SubScores::default(),
            composite: 0.0,
            recommendation: Recommendation::Neutral,
            reasons: vec![INSUFFICIENT_DATA.to_string()],
            technical_strong: false,
            fundamental_strong: false,
        }
    }

    #[inline]
    pub fn technical_is_strong(&self) -> bool {
        self.technical_strong
    }

    #[inline]
    pub fn fundamental_is_strong(&self) -> bool {
        self.fundamental_strong
    }

    pub fn reason_summary(&self) -> String {
        self.reasons.join(", ")
    }
}

// ============================================================
// SCORER
// ============================================================

/// Applies a [`ScoringPolicy`]; stateless apart from the policy
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    policy: ScoringPolicy,
}

impl Scorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn score(
        &self,
        frame: &IndicatorFrame,
        pattern: &PatternResult,
        fundamentals: Option<&FundamentalSnapshot>,
    ) -> ScoreResult {
        let Some((_, latest)) = frame.latest_pair() else {
            return ScoreResult::insufficient();
        };

        let mut reasons = Vec::new();
        let money_flow = self.money_flow_score(&latest, &mut reasons);
        let technical = self.technical_score(&latest, &mut reasons);
        let fundamental = match fundamentals {
            Some(snapshot) => self.fundamental_score(snapshot, &mut reasons),
            None => {
                reasons.push(FUNDAMENTAL_UNAVAILABLE.to_string());
                0.0
            }
        };
        reasons.extend(pattern.labels().into_iter().map(str::to_string));

        let scores = SubScores {
            technical,
            money_flow,
            fundamental,
            pattern: pattern.weight,
        };
        let w = &self.policy.weights;
        let composite = w.technical * scores.technical
            + w.money_flow * scores.money_flow
            + w.fundamental * scores.fundamental
            + w.pattern * scores.pattern;

        ScoreResult {
            scores,
            composite,
            recommendation: self.recommend(&scores),
            reasons,
            technical_strong: self.technical_verdict(&scores),
            fundamental_strong: self.fundamental_verdict(&scores),
        }
    }

    /// First matching rule of the policy table, `Neutral` when none match
    pub fn recommend(&self, scores: &SubScores) -> Recommendation {
        self.policy
            .recommendations
            .iter()
            .find(|rule| rule.matches(scores.trend(), scores.fundamental))
            .map_or(Recommendation::Neutral, |rule| rule.recommendation)
    }

    /// False when the policy has no trading-buy trend bound
    fn technical_verdict(&self, scores: &SubScores) -> bool {
        self.policy
            .rule_for(Recommendation::TradingBuy)
            .and_then(|rule| rule.min_trend)
            .is_some_and(|min| scores.trend() > min)
    }

    /// False when the policy has no invest-buy fundamental bound
    fn fundamental_verdict(&self, scores: &SubScores) -> bool {
        self.policy
            .rule_for(Recommendation::InvestBuy)
            .and_then(|rule| rule.min_fundamental)
            .is_some_and(|min| scores.fundamental > min)
    }

    fn money_flow_score(&self, row: &IndicatorRow, reasons: &mut Vec<String>) -> f64 {
        let p = &self.policy.money_flow;
        let flow = row.money_flow_or_default();

        let (points, reason) = if flow > p.strong.level {
            (p.strong.points, "strong accumulation")
        } else if flow > p.mild.level {
            (p.mild.points, "mild accumulation")
        } else if flow < p.distribution.level {
            (p.distribution.points, "distribution")
        } else {
            (0.0, "neutral money flow")
        };
        reasons.push(reason.to_string());
        points
    }

    fn technical_score(&self, row: &IndicatorRow, reasons: &mut Vec<String>) -> f64 {
        let p = &self.policy.technical;
        let mut score = 0.0;

        if row.macd_trend_up() {
            score += p.macd_up_points;
            reasons.push("uptrend (MACD)".to_string());
        } else {
            score += p.macd_down_points;
            reasons.push("downtrend (MACD)".to_string());
        }

        let rsi = row.rsi_or_default();
        if rsi < p.oversold.level {
            score += p.oversold.points;
            reasons.push("oversold (RSI)".to_string());
        } else if rsi > p.overbought.level {
            score += p.overbought.points;
            reasons.push("overbought (RSI)".to_string());
        }

        if row
            .volume_ratio()
            .is_some_and(|ratio| ratio > p.volume_breakout.level)
        {
            score += p.volume_breakout.points;
            reasons.push("volume breakout".to_string());
        }

        score
    }

    fn fundamental_score(&self, snapshot: &FundamentalSnapshot, reasons: &mut Vec<String>) -> f64 {
        let p = &self.policy.fundamental;
        let mut score = 0.0;

        if let Some(pbv) = snapshot.price_to_book {
            if pbv < p.pbv_cheap.level {
                score += p.pbv_cheap.points;
                reasons.push(format!("cheap PBV (<{}x)", p.pbv_cheap.level));
            } else if pbv < p.pbv_fair.level {
                score += p.pbv_fair.points;
                reasons.push(format!("fair PBV (<{}x)", p.pbv_fair.level));
            } else if pbv > p.pbv_expensive.level {
                score += p.pbv_expensive.points;
                reasons.push("expensive PBV".to_string());
            }
        }

        if let Some(per) = snapshot.price_to_earnings {
            if per > 0.0 && per < p.per_cheap.level {
                score += p.per_cheap.points;
                reasons.push(format!("cheap PER (<{}x)", p.per_cheap.level));
            } else if per > p.per_expensive.level {
                score += p.per_expensive.points;
                reasons.push("expensive PER".to_string());
            }
        }

        if let Some(roe) = snapshot.return_on_equity {
            if roe > p.roe_high.level {
                score += p.roe_high.points;
                reasons.push(format!("high ROE ({:.1}%)", roe * 100.0));
            } else if roe < p.roe_low.level {
                score += p.roe_low.points;
                reasons.push("low ROE".to_string());
            }
        }

        if let Some(der) = snapshot.debt_to_equity {
            if der < p.der_very_safe.level {
                score += p.der_very_safe.points;
                reasons.push("very safe debt".to_string());
            } else if der < p.der_safe.level {
                score += p.der_safe.points;
                reasons.push(format!("safe debt (<{}%)", p.der_safe.level));
            } else if der > p.der_risky.level {
                score += p.der_risky.points;
                reasons.push("risky debt".to_string());
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detectors::PatternHit, indicators::IndicatorSettings, series::Series, Bar, Direction,
        PatternId,
    };

    fn frame_from(closes: &[f64], volume: impl Fn(usize) -> f64) -> IndicatorFrame {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c + 1.0, c - 1.0, c, volume(i)))
            .collect();
        IndicatorFrame::compute(&Series::from_bars(bars).unwrap(), &IndicatorSettings::default())
    }

    fn cheap_snapshot() -> FundamentalSnapshot {
        FundamentalSnapshot {
            price_to_book: Some(0.8),
            price_to_earnings: Some(7.0),
            return_on_equity: Some(0.2),
            debt_to_equity: Some(40.0),
            market_cap: None,
        }
    }

    #[test]
    fn test_insufficient_data() {
        let frame = frame_from(&[100.0], |_| 1.0);
        let result = Scorer::default().score(&frame, &PatternResult::default(), None);
        assert_eq!(result, ScoreResult::insufficient());
        assert_eq!(result.reasons, vec![INSUFFICIENT_DATA.to_string()]);
    }

    #[test]
    fn test_short_series_uses_defaults() {
        // no indicator values yet: MACD 0 vs 0 is not up, RSI 50, flow 0
        let frame = frame_from(&[100.0, 101.0], |_| 1.0);
        let result = Scorer::default().score(&frame, &PatternResult::default(), None);
        assert_eq!(result.scores.technical, -1.0);
        assert_eq!(result.scores.money_flow, 0.0);
        assert_eq!(result.scores.fundamental, 0.0);
        assert_eq!(result.recommendation, Recommendation::Neutral);
        assert_eq!(
            result.reasons,
            vec![
                "neutral money flow".to_string(),
                "downtrend (MACD)".to_string(),
                FUNDAMENTAL_UNAVAILABLE.to_string()
            ]
        );
        assert!(!result.technical_is_strong());
    }

    #[test]
    fn test_fundamental_tiers() {
        let scorer = Scorer::default();
        let mut reasons = Vec::new();
        assert_eq!(scorer.fundamental_score(&cheap_snapshot(), &mut reasons), 8.0);
        assert_eq!(reasons.len(), 4);
        assert_eq!(reasons[2], "high ROE (20.0%)");

        let middling = FundamentalSnapshot {
            price_to_book: Some(1.5),
            debt_to_equity: Some(80.0),
            ..FundamentalSnapshot::default()
        };
        let mut reasons = Vec::new();
        assert_eq!(scorer.fundamental_score(&middling, &mut reasons), 2.0);
        assert_eq!(reasons, vec!["fair PBV (<2x)", "safe debt (<100%)"]);

        let poor = FundamentalSnapshot {
            price_to_book: Some(6.0),
            price_to_earnings: Some(-4.0),
            return_on_equity: Some(0.01),
            debt_to_equity: Some(200.0),
            market_cap: Some(1e12),
        };
        let mut reasons = Vec::new();
        assert_eq!(scorer.fundamental_score(&poor, &mut reasons), -4.0);
        assert_eq!(reasons, vec!["expensive PBV", "low ROE", "risky debt"]);
    }

    #[test]
    fn test_money_flow_tiers() {
        let scorer = Scorer::default();
        let row = |flow: f64| IndicatorRow {
            bar: Bar::new(0, 100.0, 101.0, 99.0, 100.0, 1_000.0),
            rsi: None,
            macd: None,
            macd_signal: None,
            money_flow: Some(flow),
            band_upper: None,
            band_middle: None,
            band_lower: None,
            volume_ma: None,
        };

        for (flow, points, reason) in [
            (0.12, 2.0, "strong accumulation"),
            (0.07, 1.0, "mild accumulation"),
            (-0.15, -2.0, "distribution"),
            (0.0, 0.0, "neutral money flow"),
        ] {
            let mut reasons = Vec::new();
            assert_eq!(scorer.money_flow_score(&row(flow), &mut reasons), points, "flow {flow}");
            assert_eq!(reasons, vec![reason]);
        }
    }

    #[test]
    fn test_uptrend_with_volume_breakout() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.01 * (i * i) as f64).collect();
        let frame = frame_from(&closes, |i| if i == 59 { 5_000.0 } else { 1_000.0 });
        let latest = frame.latest().unwrap();
        assert!(latest.macd_trend_up());

        let mut reasons = Vec::new();
        let technical = Scorer::default().technical_score(&latest, &mut reasons);
        // +1 MACD, -2 overbought, +0.5 volume
        assert_eq!(technical, -0.5);
        assert_eq!(reasons, vec!["uptrend (MACD)", "overbought (RSI)", "volume breakout"]);
    }

    #[test]
    fn test_reason_order_and_composite() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin()).collect();
        let frame = frame_from(&closes, |_| 1_000.0);
        let pattern = PatternResult {
            weight: 2.0,
            hits: vec![PatternHit {
                pattern_id: PatternId::BULLISH_ENGULFING,
                direction: Direction::Bullish,
                weight: 2.0,
            }],
        };
        let result = Scorer::default().score(&frame, &pattern, Some(&cheap_snapshot()));
        let s = result.scores;
        assert_eq!(s.fundamental, 8.0);
        assert_eq!(s.pattern, 2.0);
        let sum = s.technical + s.money_flow + s.fundamental + s.pattern;
        assert!((result.composite - sum).abs() < 1e-12);
        assert_eq!(result.reasons.last().map(String::as_str), Some("Bullish Engulfing"));
        // open == close on every bar, so the flow ratio is zero
        assert_eq!(result.reasons[0], "neutral money flow");
        assert!(result.fundamental_is_strong());
    }

    #[test]
    fn test_verdicts_follow_policy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin()).collect();
        let frame = frame_from(&closes, |_| 1_000.0);
        let mut policy = ScoringPolicy::default();
        for rule in policy.recommendations.iter_mut() {
            if rule.min_fundamental.is_some() {
                rule.min_fundamental = Some(9.0);
            }
            if rule.recommendation == Recommendation::TradingBuy {
                rule.min_trend = Some(-10.0);
            }
        }

        let result =
            Scorer::new(policy).score(&frame, &PatternResult::default(), Some(&cheap_snapshot()));
        assert_eq!(result.scores.fundamental, 8.0);
        assert!(!result.fundamental_is_strong());
        assert!(result.technical_is_strong());
        assert_eq!(result.recommendation, Recommendation::TradingBuy);

        // without a bound there is nothing to clear
        let mut policy = ScoringPolicy::default();
        policy.recommendations.clear();
        let result =
            Scorer::new(policy).score(&frame, &PatternResult::default(), Some(&cheap_snapshot()));
        assert_eq!(result.recommendation, Recommendation::Neutral);
        assert!(!result.fundamental_is_strong());
        assert!(!result.technical_is_strong());
    }

    #[test]
    fn test_recommendation_table() {
        let scorer = Scorer::default();
        let rec = |technical, money_flow, fundamental| {
            scorer.recommend(&SubScores {
                technical,
                money_flow,
                fundamental,
                pattern: 0.0,
            })
        };
        assert_eq!(rec(1.0, 0.0, 3.5), Recommendation::Gem);
        assert_eq!(rec(1.0, 1.0, 0.0), Recommendation::TradingBuy);
        assert_eq!(rec(-1.0, 0.0, 5.0), Recommendation::InvestBuy);
        assert_eq!(rec(0.0, 0.0, 3.5), Recommendation::Neutral);
        assert_eq!(rec(1.0, 0.0, 3.0), Recommendation::Neutral);
    }

    #[test]
    fn test_pillar_weights() {
        let mut policy = ScoringPolicy::default();
        policy.weights.fundamental = 0.5;
        let frame = frame_from(&[100.0, 101.0], |_| 1.0);
        let result =
            Scorer::new(policy).score(&frame, &PatternResult::default(), Some(&cheap_snapshot()));
        // technical -1, fundamental 8 * 0.5
        assert_eq!(result.composite, 3.0);
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_string(&ScoreResult::insufficient()).unwrap();
        assert!(json.contains("\"recommendation\":\"Neutral\""));
        assert_eq!(Recommendation::TradingBuy.to_string(), "TRADING BUY");
    }
}
